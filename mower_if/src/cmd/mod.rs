//! # Command module
//!
//! This module implements the textual command grammar used on the UDP
//! channel:
//!
//! ```text
//! msg      := ['>'] cmd ('!' cmd)*
//! cmd      := ident '(' [arg (',' arg)*] ')'
//! arg      := number | token
//! ```
//!
//! A leading `>` marks the message as synchronous: the sender expects the
//! textual result of each command in the reply. Without it the message is
//! asynchronous and is acknowledged with a literal `ACK` before execution.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A full request message: one or more commands with a synchronicity marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// True if the message carried the leading `>` marker.
    pub sync: bool,

    /// The commands in left-to-right processing order.
    pub cmds: Vec<Command>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command to the virtual mower.
///
/// This is the closed dispatch set of the simulator. Each variant carries
/// typed fields so the dispatcher can match exhaustively instead of
/// re-checking arities at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Drive both wheels at the given percentage speeds for the given
    /// duration. A negative duration is a relative in-flight adjustment of
    /// the active run rather than a new actuation.
    Sweep {
        left_pct: f64,
        right_pct: f64,
        dur_ms: f64,
        /// Command id echoed back in telemetry as `last-cmd`.
        last_cmd_id: Option<i64>,
    },

    /// Set (positive mode) or clear (non-positive mode) cutter channel
    /// `addr`.
    Cutter { addr: u8, mode: i64 },

    /// Read the analog channel.
    ReadAdc { channel: u8 },

    /// Request the telemetry packet.
    GetTelemetry,

    /// Request the current pose as `"x,y,heading_deg"`.
    GetPose,

    /// Overwrite the pose, optionally supplying the kinematic parameters.
    SetPose {
        x_m: f64,
        y_m: f64,
        heading_deg: f64,
        axle_track_m: Option<f64>,
        full_speed_mps: Option<f64>,
    },

    /// Emergency stop: cancel any active run and clear the cutters.
    Reset,

    /// Enrol a priority ESSID. The argument is an opaque string token.
    SetPriorityEssid { essid: String },
}

/// A single argument token of a command.
#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Num(f64),
    Token(String),
}

/// Possible command parsing errors.
#[derive(Debug, Error)]
pub enum CmdParseError {
    #[error("Malformed command: {0}")]
    Malformed(String),

    #[error("Unknown operation: {0}")]
    UnknownOp(String),

    #[error("Wrong number of arguments for {op}: expected {expected}, got {got}")]
    BadArity {
        op: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("Could not convert argument {0:?} to a number")]
    BadArg(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Request {
    /// Parse a full request message.
    pub fn parse(msg: &str) -> Result<Self, CmdParseError> {
        let msg = msg.trim();

        let (sync, body) = match msg.strip_prefix('>') {
            Some(b) => (true, b),
            None => (false, msg),
        };

        let mut cmds = Vec::new();

        for part in body.split('!') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            cmds.push(Command::parse(part)?);
        }

        if cmds.is_empty() {
            return Err(CmdParseError::Malformed(String::from(
                "message contains no commands",
            )));
        }

        Ok(Request { sync, cmds })
    }

    /// Render the request back into its wire form.
    pub fn render(&self) -> String {
        let body = self
            .cmds
            .iter()
            .map(Command::render)
            .collect::<Vec<_>>()
            .join("!");

        if self.sync {
            format!(">{}", body)
        } else {
            body
        }
    }
}

impl Command {
    /// Parse a single `name(arg,arg,...)` command.
    pub fn parse(cmd_str: &str) -> Result<Self, CmdParseError> {
        let open = match cmd_str.find('(') {
            Some(i) => i,
            None => {
                return Err(CmdParseError::Malformed(format!(
                    "missing '(' in {:?}",
                    cmd_str
                )))
            }
        };

        if !cmd_str.ends_with(')') {
            return Err(CmdParseError::Malformed(format!(
                "missing ')' in {:?}",
                cmd_str
            )));
        }

        let name = cmd_str[..open].trim();
        let arg_str = &cmd_str[open + 1..cmd_str.len() - 1];

        let args = parse_args(arg_str)?;

        Self::dispatch(name, args)
    }

    /// Build a command from its name and parsed argument list.
    fn dispatch(name: &str, args: Vec<Arg>) -> Result<Self, CmdParseError> {
        match name {
            "sweep" => {
                let nums = expect_nums(&args)?;
                match nums.len() {
                    3 => Ok(Command::Sweep {
                        left_pct: nums[0],
                        right_pct: nums[1],
                        dur_ms: nums[2],
                        last_cmd_id: None,
                    }),
                    4 => Ok(Command::Sweep {
                        left_pct: nums[0],
                        right_pct: nums[1],
                        dur_ms: nums[2],
                        last_cmd_id: Some(nums[3] as i64),
                    }),
                    n => Err(CmdParseError::BadArity {
                        op: "sweep",
                        expected: "3 or 4",
                        got: n,
                    }),
                }
            }
            "cutter" => {
                let nums = expect_nums(&args)?;
                if nums.len() != 2 {
                    return Err(CmdParseError::BadArity {
                        op: "cutter",
                        expected: "2",
                        got: nums.len(),
                    });
                }
                Ok(Command::Cutter {
                    addr: nums[0] as u8,
                    mode: nums[1] as i64,
                })
            }
            "readadc" => {
                let nums = expect_nums(&args)?;
                if nums.len() != 1 {
                    return Err(CmdParseError::BadArity {
                        op: "readadc",
                        expected: "1",
                        got: nums.len(),
                    });
                }
                Ok(Command::ReadAdc {
                    channel: nums[0] as u8,
                })
            }
            "get_telemetry" => {
                expect_empty("get_telemetry", &args)?;
                Ok(Command::GetTelemetry)
            }
            "get_pose" => {
                expect_empty("get_pose", &args)?;
                Ok(Command::GetPose)
            }
            "set_pose" => {
                let nums = expect_nums(&args)?;
                match nums.len() {
                    3 => Ok(Command::SetPose {
                        x_m: nums[0],
                        y_m: nums[1],
                        heading_deg: nums[2],
                        axle_track_m: None,
                        full_speed_mps: None,
                    }),
                    5 => Ok(Command::SetPose {
                        x_m: nums[0],
                        y_m: nums[1],
                        heading_deg: nums[2],
                        axle_track_m: Some(nums[3]),
                        full_speed_mps: Some(nums[4]),
                    }),
                    n => Err(CmdParseError::BadArity {
                        op: "set_pose",
                        expected: "3 or 5",
                        got: n,
                    }),
                }
            }
            "reset" => {
                expect_empty("reset", &args)?;
                Ok(Command::Reset)
            }
            "set_priority_essid" => match args.as_slice() {
                [Arg::Token(t)] => Ok(Command::SetPriorityEssid { essid: t.clone() }),
                [Arg::Num(n)] => Ok(Command::SetPriorityEssid {
                    essid: format!("{}", n),
                }),
                a => Err(CmdParseError::BadArity {
                    op: "set_priority_essid",
                    expected: "1",
                    got: a.len(),
                }),
            },
            _ => Err(CmdParseError::UnknownOp(String::from(name))),
        }
    }

    /// Render the command back into its `name(arg,...)` wire form.
    ///
    /// `parse(render(cmd))` is the identity over the dispatch set.
    pub fn render(&self) -> String {
        match self {
            Command::Sweep {
                left_pct,
                right_pct,
                dur_ms,
                last_cmd_id: None,
            } => format!("sweep({},{},{})", left_pct, right_pct, dur_ms),
            Command::Sweep {
                left_pct,
                right_pct,
                dur_ms,
                last_cmd_id: Some(id),
            } => format!("sweep({},{},{},{})", left_pct, right_pct, dur_ms, id),
            Command::Cutter { addr, mode } => format!("cutter({},{})", addr, mode),
            Command::ReadAdc { channel } => format!("readadc({})", channel),
            Command::GetTelemetry => String::from("get_telemetry()"),
            Command::GetPose => String::from("get_pose()"),
            Command::SetPose {
                x_m,
                y_m,
                heading_deg,
                axle_track_m: Some(axle),
                full_speed_mps: Some(v),
            } => format!("set_pose({},{},{},{},{})", x_m, y_m, heading_deg, axle, v),
            Command::SetPose {
                x_m,
                y_m,
                heading_deg,
                ..
            } => format!("set_pose({},{},{})", x_m, y_m, heading_deg),
            Command::Reset => String::from("reset()"),
            Command::SetPriorityEssid { essid } => format!("set_priority_essid({})", essid),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse a comma-separated argument list.
///
/// Tokens convert to numbers, except when the list is a single non-numeric
/// token, in which case it is passed through as an opaque string (used by
/// ESSID enrolment).
fn parse_args(arg_str: &str) -> Result<Vec<Arg>, CmdParseError> {
    let arg_str = arg_str.trim();

    if arg_str.is_empty() {
        return Ok(Vec::new());
    }

    let tokens: Vec<&str> = arg_str.split(',').map(str::trim).collect();

    if tokens.len() == 1 {
        let t = tokens[0];
        return Ok(vec![match t.parse::<f64>() {
            Ok(n) => Arg::Num(n),
            Err(_) => Arg::Token(String::from(t)),
        }]);
    }

    tokens
        .iter()
        .map(|t| match t.parse::<f64>() {
            Ok(n) => Ok(Arg::Num(n)),
            Err(_) => Err(CmdParseError::BadArg(String::from(*t))),
        })
        .collect()
}

/// Require all arguments to be numbers.
fn expect_nums(args: &[Arg]) -> Result<Vec<f64>, CmdParseError> {
    args.iter()
        .map(|a| match a {
            Arg::Num(n) => Ok(*n),
            Arg::Token(t) => Err(CmdParseError::BadArg(t.clone())),
        })
        .collect()
}

/// Require the argument list to be empty.
fn expect_empty(op: &'static str, args: &[Arg]) -> Result<(), CmdParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CmdParseError::BadArity {
            op,
            expected: "0",
            got: args.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
