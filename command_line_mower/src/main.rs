//! # Command Line Mower
//!
//! Interactive console for talking to the simulator (or the real mower)
//! over its UDP command protocol. Lines are validated against the command
//! grammar before being sent, so typos are caught locally instead of as
//! textual error replies.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use structopt::StructOpt;

// Internal
use mower_if::cmd::Request;

// Standard
use std::net::UdpSocket;
use std::time::Duration;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "Mower $ ";
const HISTORY_PATH: &str = "data/history.txt";

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "command_line_mower", about = "Issue commands to the mower")]
struct Opt {
    /// Address and port of the mower's command socket.
    #[structopt(short, long, default_value = "127.0.0.1:5005")]
    endpoint: String,

    /// How long to wait for a reply, seconds.
    #[structopt(short, long, default_value = "2.0")]
    timeout_s: f64,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let socket = UdpSocket::bind("0.0.0.0:0").wrap_err("Cannot open a local socket")?;
    socket
        .set_read_timeout(Some(Duration::from_secs_f64(opt.timeout_s)))
        .wrap_err("Cannot set the reply timeout")?;

    println!("Connected to {}", opt.endpoint);

    let mut rl = DefaultEditor::new()?;
    if rl.load_history(HISTORY_PATH).is_err() {
        println!("No history detected");
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }

                let _ = rl.add_history_entry(line);

                // Validate locally before anything goes on the wire
                if let Err(e) = Request::parse(line) {
                    println!("Invalid command: {}", e);
                    continue;
                }

                if let Err(e) = exchange(&socket, &opt.endpoint, line) {
                    println!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Unhandled Error: {:?}", err);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(HISTORY_PATH) {
        println!("Could not save history: {}", e);
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Send one request and print the reply. Every request gets exactly one
/// reply: the result for synchronous requests, `ACK` for asynchronous ones.
fn exchange(socket: &UdpSocket, endpoint: &str, request: &str) -> Result<()> {
    socket
        .send_to(request.as_bytes(), endpoint)
        .wrap_err("Send failed")?;

    let mut buf = [0u8; 1024];
    let (len, _) = socket
        .recv_from(&mut buf)
        .wrap_err("No reply before timeout")?;

    println!("{}", String::from_utf8_lossy(&buf[..len]));

    Ok(())
}
