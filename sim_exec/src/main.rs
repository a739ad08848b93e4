//! # Mower Simulator Executable
//!
//! Software-in-the-loop stand-in for the mower's onboard control computer.
//! Speaks the mower's UDP command protocol, advances a virtual pose according
//! to commanded wheel speeds and durations, and reports telemetry, so the
//! ground control software can be exercised without hardware.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Shared simulator state.
mod data_store;

/// Command dispatch into the engine.
mod dispatch;

/// Virtual motion engine: kinematics, realism filter and scheduler.
mod motion;

/// Parameters for the simulator executable.
mod params;

/// Telemetry assembly.
mod telemetry;

/// UDP command server abstraction.
mod udp_server;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{info, warn};

// Internal
use dispatch::Engine;
use mower_if::cmd::Request;
use udp_server::SimServer;
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Reply sent immediately for asynchronous requests.
const ASYNC_ACK: &str = "ACK";

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("sim_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Mower Simulator Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: params::SimExecParams = util::params::load("sim_exec.toml")?;

    info!("Parameters loaded");

    // ---- ENGINE AND SERVER INITIALISATION ----

    let mut engine = Engine::new(&params);

    let mut server = SimServer::new(&params).wrap_err("Failed to initialise the server")?;

    info!("Server initialised");

    // ---- MAIN LOOP ----

    info!("Initialisation complete, listening for commands");

    loop {
        // Get the next request, recovering from transient socket errors
        let (text, sender) = match server.recv() {
            Ok(r) => r,
            Err(e) => {
                warn!("Receive failed: {}", e);
                continue;
            }
        };

        // Parse failures are replied to the sender so the controller sees
        // what it got wrong, then serving continues. Offline windows drop
        // malformed traffic silently like everything else
        let request = match Request::parse(&text) {
            Ok(r) => r,
            Err(e) => {
                warn!("Bad request from {}: {}", sender, e);
                if server.comms_online() {
                    if let Err(e) = server.send(&e.to_string(), sender) {
                        warn!("Reply failed: {}", e);
                    }
                }
                continue;
            }
        };

        // Requests dropped by comms realism get no reply at all
        if !server.admit(&request) {
            continue;
        }

        if request.sync {
            let replies: Vec<String> = request.cmds.iter().map(|c| engine.exec(c)).collect();

            if let Err(e) = server.send(&replies.join("!"), sender) {
                warn!("Reply failed: {}", e);
            }
        } else {
            // Acknowledge before executing, no second reply
            if let Err(e) = server.send(ASYNC_ACK, sender) {
                warn!("Ack failed: {}", e);
            }

            for cmd in &request.cmds {
                engine.exec(cmd);
            }
        }
    }
}
