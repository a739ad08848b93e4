//! Command dispatcher
//!
//! The engine owns the shared data store and the motion scheduler and maps
//! each parsed command onto them, producing the textual reply sent back for
//! synchronous requests.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};

// Internal
use crate::data_store::{lock_store, DataStore, RelAdjust};
use crate::motion::MotionScheduler;
use crate::params::SimExecParams;
use crate::telemetry;
use mower_if::cmd::Command;

// Standard
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Reply sent for accepted state-changing commands.
const OK_REPLY: &str = "0";

/// Fixed acknowledgement for `cutter`. Kept for compatibility with clients
/// that check the literal value.
const CUTTER_ACK: &str = "3";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The simulator engine. One instance is owned by `main` and passed by
/// reference into the UDP serving loop.
pub struct Engine {
    store: Arc<Mutex<DataStore>>,
    scheduler: MotionScheduler,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Engine {
    pub fn new(params: &SimExecParams) -> Self {
        let store = Arc::new(Mutex::new(DataStore::new(params)));
        let scheduler = MotionScheduler::new(Arc::clone(&store));

        Engine { store, scheduler }
    }

    /// Execute one command and render its textual reply.
    ///
    /// Execution never fails the serving loop: errors from the motion engine
    /// or the telemetry encoder come back as textual messages, matching the
    /// replies clients already handle for parse failures.
    pub fn exec(&mut self, cmd: &Command) -> String {
        match *cmd {
            Command::Sweep {
                left_pct,
                right_pct,
                dur_ms,
                last_cmd_id,
            } => match self
                .scheduler
                .actuate(left_pct, right_pct, dur_ms, last_cmd_id)
            {
                Ok(()) => String::from(OK_REPLY),
                Err(e) => {
                    warn!("Sweep rejected: {}", e);
                    e.to_string()
                }
            },

            Command::Cutter { addr, mode } => {
                lock_store(&self.store).set_cutter(addr, mode > 0);
                String::from(CUTTER_ACK)
            }

            Command::ReadAdc { channel } => {
                let ds = lock_store(&self.store);
                telemetry::read_adc(&ds, channel).to_string()
            }

            Command::GetTelemetry => {
                let packet = telemetry::packet_from_store(&lock_store(&self.store));
                match packet.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Telemetry encode failed: {}", e);
                        e.to_string()
                    }
                }
            }

            Command::GetPose => lock_store(&self.store).format_pose(),

            Command::SetPose {
                x_m,
                y_m,
                heading_deg,
                axle_track_m,
                full_speed_mps,
            } => {
                lock_store(&self.store).set_pose(
                    x_m,
                    y_m,
                    heading_deg,
                    axle_track_m,
                    full_speed_mps,
                );
                String::from(OK_REPLY)
            }

            Command::Reset => {
                info!("Emergency stop");
                self.scheduler.cancel_active();
                let mut ds = lock_store(&self.store);
                ds.cutters = 0;
                ds.rel_adjust = RelAdjust::default();
                String::from(OK_REPLY)
            }

            Command::SetPriorityEssid { ref essid } => {
                info!("Priority ESSID enrolled: {}", essid);
                lock_store(&self.store).priority_essid = Some(essid.clone());
                String::from(OK_REPLY)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
