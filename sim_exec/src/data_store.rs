//! # Data Store
//!
//! Single owner of all mutable simulator state. One instance lives behind a
//! mutex shared between the UDP dispatch thread and the stepper thread; at
//! any instant at most one logical mutator holds the lock.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;

// Internal
use crate::motion::kinematics::Pose;
use crate::motion::realism::RealismState;
use crate::params::SimExecParams;
use std::sync::{Arc, Mutex, MutexGuard};
use util::maths::norm_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    /// Current pose of the mower.
    pub pose: Pose,

    /// Distance between the two driven wheels, meters. Zero until the first
    /// `set_pose` supplies it; motion is rejected while it is zero.
    pub axle_track_m: f64,

    /// Linear wheel speed at 100% commanded power, meters/second. Zero until
    /// the first `set_pose` supplies it.
    pub full_speed_mps: f64,

    /// Cutter relay channels, channel n packed into bit n. The on-wire
    /// second byte is an unused timer field which is always sent as 0.
    pub cutters: u8,

    /// Simulated battery charge.
    pub battery_charge: i64,

    /// True if `readadc` reads the simulated battery rather than a random
    /// source.
    pub simulate_battery: bool,

    /// Id of the most recently acknowledged command, echoed in telemetry.
    pub last_cmd_id: i64,

    /// Motor direction flags, set from the sign of the commanded speeds.
    pub left_forward: bool,
    pub right_forward: bool,

    /// Relative in-flight adjustment applied to upcoming steps.
    pub rel_adjust: RelAdjust,

    /// State of the motion realism filter.
    pub realism: RealismState,

    /// Priority ESSID enrolled by the controller, if any.
    pub priority_essid: Option<String>,

    /// SSID reported in telemetry when no priority ESSID is enrolled.
    pub default_ssid: String,
}

/// A relative speed adjustment with a runway of step time left to live.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelAdjust {
    /// Delta added to the left speed of each upcoming step, percent.
    pub left_delta_pct: f64,

    /// Delta added to the right speed of each upcoming step, percent.
    pub right_delta_pct: f64,

    /// Remaining runway, milliseconds of step time.
    pub remaining_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Create the store from the executable parameters.
    pub fn new(params: &SimExecParams) -> Self {
        DataStore {
            pose: Pose::default(),
            axle_track_m: 0.0,
            full_speed_mps: 0.0,
            cutters: 0,
            battery_charge: params.initial_battery_charge,
            simulate_battery: params.simulate_battery,
            last_cmd_id: 0,
            left_forward: true,
            right_forward: true,
            rel_adjust: RelAdjust::default(),
            realism: RealismState::default(),
            priority_essid: None,
            default_ssid: params.default_ssid.clone(),
        }
    }

    /// Overwrite the pose, optionally updating the kinematic parameters.
    ///
    /// The realism state is reset so pseudo sequences replay from the start
    /// of a freshly positioned run.
    pub fn set_pose(
        &mut self,
        x_m: f64,
        y_m: f64,
        heading_deg: f64,
        axle_track_m: Option<f64>,
        full_speed_mps: Option<f64>,
    ) {
        self.pose = Pose {
            x_m,
            y_m,
            theta_rad: norm_2pi(heading_deg.to_radians()),
        };

        if let Some(axle) = axle_track_m {
            self.axle_track_m = axle;
        }
        if let Some(v) = full_speed_mps {
            self.full_speed_mps = v;
        }

        self.realism.reset();

        info!("Pose set to {}", self.format_pose());
    }

    /// Render the pose as `"x,y,heading_deg"` with 3-decimal rounding.
    pub fn format_pose(&self) -> String {
        format!(
            "{:.3},{:.3},{:.3}",
            self.pose.x_m,
            self.pose.y_m,
            self.pose.theta_rad.to_degrees()
        )
    }

    /// Set or clear a cutter channel.
    pub fn set_cutter(&mut self, addr: u8, on: bool) {
        let mask = 1u8 << (addr % 8);
        if on {
            self.cutters |= mask;
        } else {
            self.cutters &= !mask;
        }
    }

    /// Read a cutter channel as 0 or 1.
    pub fn cutter_channel(&self, addr: u8) -> u8 {
        (self.cutters >> (addr % 8)) & 1
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Lock the shared store, recovering the guard if a stepper thread panicked
/// while holding it.
pub fn lock_store(store: &Arc<Mutex<DataStore>>) -> MutexGuard<DataStore> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
