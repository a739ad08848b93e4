//! Virtual motion engine
//!
//! The motion engine turns `sweep` commands into pose changes. The scheduler
//! chops each command into fixed-duration steps, the realism filter perturbs
//! each step's demand, and the kinematics module integrates the perturbed
//! demand into the pose.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod kinematics;
pub mod realism;
pub mod scheduler;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use scheduler::MotionScheduler;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Duration of a single motion integration step, milliseconds. Commands
/// shorter than this run as one step of the full command duration.
pub const MIN_STEP_DUR_MS: f64 = 250.0;

/// Battery charge below which actuation requests are ignored.
pub const BATTERY_MIN_CHARGE: i64 = 400;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during motion engine operation.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error(
        "Kinematic parameters are not initialised, issue set_pose with axle \
         track and full speed velocity first"
    )]
    NotInitialised,
}
