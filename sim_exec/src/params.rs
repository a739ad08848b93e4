//! Parameters for the simulator executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters controlling the simulator executable, loaded from
/// `params/sim_exec.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimExecParams {
    /// Address and port the UDP command socket binds to.
    pub bind_endpoint: String,

    /// Battery charge at process start.
    pub initial_battery_charge: i64,

    /// When true `readadc` reports the simulated battery charge, which is
    /// drained by issued work. When false a random reading is returned and
    /// the charge never moves.
    pub simulate_battery: bool,

    /// SSID reported in telemetry until a priority ESSID is enrolled.
    pub default_ssid: String,

    /// Comms realism settings.
    pub comms_realism: CommsRealismParams,
}

/// Settings for the simulated comms outages.
#[derive(Debug, Clone, Deserialize)]
pub struct CommsRealismParams {
    /// Master switch for comms realism.
    pub enabled: bool,

    /// Probability of dropping offline, evaluated once per received message
    /// while online.
    pub fail_prob: f64,

    /// How long an offline window lasts, seconds.
    pub fail_duration_s: f64,
}
