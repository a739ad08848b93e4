//! # Mower Interface Library
//!
//! This library defines the wire interface between the virtual mower
//! simulator and its controllers: the textual command grammar sent over UDP
//! and the telemetry packet returned by the simulator.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod cmd;
pub mod tm;
