//! # Telemetry module
//!
//! Defines the telemetry packet returned by the simulator for
//! `get_telemetry`. The field order of the struct matches the wire order
//! expected by client parsers, so fields must not be reordered.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry packet that is output by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmPacket {
    /// Analog readings: the current reading, the reading minus 10, and a
    /// fixed -1 for the unpopulated third channel.
    pub analogs: [i64; 3],

    /// State of cutter channel 0 (0 or 1).
    pub cutter1: u8,

    /// State of cutter channel 1 (0 or 1).
    pub cutter2: u8,

    /// The network the mower is associated with.
    pub ssid: String,

    /// Received signal strength, dBm.
    pub rssi: i64,

    /// Distance to the base station, meters.
    pub dist: i64,

    /// Free storage on the mower, megabytes.
    #[serde(rename = "free-mb")]
    pub free_mb: i64,

    /// Milliseconds since process start at the time the packet was built.
    #[serde(rename = "last-update")]
    pub last_update_ms: i64,

    /// Id of the most recently acknowledged command.
    #[serde(rename = "last-cmd")]
    pub last_cmd: i64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur when encoding a telemetry packet.
#[derive(Debug, Error)]
pub enum TmEncodeError {
    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TmPacket {
    /// Serialise the packet into its JSON wire form.
    pub fn to_json(&self) -> Result<String, TmEncodeError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wire_key_order() {
        let packet = TmPacket {
            analogs: [900, 890, -1],
            cutter1: 1,
            cutter2: 0,
            ssid: String::from("Shed"),
            rssi: -55,
            dist: 0,
            free_mb: 100,
            last_update_ms: 1234,
            last_cmd: 42,
        };

        assert_eq!(
            packet.to_json().unwrap(),
            "{\"analogs\":[900,890,-1],\"cutter1\":1,\"cutter2\":0,\
             \"ssid\":\"Shed\",\"rssi\":-55,\"dist\":0,\"free-mb\":100,\
             \"last-update\":1234,\"last-cmd\":42}"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let packet = TmPacket {
            analogs: [512, 502, -1],
            cutter1: 0,
            cutter2: 1,
            ssid: String::from("HomeNet"),
            rssi: -60,
            dist: 3,
            free_mb: 98,
            last_update_ms: 99,
            last_cmd: 7,
        };

        let decoded: TmPacket = serde_json::from_str(&packet.to_json().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }
}
