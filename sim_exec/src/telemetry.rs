//! Telemetry assembly
//!
//! Builds [`mower_if::tm::TmPacket`] instances out of the data store and
//! provides the simulated analog-to-digital readings backing both `readadc`
//! and the telemetry `analogs` array.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use rand::Rng;

// Internal
use crate::data_store::DataStore;
use mower_if::tm::TmPacket;
use util::session;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Exclusive upper bound of a raw ADC reading (10-bit converter).
const ADC_MAX: i64 = 1024;

/// Fixed signal strength reported in telemetry, dBm. The simulator has no
/// radio so a healthy mid-range value is reported.
const SIM_RSSI: i64 = -55;

/// Fixed base-station distance reported in telemetry.
const SIM_DIST: i64 = 0;

/// Fixed free storage reported in telemetry, megabytes.
const SIM_FREE_MB: i64 = 100;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Read a simulated ADC channel.
///
/// With battery simulation enabled the reading is the current charge, so
/// clients polling the battery channel see it drain as work is issued. With
/// it disabled the converter returns noise.
pub fn read_adc(ds: &DataStore, _channel: u8) -> i64 {
    if ds.simulate_battery {
        ds.battery_charge
    } else {
        rand::thread_rng().gen_range(0..ADC_MAX)
    }
}

/// Assemble a telemetry packet from the current store state.
pub fn packet_from_store(ds: &DataStore) -> TmPacket {
    let reading = read_adc(ds, 0);

    TmPacket {
        analogs: [reading, reading - 10, -1],
        cutter1: ds.cutter_channel(0),
        cutter2: ds.cutter_channel(1),
        ssid: ds
            .priority_essid
            .clone()
            .unwrap_or_else(|| ds.default_ssid.clone()),
        rssi: SIM_RSSI,
        dist: SIM_DIST,
        free_mb: SIM_FREE_MB,
        last_update_ms: session::get_elapsed_millis(),
        last_cmd: ds.last_cmd_id,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{CommsRealismParams, SimExecParams};

    fn test_store() -> DataStore {
        DataStore::new(&SimExecParams {
            bind_endpoint: String::from("127.0.0.1:0"),
            initial_battery_charge: 1000,
            simulate_battery: true,
            default_ssid: String::from("mower-sim"),
            comms_realism: CommsRealismParams {
                enabled: false,
                fail_prob: 0.0,
                fail_duration_s: 0.0,
            },
        })
    }

    #[test]
    fn test_adc_reads_simulated_battery() {
        let mut ds = test_store();
        ds.battery_charge = 742;

        assert_eq!(read_adc(&ds, 0), 742);
    }

    #[test]
    fn test_adc_noise_in_range() {
        let mut ds = test_store();
        ds.simulate_battery = false;

        for _ in 0..100 {
            let reading = read_adc(&ds, 0);
            assert!((0..ADC_MAX).contains(&reading));
        }
    }

    #[test]
    fn test_packet_reflects_store() {
        let mut ds = test_store();
        ds.battery_charge = 900;
        ds.last_cmd_id = 12;
        ds.set_cutter(1, true);

        let packet = packet_from_store(&ds);

        assert_eq!(packet.analogs, [900, 890, -1]);
        assert_eq!(packet.cutter1, 0);
        assert_eq!(packet.cutter2, 1);
        assert_eq!(packet.ssid, "mower-sim");
        assert_eq!(packet.last_cmd, 12);
        assert!(packet.last_update_ms >= 0);
    }

    #[test]
    fn test_priority_essid_overrides_ssid() {
        let mut ds = test_store();
        ds.priority_essid = Some(String::from("base-station"));

        assert_eq!(packet_from_store(&ds).ssid, "base-station");
    }
}
