//! Motion realism filter
//!
//! Perturbs the nominal demand of each motion step to mimic the mower's
//! behaviour on real ground: speed thresholds below which the motors stall,
//! overrun and underrun on grades, and transient blockages.
//!
//! Which perturbation applies to a step is chosen by an occurrence code in
//! [1, 14], drawn either at random or from a fixed pseudo sequence. Codes
//! with no rule attached leave the step nominal.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use rand::Rng;

// Standard
use std::time::Instant;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Realism settings compiled into the executable.
pub const REALISM: RealismConfig = RealismConfig {
    mode: RealismMode::Off,
    pseudo_sequence: &[2, 0, 3, 0, 4, 5, 0, 6, 0, 0, 0, 0],
    max_cycles: 4,
    min_speed_pct: 20.0,
    min_dur_ms: 50.0,
    overrun_factor: 1.25,
    underrun_factor: 0.8,
    blockage_duration_s: 3.0,
};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How occurrence codes are drawn for each perturbation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealismMode {
    /// Every step is nominal.
    Off,

    /// Codes are drawn uniformly from [1, 14].
    Random,

    /// Codes are taken from `pseudo_sequence`, wrapping at the end.
    Pseudo,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Static configuration of the realism filter.
pub struct RealismConfig {
    pub mode: RealismMode,

    /// Occurrence codes replayed in order under `RealismMode::Pseudo`.
    pub pseudo_sequence: &'static [u8],

    /// Number of consecutive steps each drawn occurrence persists for.
    pub max_cycles: u32,

    /// Demands with a non-zero magnitude below this stall to zero.
    pub min_speed_pct: f64,

    /// Steps shorter than this are suppressed entirely.
    pub min_dur_ms: f64,

    /// Speed multiplier for downhill overrun (occurrence 2), and divisor
    /// for uphill (occurrence 3).
    pub overrun_factor: f64,

    /// Per-wheel slip multiplier (occurrences 4 and 5).
    pub underrun_factor: f64,

    /// How long a blockage (occurrence 6) pins the mower in place.
    pub blockage_duration_s: f64,
}

/// One step's worth of demand flowing through the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDemand {
    pub left_pct: f64,
    pub right_pct: f64,
    pub dur_ms: f64,
    pub full_speed_mps: f64,
}

/// Mutable filter state, owned by the data store and reset on `set_pose`.
#[derive(Debug, Default)]
pub struct RealismState {
    /// Next index into the pseudo sequence.
    pseudo_index: usize,

    /// Steps left before a new occurrence is drawn.
    cycle_counter: u32,

    /// Occurrence code applied to the current window of steps.
    occurrence: u8,

    /// When the active blockage started, if one is active.
    blockage_started: Option<Instant>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl RealismState {
    /// Restart occurrence replay, clearing any active blockage.
    pub fn reset(&mut self) {
        *self = RealismState::default();
    }

    /// Apply the filter to one step's demand.
    pub fn apply(&mut self, config: &RealismConfig, demand: StepDemand) -> StepDemand {
        if config.mode == RealismMode::Off {
            return demand;
        }

        if self.cycle_counter > 0 {
            self.cycle_counter -= 1;
        } else {
            self.occurrence = self.draw(config);
            self.cycle_counter = config.max_cycles;
        }

        let mut out = demand;

        if out.dur_ms < config.min_dur_ms {
            trace!("Realism: step of {} ms suppressed", out.dur_ms);
            out.dur_ms = 0.0;
        }

        let left_stalls = out.left_pct != 0.0 && out.left_pct.abs() < config.min_speed_pct;
        let right_stalls = out.right_pct != 0.0 && out.right_pct.abs() < config.min_speed_pct;
        if left_stalls || right_stalls {
            trace!(
                "Realism: demand ({}, {}) below stall threshold",
                out.left_pct,
                out.right_pct
            );
            out.left_pct = 0.0;
            out.right_pct = 0.0;
        }

        let both_fwd = out.left_pct > 0.0 && out.right_pct > 0.0;
        match self.occurrence {
            2 if both_fwd => out.full_speed_mps *= config.overrun_factor,
            3 if both_fwd => out.full_speed_mps /= config.overrun_factor,
            4 if out.left_pct > 0.0 => out.left_pct *= config.underrun_factor,
            5 if out.right_pct > 0.0 => out.right_pct *= config.underrun_factor,
            _ => (),
        }

        if let Some(started) = self.blockage_started {
            if started.elapsed().as_secs_f64() < config.blockage_duration_s {
                trace!("Realism: blocked, holding position");
                out.left_pct = 0.0;
                out.right_pct = 0.0;
            } else {
                self.blockage_started = None;
            }
        } else if self.occurrence == 6 {
            trace!("Realism: blockage started");
            self.blockage_started = Some(Instant::now());
        }

        out
    }

    fn draw(&mut self, config: &RealismConfig) -> u8 {
        match config.mode {
            RealismMode::Off => 0,
            RealismMode::Random => rand::thread_rng().gen_range(1..=14),
            RealismMode::Pseudo => {
                let code = config.pseudo_sequence[self.pseudo_index % config.pseudo_sequence.len()];
                self.pseudo_index = (self.pseudo_index + 1) % config.pseudo_sequence.len();
                code
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn pseudo_config(sequence: &'static [u8]) -> RealismConfig {
        RealismConfig {
            mode: RealismMode::Pseudo,
            pseudo_sequence: sequence,
            max_cycles: 0,
            min_speed_pct: 20.0,
            min_dur_ms: 50.0,
            overrun_factor: 1.25,
            underrun_factor: 0.8,
            blockage_duration_s: 0.5,
        }
    }

    fn nominal_demand() -> StepDemand {
        StepDemand {
            left_pct: 50.0,
            right_pct: 50.0,
            dur_ms: 250.0,
            full_speed_mps: 0.5,
        }
    }

    #[test]
    fn test_off_mode_is_identity() {
        let config = RealismConfig {
            mode: RealismMode::Off,
            ..pseudo_config(&[6])
        };
        let mut state = RealismState::default();

        // Even a sub-threshold demand passes through untouched
        let demand = StepDemand {
            left_pct: 5.0,
            right_pct: 5.0,
            dur_ms: 10.0,
            full_speed_mps: 0.5,
        };
        assert_eq!(state.apply(&config, demand), demand);
    }

    #[test]
    fn test_short_step_suppressed() {
        let config = pseudo_config(&[0]);
        let mut state = RealismState::default();

        let mut demand = nominal_demand();
        demand.dur_ms = 10.0;

        assert_eq!(state.apply(&config, demand).dur_ms, 0.0);
    }

    #[test]
    fn test_stall_below_min_speed() {
        let config = pseudo_config(&[0]);
        let mut state = RealismState::default();

        let mut demand = nominal_demand();
        demand.left_pct = 10.0;

        let out = state.apply(&config, demand);
        assert_eq!(out.left_pct, 0.0);
        assert_eq!(out.right_pct, 0.0);
    }

    #[test]
    fn test_overrun_and_underrun_codes() {
        // max_cycles 0 draws a fresh code each step
        let config = pseudo_config(&[2, 3, 4, 5, 0]);
        let mut state = RealismState::default();

        let out = state.apply(&config, nominal_demand());
        assert!((out.full_speed_mps - 0.5 * 1.25).abs() < 1e-12);

        let out = state.apply(&config, nominal_demand());
        assert!((out.full_speed_mps - 0.5 / 1.25).abs() < 1e-12);

        let out = state.apply(&config, nominal_demand());
        assert!((out.left_pct - 40.0).abs() < 1e-12);
        assert_eq!(out.right_pct, 50.0);

        let out = state.apply(&config, nominal_demand());
        assert_eq!(out.left_pct, 50.0);
        assert!((out.right_pct - 40.0).abs() < 1e-12);

        let out = state.apply(&config, nominal_demand());
        assert_eq!(out, nominal_demand());
    }

    #[test]
    fn test_grade_codes_need_forward_motion() {
        let config = pseudo_config(&[2]);
        let mut state = RealismState::default();

        let mut demand = nominal_demand();
        demand.left_pct = -50.0;
        demand.right_pct = -50.0;

        // Reversing is unaffected by downhill overrun
        assert_eq!(state.apply(&config, demand), demand);
    }

    #[test]
    fn test_occurrence_persists_for_max_cycles() {
        let mut config = pseudo_config(&[4, 0]);
        config.max_cycles = 2;
        let mut state = RealismState::default();

        // Draw step plus two held cycles all carry occurrence 4
        for _ in 0..3 {
            let out = state.apply(&config, nominal_demand());
            assert!((out.left_pct - 40.0).abs() < 1e-12);
        }

        // Next draw takes the 0 code and goes nominal
        let out = state.apply(&config, nominal_demand());
        assert_eq!(out.left_pct, 50.0);
    }

    #[test]
    fn test_blockage_pins_then_clears() {
        let config = pseudo_config(&[6, 0, 0, 0]);
        let mut state = RealismState::default();

        // The step that starts the blockage still moves
        let out = state.apply(&config, nominal_demand());
        assert_eq!(out.left_pct, 50.0);

        // Subsequent steps inside the window are pinned
        let out = state.apply(&config, nominal_demand());
        assert_eq!(out.left_pct, 0.0);
        assert_eq!(out.right_pct, 0.0);

        std::thread::sleep(std::time::Duration::from_millis(600));

        let out = state.apply(&config, nominal_demand());
        assert_eq!(out, nominal_demand());
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let config = pseudo_config(&[2, 0]);
        let mut state = RealismState::default();

        let first = state.apply(&config, nominal_demand());
        state.apply(&config, nominal_demand());

        state.reset();

        let replayed = state.apply(&config, nominal_demand());
        assert_eq!(replayed, first);
    }
}
