//! Stepwise actuation scheduler
//!
//! Turns one `sweep` command into a run of fixed-duration integration steps
//! executed on a dedicated stepper thread. At most one run is active at a
//! time; a new command pre-empts the active run by raising its cancel flag
//! and joining the thread, so a step already in flight completes but its
//! successor never starts.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};

// Internal
use super::kinematics;
use super::realism::{StepDemand, REALISM};
use super::{MotionError, BATTERY_MIN_CHARGE, MIN_STEP_DUR_MS};
use crate::data_store::{lock_store, DataStore, RelAdjust};

// Standard
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Owner of the stepper thread. Lives inside the engine next to the shared
/// data store.
pub struct MotionScheduler {
    store: Arc<Mutex<DataStore>>,

    /// The active run, if one exists.
    active: Option<ActiveRun>,
}

/// Handle on a running stepper thread.
struct ActiveRun {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl MotionScheduler {
    pub fn new(store: Arc<Mutex<DataStore>>) -> Self {
        MotionScheduler {
            store,
            active: None,
        }
    }

    /// Start, adjust or pre-empt motion.
    ///
    /// A negative duration is a relative in-flight adjustment: the speeds
    /// become deltas applied to upcoming steps for `|duration_ms|` of step
    /// time and the active run is left alone. Otherwise any active run is
    /// pre-empted and a new stepper thread is started.
    pub fn actuate(
        &mut self,
        left_pct: f64,
        right_pct: f64,
        duration_ms: f64,
        last_cmd_id: Option<i64>,
    ) -> Result<(), MotionError> {
        let (step_count, step_dur_ms) = {
            let mut ds = lock_store(&self.store);

            if ds.axle_track_m == 0.0 || ds.full_speed_mps == 0.0 {
                return Err(MotionError::NotInitialised);
            }

            if let Some(id) = last_cmd_id {
                ds.last_cmd_id = id;
            }

            if duration_ms < 0.0 {
                debug!(
                    "Relative adjustment ({}, {}) for {} ms of step time",
                    left_pct, right_pct, -duration_ms
                );
                ds.rel_adjust = RelAdjust {
                    left_delta_pct: left_pct,
                    right_delta_pct: right_pct,
                    remaining_ms: -duration_ms,
                };
                return Ok(());
            }

            ds.left_forward = left_pct >= 0.0;
            ds.right_forward = right_pct >= 0.0;

            // A fresh run starts with no relative adjustment
            ds.rel_adjust = RelAdjust::default();

            let step_count = ((duration_ms / MIN_STEP_DUR_MS).floor() as u64).max(1);
            (step_count, duration_ms / step_count as f64)
        };

        // Pre-empt outside the lock: the stepper thread needs the store to
        // finish its in-flight step before it can be joined
        self.cancel_active();

        let battery_charge = lock_store(&self.store).battery_charge;
        if battery_charge < BATTERY_MIN_CHARGE {
            trace!(
                "Battery charge {} below minimum {}, motion skipped",
                battery_charge,
                BATTERY_MIN_CHARGE
            );
            return Ok(());
        }

        debug!(
            "Actuating ({}, {}) over {} steps of {} ms",
            left_pct, right_pct, step_count, step_dur_ms
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let store = Arc::clone(&self.store);
        let flag = Arc::clone(&cancel);

        let handle = thread::spawn(move || {
            step_loop(store, flag, step_count, step_dur_ms, left_pct, right_pct)
        });

        self.active = Some(ActiveRun { cancel, handle });

        Ok(())
    }

    /// Pre-empt the active run, if any, and wait for its thread to finish.
    pub fn cancel_active(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.store(true, Ordering::SeqCst);
            if run.handle.join().is_err() {
                debug!("Stepper thread panicked before join");
            }
        }
    }

    /// Block until the active run completes of its own accord.
    #[cfg(test)]
    pub fn join_active(&mut self) {
        if let Some(run) = self.active.take() {
            let _ = run.handle.join();
        }
    }
}

impl Drop for MotionScheduler {
    fn drop(&mut self) {
        self.cancel_active();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Body of the stepper thread. Sleeps for one step duration, checks the
/// cancel flag, then integrates one step under the store lock.
fn step_loop(
    store: Arc<Mutex<DataStore>>,
    cancel: Arc<AtomicBool>,
    step_count: u64,
    step_dur_ms: f64,
    left_pct: f64,
    right_pct: f64,
) {
    for remaining in (0..step_count).rev() {
        thread::sleep(Duration::from_secs_f64(step_dur_ms / 1000.0));

        if cancel.load(Ordering::SeqCst) {
            trace!("Run cancelled with {} steps remaining", remaining + 1);
            return;
        }

        let mut ds = lock_store(&store);

        let mut step_left = left_pct;
        let mut step_right = right_pct;
        if ds.rel_adjust.remaining_ms > 0.0 {
            step_left += ds.rel_adjust.left_delta_pct;
            step_right += ds.rel_adjust.right_delta_pct;
            ds.rel_adjust.remaining_ms -= MIN_STEP_DUR_MS;
        }

        let full_speed_mps = ds.full_speed_mps;
        let demand = ds.realism.apply(
            &REALISM,
            StepDemand {
                left_pct: step_left,
                right_pct: step_right,
                dur_ms: step_dur_ms,
                full_speed_mps,
            },
        );

        let pose = kinematics::advance(
            ds.pose,
            demand.left_pct,
            demand.right_pct,
            demand.dur_ms,
            ds.axle_track_m,
            demand.full_speed_mps,
        );
        ds.pose = pose;

        if ds.simulate_battery && (demand.left_pct != 0.0 || demand.right_pct != 0.0) {
            ds.battery_charge -= 1;
        }

        trace!(
            "Step done, {} remaining, pose {}",
            remaining,
            ds.format_pose()
        );
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{CommsRealismParams, SimExecParams};

    const EPSILON: f64 = 1e-9;

    fn test_store(battery: i64) -> Arc<Mutex<DataStore>> {
        let params = SimExecParams {
            bind_endpoint: String::from("127.0.0.1:0"),
            initial_battery_charge: battery,
            simulate_battery: true,
            default_ssid: String::from("mower-sim"),
            comms_realism: CommsRealismParams {
                enabled: false,
                fail_prob: 0.0,
                fail_duration_s: 0.0,
            },
        };
        let mut ds = DataStore::new(&params);
        ds.set_pose(0.0, 0.0, 0.0, Some(0.3), Some(0.5));
        Arc::new(Mutex::new(ds))
    }

    #[test]
    fn test_straight_run_lands_on_target() {
        let store = test_store(1000);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        sched.actuate(50.0, 50.0, 2000.0, None).unwrap();
        sched.join_active();

        let ds = lock_store(&store);
        assert!((ds.pose.x_m - 0.0).abs() < EPSILON);
        assert!((ds.pose.y_m - 0.5).abs() < EPSILON);
        assert!((ds.pose.theta_rad - 0.0).abs() < EPSILON);
        // 8 steps at non-zero demand drain 8 units
        assert_eq!(ds.battery_charge, 992);
    }

    #[test]
    fn test_pivot_run_turns_in_place() {
        let store = test_store(1000);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        sched.actuate(-50.0, 50.0, 1000.0, None).unwrap();
        sched.join_active();

        let ds = lock_store(&store);
        assert!((ds.pose.x_m - 0.0).abs() < EPSILON);
        assert!((ds.pose.y_m - 0.0).abs() < EPSILON);
        assert!((ds.pose.theta_rad - 0.5 / 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_preemption_halts_motion() {
        let store = test_store(1000);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        sched.actuate(100.0, 100.0, 5000.0, None).unwrap();
        thread::sleep(Duration::from_millis(500));
        sched.actuate(0.0, 0.0, 1.0, None).unwrap();
        sched.join_active();

        // 5 s at 0.5 m/s would travel 2.5 m; pre-emption after ~500 ms
        // allows at most a handful of 250 ms steps
        let ds = lock_store(&store);
        assert!(ds.pose.y_m < 0.5, "travelled {} m", ds.pose.y_m);
    }

    #[test]
    fn test_relative_adjustment_applies_then_expires() {
        let store = test_store(1000);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        sched.actuate(50.0, 50.0, 1000.0, None).unwrap();
        // Lands before the first 250 ms step fires
        sched.actuate(10.0, 10.0, -500.0, None).unwrap();
        sched.join_active();

        // Two steps at 60% then two at 50%:
        // 2 * 0.25 * 0.30 + 2 * 0.25 * 0.25 = 0.275 m
        let ds = lock_store(&store);
        assert!((ds.pose.y_m - 0.275).abs() < EPSILON, "y = {}", ds.pose.y_m);
        assert!(ds.rel_adjust.remaining_ms <= 0.0);
    }

    #[test]
    fn test_negative_duration_does_not_preempt() {
        let store = test_store(1000);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        sched.actuate(50.0, 50.0, 500.0, None).unwrap();
        sched.actuate(5.0, 5.0, -250.0, Some(7)).unwrap();

        // The run handle is still owned, so the adjustment left it alive
        assert!(sched.active.is_some());
        sched.join_active();

        let ds = lock_store(&store);
        assert_eq!(ds.last_cmd_id, 7);
        assert!(ds.pose.y_m > 0.0);
    }

    #[test]
    fn test_new_run_clears_stale_adjustment() {
        let store = test_store(1000);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        // Leave an adjustment with plenty of runway behind, with no run to
        // consume it
        sched.actuate(50.0, 50.0, -1000.0, None).unwrap();

        sched.actuate(50.0, 50.0, 1000.0, None).unwrap();
        sched.join_active();

        // The fresh run drives at 50%, not 100%: 1 s at 0.25 m/s
        let ds = lock_store(&store);
        assert!((ds.pose.y_m - 0.25).abs() < EPSILON, "y = {}", ds.pose.y_m);
        assert_eq!(ds.rel_adjust, RelAdjust::default());
    }

    #[test]
    fn test_low_battery_skips_motion() {
        let store = test_store(100);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        sched.actuate(50.0, 50.0, 1000.0, None).unwrap();
        assert!(sched.active.is_none());

        let ds = lock_store(&store);
        assert_eq!(ds.pose.y_m, 0.0);
        assert_eq!(ds.battery_charge, 100);
    }

    #[test]
    fn test_uninitialised_store_rejects_motion() {
        let params = SimExecParams {
            bind_endpoint: String::from("127.0.0.1:0"),
            initial_battery_charge: 1000,
            simulate_battery: true,
            default_ssid: String::from("mower-sim"),
            comms_realism: CommsRealismParams {
                enabled: false,
                fail_prob: 0.0,
                fail_duration_s: 0.0,
            },
        };
        let store = Arc::new(Mutex::new(DataStore::new(&params)));
        let mut sched = MotionScheduler::new(store);

        let result = sched.actuate(50.0, 50.0, 1000.0, None);
        assert!(matches!(result, Err(MotionError::NotInitialised)));
    }

    #[test]
    fn test_short_command_runs_one_step() {
        let store = test_store(1000);
        let mut sched = MotionScheduler::new(Arc::clone(&store));

        // 100 ms is below the step size, so one step of the full duration
        sched.actuate(50.0, 50.0, 100.0, None).unwrap();
        sched.join_active();

        let ds = lock_store(&store);
        assert!((ds.pose.y_m - 0.025).abs() < EPSILON);
        assert_eq!(ds.battery_charge, 999);
    }
}
