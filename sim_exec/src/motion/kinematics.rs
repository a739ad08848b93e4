//! Differential-drive pose-advance kinematics
//!
//! Pure closed-form integration of one time slice of motion. The frame is
//! the screen frame used by the mower's mapping clients: at heading 0 the
//! forward direction is (0, +1) and the heading increases on a
//! counter-clockwise turn, so forward is (-sin(theta), +cos(theta)).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::norm_2pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed difference below which the two wheels are treated as equal and the
/// motion as a straight line.
const STRAIGHT_EPSILON_PCT: f64 = 1e-6;

/// Velocity magnitude difference below which a signs-differ command is
/// treated as a pivot about a fixed centre.
const PIVOT_EPSILON_MPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar pose: position in meters plus heading in radians, normalised to
/// [0, 2pi).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x_m: f64,
    pub y_m: f64,
    pub theta_rad: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Advance a pose by one time slice of wheel demand.
///
/// Speeds are percentages of `full_speed_mps`. There are no error
/// conditions: numerically degenerate inputs (both wheels stopped) fall into
/// the straight branch with zero displacement.
pub fn advance(
    pose: Pose,
    left_pct: f64,
    right_pct: f64,
    dur_ms: f64,
    axle_track_m: f64,
    full_speed_mps: f64,
) -> Pose {
    let dur_s = dur_ms / 1000.0;
    let v_l = full_speed_mps * left_pct / 100.0;
    let v_r = full_speed_mps * right_pct / 100.0;

    // Straight line, including the degenerate all-stop case
    if (left_pct - right_pct).abs() < STRAIGHT_EPSILON_PCT {
        return Pose {
            x_m: pose.x_m - dur_s * pose.theta_rad.sin() * v_l,
            y_m: pose.y_m + dur_s * pose.theta_rad.cos() * v_l,
            theta_rad: norm_2pi(pose.theta_rad),
        };
    }

    let v_diff = v_r - v_l;
    let v_sum = v_r + v_l;
    let radius_m = (axle_track_m * v_sum / (2.0 * v_diff)).abs();

    // Pivot: equal magnitudes with differing signs. The turn radius is zero
    // for a pure pivot so the translation term vanishes.
    if (v_l.abs() - v_r.abs()).abs() < PIVOT_EPSILON_MPS {
        let d_theta = v_diff * dur_s / axle_track_m;
        let theta = pose.theta_rad;

        return Pose {
            x_m: pose.x_m + radius_m * ((theta + d_theta).sin() - theta.sin()),
            y_m: pose.y_m + radius_m * ((theta + d_theta).cos() - theta.cos()),
            theta_rad: norm_2pi(theta + d_theta),
        };
    }

    // Arc about a centre of rotation offset perpendicular to the heading.
    // The sweep angle uses the faster tyre's travel over the centre radius.
    let ccw = (v_l > 0.0 && v_r > 0.0 && v_r > v_l)
        || (v_l < 0.0 && v_r < 0.0 && v_l > v_r)
        || (v_r > 0.0 && v_l < 0.0);
    let side = if ccw { 1.0 } else { -1.0 };

    let tyre_travel_m = v_l.max(v_r) * dur_s;
    let d_theta = side * tyre_travel_m / radius_m;

    let theta = pose.theta_rad;
    let centre_x = pose.x_m - side * radius_m * theta.cos();
    let centre_y = pose.y_m - side * radius_m * theta.sin();

    let (arm_x, arm_y) = (pose.x_m - centre_x, pose.y_m - centre_y);
    let (sin_d, cos_d) = d_theta.sin_cos();

    Pose {
        x_m: centre_x + arm_x * cos_d - arm_y * sin_d,
        y_m: centre_y + arm_x * sin_d + arm_y * cos_d,
        theta_rad: norm_2pi(theta + d_theta),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
