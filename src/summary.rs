//! Trajectory summary
//!
//! Scalar metrics derived from the motion frames of one run. Nothing here
//! modifies the trajectory.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::state::{GravityEstimate, MotionFrame};
use crate::units::UnitDecision;

/// Scalar metrics of one reconstructed trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    /// ‖p_last - p_first‖ [m]
    pub net_displacement: f64,
    /// Last minus first timestamp [s]
    pub duration: f64,
    /// Largest ‖v‖ over the trace [m/s]
    pub max_speed: f64,
    /// Sum of per-step position increments [m]
    pub path_length: f64,
    /// ‖v_last‖, non-zero at the end of a stationary recording means drift
    pub final_speed: f64,
    pub final_position: Vector3<f64>,
    pub sample_count: usize,
    pub sampling_rate_hz: f64,
    pub gravity_magnitude: f64,
    /// Gravity magnitude minus the configured standard gravity
    pub gravity_deviation: f64,
    pub unit_decision: UnitDecision,
}

impl TrajectorySummary {
    pub fn from_motion(
        motion: &[MotionFrame],
        sampling_rate_hz: f64,
        gravity: &GravityEstimate,
        standard_gravity: f64,
        unit_decision: UnitDecision,
    ) -> Self {
        let (net_displacement, duration, final_position, final_speed) =
            match (motion.first(), motion.last()) {
                (Some(first), Some(last)) => (
                    (last.position - first.position).norm(),
                    last.timestamp - first.timestamp,
                    last.position,
                    last.velocity.norm(),
                ),
                _ => (0.0, 0.0, Vector3::zeros(), 0.0),
            };

        let max_speed = motion
            .iter()
            .map(|m| m.velocity.norm())
            .fold(0.0, f64::max);

        let path_length = motion
            .windows(2)
            .map(|pair| (pair[1].position - pair[0].position).norm())
            .sum();

        Self {
            net_displacement,
            duration,
            max_speed,
            path_length,
            final_speed,
            final_position,
            sample_count: motion.len(),
            sampling_rate_hz,
            gravity_magnitude: gravity.magnitude,
            gravity_deviation: gravity.deviation_from(standard_gravity),
            unit_decision,
        }
    }

    /// Compares the net displacement against a tape-measured distance.
    pub fn compare_to_reference(&self, reference_m: f64) -> DistanceError {
        DistanceError::new(self.net_displacement, reference_m)
    }
}

/// Estimated vs measured distance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceError {
    pub estimated_m: f64,
    pub reference_m: f64,
    pub absolute_error_m: f64,
    /// `absolute_error_m / reference_m`, `None` for a zero reference
    pub relative_error: Option<f64>,
}

impl DistanceError {
    pub fn new(estimated_m: f64, reference_m: f64) -> Self {
        let absolute_error_m = (estimated_m - reference_m).abs();
        let relative_error = if reference_m.abs() > 0.0 {
            Some(absolute_error_m / reference_m.abs())
        } else {
            None
        };
        Self {
            estimated_m,
            reference_m,
            absolute_error_m,
            relative_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::GyroUnit;

    fn decision() -> UnitDecision {
        UnitDecision {
            unit: GyroUnit::RadiansPerSecond,
            percentile: 0.1,
            normalized_percentile: 0.1,
            threshold: 20.0,
        }
    }

    fn motion_frame(t: f64, v: Vector3<f64>, p: Vector3<f64>) -> MotionFrame {
        MotionFrame {
            timestamp: t,
            accel_global: Vector3::zeros(),
            accel_motion: Vector3::zeros(),
            velocity: v,
            position: p,
        }
    }

    #[test]
    fn test_out_and_back_path() {
        let motion = vec![
            motion_frame(0.0, Vector3::zeros(), Vector3::zeros()),
            motion_frame(1.0, Vector3::new(2.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)),
            motion_frame(2.0, Vector3::new(0.0, 0.5, 0.0), Vector3::new(0.0, 0.0, 0.0)),
        ];
        let gravity = GravityEstimate::new(Vector3::new(0.0, 0.0, 9.81), 100);
        let s = TrajectorySummary::from_motion(&motion, 1.0, &gravity, 9.80665, decision());

        assert_eq!(s.net_displacement, 0.0);
        assert_eq!(s.path_length, 2.0);
        assert_eq!(s.duration, 2.0);
        assert_eq!(s.max_speed, 2.0);
        assert_eq!(s.final_speed, 0.5);
        assert_eq!(s.sample_count, 3);
        assert!((s.gravity_deviation - (9.81 - 9.80665)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_motion() {
        let gravity = GravityEstimate::new(Vector3::zeros(), 0);
        let s = TrajectorySummary::from_motion(&[], 50.0, &gravity, 9.80665, decision());
        assert_eq!(s.sample_count, 0);
        assert_eq!(s.net_displacement, 0.0);
        assert_eq!(s.path_length, 0.0);
    }

    #[test]
    fn test_reference_comparison() {
        let err = DistanceError::new(4.5, 5.0);
        assert!((err.absolute_error_m - 0.5).abs() < 1e-12);
        assert!((err.relative_error.unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(DistanceError::new(1.0, 0.0).relative_error, None);
    }
}
