//! Orientation observer
//!
//! Gradient-descent attitude filter (Madgwick IMU form). Each step
//! propagates the quaternion with the measured angular rate, then pulls it
//! toward the attitude whose "up" axis matches the measured specific force.
//! The accelerometer is treated as a pure gravity reference, which only
//! holds while non-gravitational acceleration is small next to g.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{time_steps, OrientationTrack, SynchronizedFrame};
use crate::{Result, Stage, TrackError};

/// Guard against division by a vanishing norm.
pub const NORM_EPSILON: f64 = 1e-12;

/// Orientation observer
#[derive(Debug, Clone)]
pub struct OrientationObserver {
    /// Gradient-descent gain (beta)
    gain: f64,
    /// Current body-to-reference rotation
    state: UnitQuaternion<f64>,
}

impl OrientationObserver {
    /// Create a new observer at the identity attitude
    pub fn new(gain: f64) -> Self {
        Self {
            gain,
            state: UnitQuaternion::identity(),
        }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Get the current attitude
    pub fn state(&self) -> UnitQuaternion<f64> {
        self.state
    }

    /// Advance the observer by one frame.
    ///
    /// `index` only labels errors.
    pub fn step(
        &mut self,
        frame: &SynchronizedFrame,
        dt: f64,
        index: usize,
    ) -> Result<UnitQuaternion<f64>> {
        self.state = transition(self.state, frame, dt, self.gain, index)?;
        Ok(self.state)
    }
}

/// One update of the recurrence: `(state, frame) -> state`.
pub fn transition(
    state: UnitQuaternion<f64>,
    frame: &SynchronizedFrame,
    dt: f64,
    gain: f64,
    index: usize,
) -> Result<UnitQuaternion<f64>> {
    if !(dt > 0.0) {
        return Err(TrackError::NonMonotonicTime {
            stage: Stage::OrientationEstimator,
            index,
            timestamp: frame.timestamp,
            dt,
        });
    }

    let accel_norm = frame.accel.norm();
    if !(accel_norm > NORM_EPSILON) {
        return Err(TrackError::NumericDegeneracy {
            stage: Stage::OrientationEstimator,
            quantity: "accelerometer",
            index,
            norm: accel_norm,
        });
    }
    let a = frame.accel / (accel_norm + NORM_EPSILON);

    let q = state.into_inner();
    let q_dot_gyro = q * Quaternion::from_imag(frame.gyro) * 0.5;

    let gradient = objective_gradient(&q, &a);
    let gradient_norm = gradient.norm();
    let q_dot = if gradient_norm > NORM_EPSILON {
        q_dot_gyro - gradient * (gain / gradient_norm)
    } else {
        q_dot_gyro
    };

    let next = q + q_dot * dt;
    let next_norm = next.norm();
    if !(next_norm.is_finite() && next_norm > NORM_EPSILON) {
        return Err(TrackError::NumericDegeneracy {
            stage: Stage::OrientationEstimator,
            quantity: "quaternion",
            index,
            norm: next_norm,
        });
    }

    Ok(UnitQuaternion::new_normalize(next))
}

/// Gradient of `f(q) = R(q)^T z - a` with respect to `(w, x, y, z)`.
fn objective_gradient(q: &Quaternion<f64>, a: &Vector3<f64>) -> Quaternion<f64> {
    let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);

    let f1 = 2.0 * (q1 * q3 - q0 * q2) - a.x;
    let f2 = 2.0 * (q0 * q1 + q2 * q3) - a.y;
    let f3 = 2.0 * (0.5 - q1 * q1 - q2 * q2) - a.z;

    Quaternion::new(
        -2.0 * q2 * f1 + 2.0 * q1 * f2,
        2.0 * q3 * f1 + 2.0 * q0 * f2 - 4.0 * q1 * f3,
        -2.0 * q0 * f1 + 2.0 * q3 * f2 - 4.0 * q2 * f3,
        2.0 * q1 * f1 + 2.0 * q2 * f2,
    )
}

/// Folds the observer over a trace. Frame 0 carries the identity; every
/// later frame is updated with its own gyro/accel and the step since the
/// previous frame.
pub fn estimate_orientation(frames: &[SynchronizedFrame], gain: f64) -> Result<OrientationTrack> {
    let mut track = Vec::with_capacity(frames.len());
    if frames.is_empty() {
        return Ok(track);
    }

    let mut observer = OrientationObserver::new(gain);
    track.push(observer.state());

    let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
    let dts = time_steps(&timestamps);
    for (idx, (frame, &dt)) in frames.iter().zip(dts.iter()).enumerate().skip(1) {
        track.push(observer.step(frame, dt, idx)?);
    }

    if let Some(last) = track.last() {
        debug!(frames = track.len(), final_angle_rad = last.angle(), "orientation track complete");
    }
    Ok(track)
}

/// Roll / pitch / yaw view of an attitude [deg]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

impl EulerAngles {
    /// Extrinsic x-y-z angles of `q`.
    pub fn from_quaternion(q: &UnitQuaternion<f64>) -> Self {
        let (roll, pitch, yaw) = q.euler_angles();
        Self {
            roll_deg: roll.to_degrees(),
            pitch_deg: pitch.to_degrees(),
            yaw_deg: yaw.to_degrees(),
        }
    }
}

/// Euler view of a whole track, index-aligned with it.
pub fn euler_track(track: &[UnitQuaternion<f64>]) -> Vec<EulerAngles> {
    track.iter().map(EulerAngles::from_quaternion).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(t: f64, accel: Vector3<f64>, gyro: Vector3<f64>) -> SynchronizedFrame {
        SynchronizedFrame::new(t, accel, gyro)
    }

    #[test]
    fn test_observer_creation() {
        let observer = OrientationObserver::new(0.1);
        assert_eq!(observer.gain(), 0.1);
        assert_eq!(observer.state(), UnitQuaternion::identity());
    }

    #[test]
    fn test_zero_input_stays_identity() {
        let frames: Vec<_> = (0..200)
            .map(|i| frame(i as f64 * 0.01, Vector3::new(0.0, 0.0, -9.81), Vector3::zeros()))
            .collect();
        let track = estimate_orientation(&frames, 0.1).unwrap();
        assert_eq!(track.len(), frames.len());
        for q in track {
            assert!(q.angle() < 1e-12);
        }
    }

    #[test]
    fn test_level_gravity_stays_identity() {
        let frames: Vec<_> = (0..50)
            .map(|i| frame(i as f64 * 0.02, Vector3::new(0.0, 0.0, 9.81), Vector3::zeros()))
            .collect();
        let track = estimate_orientation(&frames, 0.1).unwrap();
        assert!(track.iter().all(|q| q.angle() < 1e-12));
    }

    #[test]
    fn test_yaw_rate_integrates() {
        let rate = 1.0;
        let frames: Vec<_> = (0..=100)
            .map(|i| frame(i as f64 * 0.01, Vector3::new(0.0, 0.0, 9.81), Vector3::new(0.0, 0.0, rate)))
            .collect();
        let track = estimate_orientation(&frames, 0.1).unwrap();
        let euler = EulerAngles::from_quaternion(track.last().unwrap());
        assert!((euler.yaw_deg.to_radians() - rate * 1.0).abs() < 1e-4);
        assert!(euler.roll_deg.abs() < 1e-9);
        assert!(euler.pitch_deg.abs() < 1e-9);
    }

    #[test]
    fn test_uneven_spacing_uses_each_step() {
        // Yaw after a pure rate is rate * elapsed regardless of spacing.
        let times = [0.0, 0.01, 0.05, 0.06, 0.2, 0.35, 0.5];
        let frames: Vec<_> = times
            .iter()
            .map(|&t| frame(t, Vector3::new(0.0, 0.0, 9.81), Vector3::new(0.0, 0.0, 2.0)))
            .collect();
        let track = estimate_orientation(&frames, 0.1).unwrap();
        let yaw: Vec<f64> = euler_track(&track).iter().map(|e| e.yaw_deg.to_radians()).collect();
        assert_eq!(yaw.len(), times.len());
        for (got, t) in yaw.iter().zip(times) {
            assert!((got - 2.0 * t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_tilt_converges_to_gravity_direction() {
        let tilt = UnitQuaternion::from_euler_angles(30f64.to_radians(), 0.0, 0.0);
        let accel = tilt.inverse_transform_vector(&Vector3::new(0.0, 0.0, 9.81));
        let frames: Vec<_> = (0..2000)
            .map(|i| frame(i as f64 * 0.01, accel, Vector3::zeros()))
            .collect();
        let track = estimate_orientation(&frames, 0.1).unwrap();
        let q = track.last().unwrap();

        let up_in_body = q.inverse_transform_vector(&Vector3::z());
        assert!((up_in_body - accel.normalize()).norm() < 1e-2);
        assert!((EulerAngles::from_quaternion(q).roll_deg - 30.0).abs() < 1.0);
    }

    #[test]
    fn test_sustained_push_biases_tilt() {
        // A level body pushed at 1 m/s^2 reads as tilted by atan(1 / g).
        let accel = Vector3::new(1.0, 0.0, 9.81);
        let frames: Vec<_> = (0..300)
            .map(|i| frame(i as f64 * 0.01, accel, Vector3::zeros()))
            .collect();
        let track = estimate_orientation(&frames, 0.1).unwrap();
        let expected = (1.0f64 / 9.81).atan();
        assert!((track.last().unwrap().angle() - expected).abs() < 0.3f64.to_radians());
    }

    #[test]
    fn test_non_positive_dt_rejected() {
        let f = frame(0.5, Vector3::new(0.0, 0.0, 9.81), Vector3::zeros());
        let err = transition(UnitQuaternion::identity(), &f, 0.0, 0.1, 7).unwrap_err();
        assert!(matches!(
            err,
            TrackError::NonMonotonicTime {
                stage: Stage::OrientationEstimator,
                index: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_accel_is_degenerate() {
        let frames = vec![
            frame(0.0, Vector3::new(0.0, 0.0, 9.81), Vector3::zeros()),
            frame(0.01, Vector3::zeros(), Vector3::zeros()),
        ];
        let err = estimate_orientation(&frames, 0.1).unwrap_err();
        assert!(matches!(
            err,
            TrackError::NumericDegeneracy {
                quantity: "accelerometer",
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_step_matches_transition() {
        let f = frame(0.01, Vector3::new(0.3, -0.2, 9.7), Vector3::new(0.2, 0.1, -0.3));
        let mut observer = OrientationObserver::new(0.1);
        let stepped = observer.step(&f, 0.01, 1).unwrap();
        let pure = transition(UnitQuaternion::identity(), &f, 0.01, 0.1, 1).unwrap();
        assert_eq!(stepped, pure);
        assert!((stepped.into_inner().norm() - 1.0).abs() < 1e-12);
    }
}
