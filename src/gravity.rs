//! Frame transform and gravity compensation
//!
//! Body-frame specific force is rotated into the reference frame with the
//! orientation track. The mean over the leading stationary window is taken
//! as the static gravity vector and removed from every sample.

use nalgebra::{UnitQuaternion, Vector3};
use tracing::debug;

use crate::state::{GravityEstimate, SynchronizedFrame};
use crate::{Result, Stage, TrackError};

/// Global-frame acceleration with and without gravity
#[derive(Debug, Clone)]
pub struct GravityCompensation {
    pub accel_global: Vec<Vector3<f64>>,
    pub accel_motion: Vec<Vector3<f64>>,
    pub gravity: GravityEstimate,
}

/// Rotates every accelerometer sample by its attitude.
pub fn rotate_to_global(
    frames: &[SynchronizedFrame],
    track: &[UnitQuaternion<f64>],
) -> Result<Vec<Vector3<f64>>> {
    if frames.len() != track.len() {
        return Err(TrackError::LengthMismatch {
            stage: Stage::GravityCompensator,
            context: "orientation track",
            expected: frames.len(),
            got: track.len(),
        });
    }

    Ok(frames
        .iter()
        .zip(track.iter())
        .map(|(f, q)| q.transform_vector(&f.accel))
        .collect())
}

/// Number of leading samples covered by a window of `window_seconds`.
pub fn window_samples(window_seconds: f64, sample_rate_hz: f64) -> usize {
    (window_seconds * sample_rate_hz).round().max(0.0) as usize
}

/// Mean global acceleration over the leading stationary window.
pub fn estimate_gravity(
    accel_global: &[Vector3<f64>],
    trace_seconds: f64,
    sample_rate_hz: f64,
    window_seconds: f64,
) -> Result<GravityEstimate> {
    let count = window_samples(window_seconds, sample_rate_hz);
    if count == 0 || count > accel_global.len() {
        return Err(TrackError::WindowOutOfRange {
            stage: Stage::GravityCompensator,
            window_s: window_seconds,
            window_samples: count,
            trace_s: trace_seconds,
            trace_samples: accel_global.len(),
        });
    }

    let sum: Vector3<f64> = accel_global[..count].iter().sum();
    Ok(GravityEstimate::new(sum / count as f64, count))
}

/// Rotates a filtered trace into the global frame and removes gravity.
pub fn compensate(
    frames: &[SynchronizedFrame],
    track: &[UnitQuaternion<f64>],
    sample_rate_hz: f64,
    window_seconds: f64,
) -> Result<GravityCompensation> {
    let accel_global = rotate_to_global(frames, track)?;
    let trace_seconds = frames.last().map(|f| f.timestamp).unwrap_or(0.0);
    let gravity = estimate_gravity(&accel_global, trace_seconds, sample_rate_hz, window_seconds)?;

    debug!(
        gx = gravity.vector.x,
        gy = gravity.vector.y,
        gz = gravity.vector.z,
        magnitude = gravity.magnitude,
        samples = gravity.samples,
        "estimated gravity vector"
    );

    let accel_motion = accel_global.iter().map(|a| a - gravity.vector).collect();

    Ok(GravityCompensation {
        accel_global,
        accel_motion,
        gravity,
    })
}
