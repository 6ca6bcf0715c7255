//! Dead-reckoning integrator
//!
//! Trapezoidal integration of acceleration to velocity and of velocity to
//! position. Both start at zero at frame 0.
//!
//! Velocity error grows linearly and position error quadratically with any
//! residual bias, so long traces drift without external correction.

use nalgebra::Vector3;
use tracing::debug;

use crate::state::time_steps;
use crate::{Result, Stage, TrackError};

/// Velocity and position sequences, index-aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Kinematics {
    pub velocity: Vec<Vector3<f64>>,
    pub position: Vec<Vector3<f64>>,
}

/// Cumulative trapezoid of `values` over `timestamps`, starting at zero.
pub fn cumulative_trapezoid(
    timestamps: &[f64],
    values: &[Vector3<f64>],
) -> Result<Vec<Vector3<f64>>> {
    if timestamps.len() != values.len() {
        return Err(TrackError::LengthMismatch {
            stage: Stage::Integrator,
            context: "timestamps",
            expected: values.len(),
            got: timestamps.len(),
        });
    }

    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return Ok(out);
    }

    let dts = time_steps(timestamps);
    let mut acc = Vector3::zeros();
    out.push(acc);
    for k in 1..values.len() {
        let dt = dts[k];
        if !(dt > 0.0) {
            return Err(TrackError::NonMonotonicTime {
                stage: Stage::Integrator,
                index: k,
                timestamp: timestamps[k],
                dt,
            });
        }
        acc += (values[k] + values[k - 1]) * (0.5 * dt);
        out.push(acc);
    }
    Ok(out)
}

/// Integrates gravity-free acceleration twice.
pub fn integrate(timestamps: &[f64], accel_motion: &[Vector3<f64>]) -> Result<Kinematics> {
    let velocity = cumulative_trapezoid(timestamps, accel_motion)?;
    let position = cumulative_trapezoid(timestamps, &velocity)?;

    if let Some(p) = position.last() {
        debug!(
            frames = position.len(),
            final_x = p.x,
            final_y = p.y,
            final_z = p.z,
            "integrated trajectory"
        );
    }

    Ok(Kinematics { velocity, position })
}
