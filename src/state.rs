//! Trace data model
//!
//! Every entity here is derived once per run and never mutated afterwards:
//! - `RawSample`: one accelerometer or gyroscope reading
//! - `SynchronizedFrame`: accelerometer sample paired with its gyro partner
//! - `OrientationTrack`: one unit quaternion per frame
//! - `MotionFrame`: global-frame kinematics for one frame
//! - `GravityEstimate`: static gravity vector from the stationary window

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// One timestamped 3-axis sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Timestamp [s]
    pub timestamp: f64,
    /// Sensor value in the body frame
    pub value: Vector3<f64>,
}

impl RawSample {
    pub fn new(timestamp: f64, value: Vector3<f64>) -> Self {
        Self { timestamp, value }
    }

    pub fn from_xyz(timestamp: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp,
            value: Vector3::new(x, y, z),
        }
    }
}

/// Accelerometer sample with its nearest gyroscope partner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynchronizedFrame {
    /// Zero-based timestamp taken from the accelerometer stream [s]
    pub timestamp: f64,
    /// Specific force in the body frame [m/s^2]
    pub accel: Vector3<f64>,
    /// Angular rate in the body frame
    pub gyro: Vector3<f64>,
}

impl SynchronizedFrame {
    pub fn new(timestamp: f64, accel: Vector3<f64>, gyro: Vector3<f64>) -> Self {
        Self {
            timestamp,
            accel,
            gyro,
        }
    }
}

/// Body-to-reference rotation per frame, index-aligned with the frames.
pub type OrientationTrack = Vec<UnitQuaternion<f64>>;

/// Global-frame kinematics of one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionFrame {
    pub timestamp: f64,
    /// Acceleration rotated into the global frame, gravity included
    pub accel_global: Vector3<f64>,
    /// Global acceleration with the gravity estimate removed
    pub accel_motion: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub position: Vector3<f64>,
}

/// Static gravity vector estimated from the stationary window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityEstimate {
    /// Mean global acceleration over the window [m/s^2]
    pub vector: Vector3<f64>,
    /// Norm of `vector`
    pub magnitude: f64,
    /// Number of frames averaged
    pub samples: usize,
}

impl GravityEstimate {
    pub fn new(vector: Vector3<f64>, samples: usize) -> Self {
        Self {
            vector,
            magnitude: vector.norm(),
            samples,
        }
    }

    /// Signed deviation of the magnitude from a reference gravity.
    pub fn deviation_from(&self, reference: f64) -> f64 {
        self.magnitude - reference
    }
}

/// Per-frame time steps; `dt[0]` is zero.
pub fn time_steps(timestamps: &[f64]) -> Vec<f64> {
    let mut dt = Vec::with_capacity(timestamps.len());
    if timestamps.is_empty() {
        return dt;
    }
    dt.push(0.0);
    dt.extend(timestamps.windows(2).map(|pair| pair[1] - pair[0]));
    dt
}
