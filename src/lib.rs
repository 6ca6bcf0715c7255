//! inertrack - inertial dead-reckoning
//!
//! Reconstructs orientation, gravity-free acceleration, velocity and position
//! from independently sampled accelerometer and gyroscope traces.
//!
//! The pipeline runs strictly forward over one bounded trace:
//! synchronize -> normalize gyro units -> low-pass filter -> estimate
//! orientation -> rotate to the global frame and remove gravity ->
//! integrate twice -> summarize.

use std::fmt;

use thiserror::Error;

pub mod filter;
pub mod gravity;
pub mod integrate;
pub mod observer;
pub mod params;
pub mod pipeline;
pub mod sim;
pub mod state;
pub mod summary;
pub mod sync;
pub mod units;

// Re-export main types
pub use observer::{EulerAngles, OrientationObserver};
pub use params::TrackerConfig;
pub use pipeline::{reconstruct, Reconstruction};
pub use state::{GravityEstimate, MotionFrame, OrientationTrack, RawSample, SynchronizedFrame};
pub use summary::{DistanceError, TrajectorySummary};
pub use sync::TimeUnit;
pub use units::{GyroUnit, UnitDecision};

/// Pipeline stage that detected an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Synchronizer,
    UnitNormalizer,
    LowPassFilter,
    OrientationEstimator,
    GravityCompensator,
    Integrator,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Synchronizer => "synchronizer",
            Stage::UnitNormalizer => "unit normalizer",
            Stage::LowPassFilter => "low-pass filter",
            Stage::OrientationEstimator => "orientation estimator",
            Stage::GravityCompensator => "gravity compensator",
            Stage::Integrator => "integrator",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("{stage}: insufficient data, need at least {needed} samples, got {got}")]
    InsufficientData {
        stage: Stage,
        needed: usize,
        got: usize,
    },
    #[error("{stage}: non-monotonic time at index {index} (t = {timestamp} s, dt = {dt} s)")]
    NonMonotonicTime {
        stage: Stage,
        index: usize,
        timestamp: f64,
        dt: f64,
    },
    #[error(
        "{stage}: order-{order} filter needs more than {min_len} samples for edge settling, got {len}"
    )]
    FilterStability {
        stage: Stage,
        order: usize,
        len: usize,
        min_len: usize,
    },
    #[error("{stage}: window of {window_s} s ({window_samples} samples) exceeds trace of {trace_s} s ({trace_samples} samples)")]
    WindowOutOfRange {
        stage: Stage,
        window_s: f64,
        window_samples: usize,
        trace_s: f64,
        trace_samples: usize,
    },
    #[error("{stage}: degenerate {quantity} norm {norm:e} at index {index}")]
    NumericDegeneracy {
        stage: Stage,
        quantity: &'static str,
        index: usize,
        norm: f64,
    },
    #[error("{stage}: {context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        stage: Stage,
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrackError {
    /// Stage the error was raised in.
    pub fn stage(&self) -> Stage {
        match self {
            TrackError::InsufficientData { stage, .. }
            | TrackError::NonMonotonicTime { stage, .. }
            | TrackError::FilterStability { stage, .. }
            | TrackError::WindowOutOfRange { stage, .. }
            | TrackError::NumericDegeneracy { stage, .. }
            | TrackError::LengthMismatch { stage, .. } => *stage,
            TrackError::InvalidConfig(_) => Stage::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackError>;
