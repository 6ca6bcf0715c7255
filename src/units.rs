//! Gyroscope unit normalizer
//!
//! Logger exports disagree on whether angular rate is reported in deg/s or
//! rad/s. Sustained rates above ~20 rad/s are not plausible for handheld
//! motion, so a large upper percentile means the trace is in deg/s.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::SynchronizedFrame;
use crate::{Result, Stage, TrackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GyroUnit {
    DegreesPerSecond,
    RadiansPerSecond,
}

/// Outcome of the unit heuristic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitDecision {
    pub unit: GyroUnit,
    /// Pooled |gyro| percentile as measured on the raw trace
    pub percentile: f64,
    /// Same percentile after conversion to rad/s
    pub normalized_percentile: f64,
    /// Threshold the percentile was compared against
    pub threshold: f64,
}

/// Percentile (linear interpolation between order statistics) of a sample.
///
/// `q` is a fraction in [0, 1]. Returns `None` for empty input.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

fn pooled_abs_gyro(frames: &[SynchronizedFrame]) -> Vec<f64> {
    frames
        .iter()
        .flat_map(|f| f.gyro.iter().map(|v| v.abs()))
        .collect()
}

/// Decides the gyro unit of a trace without modifying it.
pub fn detect_gyro_unit(
    frames: &[SynchronizedFrame],
    threshold: f64,
    q: f64,
) -> Result<(GyroUnit, f64)> {
    let pooled = pooled_abs_gyro(frames);
    let measured = percentile(&pooled, q).ok_or(TrackError::InsufficientData {
        stage: Stage::UnitNormalizer,
        needed: 1,
        got: 0,
    })?;

    let unit = if measured > threshold {
        GyroUnit::DegreesPerSecond
    } else {
        GyroUnit::RadiansPerSecond
    };
    Ok((unit, measured))
}

/// Detects the gyro unit and converts the gyro columns to rad/s in place.
pub fn normalize_gyro_units(
    frames: &mut [SynchronizedFrame],
    threshold: f64,
    q: f64,
) -> Result<UnitDecision> {
    let (unit, measured) = detect_gyro_unit(frames, threshold, q)?;

    let normalized_percentile = match unit {
        GyroUnit::DegreesPerSecond => {
            let scale = std::f64::consts::PI / 180.0;
            for frame in frames.iter_mut() {
                frame.gyro *= scale;
            }
            percentile(&pooled_abs_gyro(frames), q).unwrap_or(0.0)
        }
        GyroUnit::RadiansPerSecond => measured,
    };

    info!(
        ?unit,
        percentile = measured,
        normalized_percentile,
        threshold,
        "gyroscope unit decision"
    );

    Ok(UnitDecision {
        unit,
        percentile: measured,
        normalized_percentile,
        threshold,
    })
}
