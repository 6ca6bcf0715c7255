//! End-to-end reconstruction
//!
//! Wires the stages in order over one trace. Each stage consumes the
//! previous stage's output and nothing is shared between runs.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::filter::filter_frames;
use crate::gravity::compensate;
use crate::integrate::integrate;
use crate::observer::estimate_orientation;
use crate::params::TrackerConfig;
use crate::state::{GravityEstimate, MotionFrame, OrientationTrack, RawSample, SynchronizedFrame};
use crate::summary::TrajectorySummary;
use crate::sync::{sampling_rate, synchronize};
use crate::units::{normalize_gyro_units, UnitDecision};
use crate::Result;

/// Everything one run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconstruction {
    pub config: TrackerConfig,
    /// Merged frames with gyro in rad/s, before filtering
    pub frames: Vec<SynchronizedFrame>,
    /// Accelerometer samples without a gyro partner
    pub dropped: usize,
    pub unit_decision: UnitDecision,
    pub sampling_rate_hz: f64,
    pub filtered: Vec<SynchronizedFrame>,
    pub orientation: OrientationTrack,
    pub gravity: GravityEstimate,
    pub motion: Vec<MotionFrame>,
    pub summary: TrajectorySummary,
}

/// Runs the full pipeline on one pair of streams.
///
/// Timestamps must already be in seconds.
pub fn reconstruct(
    accel: &[RawSample],
    gyro: &[RawSample],
    config: &TrackerConfig,
) -> Result<Reconstruction> {
    config.validate()?;

    let merged = synchronize(accel, gyro, config.merge_tolerance)?;
    let mut frames = merged.frames;
    let fs = sampling_rate(&frames)?;
    debug!(sampling_rate_hz = fs, frames = frames.len(), "estimated sampling rate");

    let unit_decision =
        normalize_gyro_units(&mut frames, config.unit_threshold, config.unit_percentile)?;

    let filtered = filter_frames(
        &frames,
        config.filter_order,
        config.filter_cutoff_hz,
        fs,
        config.filter_gyro,
    )?;

    let orientation = estimate_orientation(&filtered, config.orientation_gain)?;

    let compensation = compensate(&filtered, &orientation, fs, config.gravity_window_seconds)?;
    let gravity = compensation.gravity;
    if !config.gravity_within_tolerance(gravity.magnitude) {
        warn!(
            magnitude = gravity.magnitude,
            deviation = gravity.deviation_from(config.standard_gravity),
            tolerance_ratio = config.gravity_tolerance_ratio,
            "gravity estimate far from standard gravity; window may not be stationary"
        );
    }

    let timestamps: Vec<f64> = filtered.iter().map(|f| f.timestamp).collect();
    let kinematics = integrate(&timestamps, &compensation.accel_motion)?;

    let motion: Vec<MotionFrame> = timestamps
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| MotionFrame {
            timestamp,
            accel_global: compensation.accel_global[i],
            accel_motion: compensation.accel_motion[i],
            velocity: kinematics.velocity[i],
            position: kinematics.position[i],
        })
        .collect();

    let summary = TrajectorySummary::from_motion(
        &motion,
        fs,
        &gravity,
        config.standard_gravity,
        unit_decision,
    );

    info!(
        frames = summary.sample_count,
        dropped = merged.dropped,
        duration_s = summary.duration,
        net_displacement_m = summary.net_displacement,
        final_speed = summary.final_speed,
        "reconstruction complete"
    );

    Ok(Reconstruction {
        config: config.clone(),
        frames,
        dropped: merged.dropped,
        unit_decision,
        sampling_rate_hz: fs,
        filtered,
        orientation,
        gravity,
        motion,
        summary,
    })
}
