//! Stream synchronizer
//!
//! Pairs every accelerometer sample with the nearest gyroscope sample in
//! time and rebases the merged trace to start at zero.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::state::{RawSample, SynchronizedFrame};
use crate::{Result, Stage, TrackError};

/// Minimum number of merged frames a trace needs to be usable.
pub const MIN_FRAMES: usize = 2;

/// Unit of raw logger timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    pub fn to_seconds(self, raw: f64) -> f64 {
        match self {
            TimeUnit::Seconds => raw,
            TimeUnit::Milliseconds => raw / 1e3,
            TimeUnit::Microseconds => raw / 1e6,
            TimeUnit::Nanoseconds => raw / 1e9,
        }
    }

    /// Converts every timestamp of a stream to seconds.
    pub fn convert(self, samples: &mut [RawSample]) {
        for s in samples.iter_mut() {
            s.timestamp = self.to_seconds(s.timestamp);
        }
    }
}

/// Merged trace plus the number of accelerometer samples that found no
/// gyro partner.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub frames: Vec<SynchronizedFrame>,
    pub dropped: usize,
}

pub fn synchronize(
    accel: &[RawSample],
    gyro: &[RawSample],
    tolerance: f64,
) -> Result<MergeOutcome> {
    // Accelerometer timestamps become frame timestamps and must be strictly
    // increasing; gyro duplicates are harmless.
    check_sorted(accel, "accelerometer", true)?;
    check_sorted(gyro, "gyroscope", false)?;

    let mut frames = Vec::with_capacity(accel.len());
    let mut dropped = 0usize;
    // Both streams are sorted, so the search cursor only moves forward.
    let mut cursor = 0usize;

    for sample in accel {
        while cursor + 1 < gyro.len() && gyro[cursor + 1].timestamp <= sample.timestamp {
            cursor += 1;
        }

        let nearest = nearest_of(gyro, cursor, sample.timestamp);
        match nearest {
            Some(g) if (g.timestamp - sample.timestamp).abs() <= tolerance => {
                frames.push(SynchronizedFrame::new(sample.timestamp, sample.value, g.value));
            }
            _ => dropped += 1,
        }
    }

    if frames.len() < MIN_FRAMES {
        return Err(TrackError::InsufficientData {
            stage: Stage::Synchronizer,
            needed: MIN_FRAMES,
            got: frames.len(),
        });
    }

    let t0 = frames[0].timestamp;
    for frame in frames.iter_mut() {
        frame.timestamp -= t0;
    }

    debug!(
        retained = frames.len(),
        dropped, tolerance, "merged accelerometer and gyroscope streams"
    );

    Ok(MergeOutcome { frames, dropped })
}

/// Candidate at `cursor` (last gyro sample at or before `t`) or the one after
/// it, whichever is closer. Ties go to the earlier sample.
fn nearest_of(gyro: &[RawSample], cursor: usize, t: f64) -> Option<&RawSample> {
    let before = gyro.get(cursor)?;
    match gyro.get(cursor + 1) {
        Some(after) if (after.timestamp - t).abs() < (before.timestamp - t).abs() => Some(after),
        _ => Some(before),
    }
}

fn check_sorted(
    samples: &[RawSample],
    stream: &'static str,
    strict: bool,
) -> Result<()> {
    for (idx, pair) in samples.windows(2).enumerate() {
        let dt = pair[1].timestamp - pair[0].timestamp;
        let ordered = if strict { dt > 0.0 } else { dt >= 0.0 };
        if !ordered {
            warn!(stream, index = idx + 1, "input stream is not sorted by timestamp");
            return Err(TrackError::NonMonotonicTime {
                stage: Stage::Synchronizer,
                index: idx + 1,
                timestamp: pair[1].timestamp,
                dt,
            });
        }
    }
    Ok(())
}

/// Sampling rate from the median frame spacing [Hz].
///
/// The median keeps occasional gaps from dropped samples from biasing the
/// estimate.
pub fn sampling_rate(frames: &[SynchronizedFrame]) -> Result<f64> {
    if frames.len() < MIN_FRAMES {
        return Err(TrackError::InsufficientData {
            stage: Stage::Synchronizer,
            needed: MIN_FRAMES,
            got: frames.len(),
        });
    }

    let mut diffs: Vec<f64> = frames
        .windows(2)
        .map(|pair| pair[1].timestamp - pair[0].timestamp)
        .collect();
    diffs.sort_by(|a, b| a.total_cmp(b));

    let mid = diffs.len() / 2;
    let median = if diffs.len() % 2 == 0 {
        0.5 * (diffs[mid - 1] + diffs[mid])
    } else {
        diffs[mid]
    };

    if !(median > 0.0) {
        return Err(TrackError::NonMonotonicTime {
            stage: Stage::Synchronizer,
            index: 0,
            timestamp: frames[0].timestamp,
            dt: median,
        });
    }

    Ok(1.0 / median)
}
