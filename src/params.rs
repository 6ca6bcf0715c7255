//! Tracker parameters
//!
//! Tuning knobs for every pipeline stage. All thresholds live here as
//! defaults so a run (or a test) can override them without touching
//! shared state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, TrackError};

/// Standard gravity [m/s^2]
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Parameters for one reconstruction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Max |t_accel - t_gyro| for a pairing to be accepted [s]
    #[serde(alias = "mergeTolerance")]
    pub merge_tolerance: f64,
    /// Low-pass cutoff frequency [Hz]
    #[serde(alias = "filterCutoffHz")]
    pub filter_cutoff_hz: f64,
    /// Butterworth filter order
    #[serde(alias = "filterOrder")]
    pub filter_order: usize,
    /// Whether gyro columns are low-pass filtered as well
    #[serde(alias = "filterGyro")]
    pub filter_gyro: bool,
    /// Gradient-descent gain (beta) of the orientation filter
    #[serde(alias = "orientationGain")]
    pub orientation_gain: f64,
    /// Leading window assumed stationary for gravity estimation [s]
    #[serde(alias = "gravityWindowSeconds")]
    pub gravity_window_seconds: f64,
    /// Gyro percentile above which data is taken to be deg/s
    #[serde(alias = "unitThreshold")]
    pub unit_threshold: f64,
    /// Percentile (0, 1] used by the unit heuristic
    #[serde(alias = "unitPercentile")]
    pub unit_percentile: f64,
    /// Reference gravity magnitude for the gravity sanity check [m/s^2]
    #[serde(alias = "standardGravity")]
    pub standard_gravity: f64,
    /// Allowed |g_est - g_std| as a fraction of `standard_gravity`
    #[serde(alias = "gravityToleranceRatio")]
    pub gravity_tolerance_ratio: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            merge_tolerance: 0.02,
            filter_cutoff_hz: 5.0,
            filter_order: 2,
            filter_gyro: true,
            orientation_gain: 0.1,
            gravity_window_seconds: 2.0,
            unit_threshold: 20.0,
            unit_percentile: 0.95,
            standard_gravity: STANDARD_GRAVITY,
            gravity_tolerance_ratio: 0.05,
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: TrackerConfig = toml::from_str(raw)
            .map_err(|e| TrackError::InvalidConfig(format!("failed to parse TOML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TrackError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("merge_tolerance", self.merge_tolerance),
            ("filter_cutoff_hz", self.filter_cutoff_hz),
            ("orientation_gain", self.orientation_gain),
            ("gravity_window_seconds", self.gravity_window_seconds),
            ("unit_threshold", self.unit_threshold),
            ("unit_percentile", self.unit_percentile),
            ("standard_gravity", self.standard_gravity),
            ("gravity_tolerance_ratio", self.gravity_tolerance_ratio),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(TrackError::InvalidConfig(format!("{name} must be finite")));
        }

        if self.merge_tolerance < 0.0 {
            return Err(TrackError::InvalidConfig(
                "merge_tolerance must be >= 0".to_string(),
            ));
        }
        if self.filter_cutoff_hz <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "filter_cutoff_hz must be > 0".to_string(),
            ));
        }
        if self.filter_order == 0 {
            return Err(TrackError::InvalidConfig(
                "filter_order must be >= 1".to_string(),
            ));
        }
        if self.orientation_gain < 0.0 {
            return Err(TrackError::InvalidConfig(
                "orientation_gain must be >= 0".to_string(),
            ));
        }
        if self.gravity_window_seconds <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "gravity_window_seconds must be > 0".to_string(),
            ));
        }
        if self.unit_threshold <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "unit_threshold must be > 0".to_string(),
            ));
        }
        if !(self.unit_percentile > 0.0 && self.unit_percentile <= 1.0) {
            return Err(TrackError::InvalidConfig(
                "unit_percentile must be in (0, 1]".to_string(),
            ));
        }
        if self.standard_gravity <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "standard_gravity must be > 0".to_string(),
            ));
        }
        if self.gravity_tolerance_ratio <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "gravity_tolerance_ratio must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether an estimated gravity magnitude is close enough to standard.
    pub fn gravity_within_tolerance(&self, magnitude: f64) -> bool {
        let limit = self.gravity_tolerance_ratio * self.standard_gravity;
        (magnitude - self.standard_gravity).abs() <= limit
    }
}
