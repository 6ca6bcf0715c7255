//! Synthetic IMU traces
//!
//! Generates a level body at rest followed by a constant-acceleration push,
//! sampled by two independent noisy sensors. Used for tests and demo runs.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::params::STANDARD_GRAVITY;
use crate::state::RawSample;
use crate::{Result, TrackError};

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub sample_rate_hz: f64,
    /// Stationary lead-in [s]
    pub rest_seconds: f64,
    /// Duration of the push [s]
    pub push_seconds: f64,
    /// Constant acceleration during the push, global frame [m/s^2]
    pub push_accel: Vector3<f64>,
    pub accel_noise_std: f64,
    /// Gyro noise [rad/s]
    pub gyro_noise_std: f64,
    /// Timestamp jitter of each stream [s], clipped to a quarter period
    pub jitter_std: f64,
    /// Gyro clock lead over the accelerometer clock [s]
    pub gyro_offset: f64,
    /// Emit the gyro stream in deg/s
    pub gyro_in_degrees: bool,
    /// Logger clock reading at the first sample [s]
    pub start_time: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 50.0,
            rest_seconds: 3.0,
            push_seconds: 2.0,
            push_accel: Vector3::new(1.0, 0.0, 0.0),
            accel_noise_std: 0.02,
            gyro_noise_std: 0.002,
            jitter_std: 0.0005,
            gyro_offset: 0.004,
            gyro_in_degrees: false,
            start_time: 12.5,
            seed: 42,
        }
    }
}

/// Two sensor streams plus the ground truth they were drawn from
#[derive(Debug, Clone)]
pub struct SimTrace {
    pub accel: Vec<RawSample>,
    pub gyro: Vec<RawSample>,
    /// True distance covered by the end of the push [m]
    pub true_displacement: f64,
}

/// Acceleration of the body at `t` seconds after the first sample.
fn true_accel(config: &SimConfig, t: f64) -> Vector3<f64> {
    if t >= config.rest_seconds {
        config.push_accel
    } else {
        Vector3::zeros()
    }
}

fn normal(std_dev: f64, name: &str) -> Result<Normal<f64>> {
    if !(std_dev.is_finite() && std_dev >= 0.0) {
        return Err(TrackError::InvalidConfig(format!(
            "{name} must be finite and >= 0, got {std_dev}"
        )));
    }
    Normal::new(0.0, std_dev)
        .map_err(|e| TrackError::InvalidConfig(format!("invalid {name} {std_dev}: {e}")))
}

/// Draws a synthetic trace. The same seed always yields the same trace.
pub fn generate(config: &SimConfig) -> Result<SimTrace> {
    if !(config.sample_rate_hz > 0.0) {
        return Err(TrackError::InvalidConfig(
            "sample_rate_hz must be > 0".to_string(),
        ));
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let accel_noise = normal(config.accel_noise_std, "accel_noise_std")?;
    let gyro_noise = normal(config.gyro_noise_std, "gyro_noise_std")?;
    let jitter = normal(config.jitter_std, "jitter_std")?;

    let dt = 1.0 / config.sample_rate_hz;
    let max_jitter = 0.25 * dt;
    let total_seconds = config.rest_seconds + config.push_seconds;
    let steps = (total_seconds * config.sample_rate_hz).round() as usize + 1;
    let gravity = Vector3::new(0.0, 0.0, STANDARD_GRAVITY);
    let gyro_scale = if config.gyro_in_degrees {
        180.0 / std::f64::consts::PI
    } else {
        1.0
    };

    let mut accel = Vec::with_capacity(steps);
    let mut gyro = Vec::with_capacity(steps);

    for step in 0..steps {
        let t = step as f64 * dt;

        // Level body: specific force is motion plus the reaction to gravity.
        let specific_force = true_accel(config, t) + gravity;
        let noisy = specific_force + Vector3::from_fn(|_, _| accel_noise.sample(&mut rng));
        let ta = config.start_time + t + jitter.sample(&mut rng).clamp(-max_jitter, max_jitter);
        accel.push(RawSample::new(ta, noisy));

        let rate = Vector3::from_fn(|_, _| gyro_noise.sample(&mut rng)) * gyro_scale;
        let tg = config.start_time
            + t
            + config.gyro_offset
            + jitter.sample(&mut rng).clamp(-max_jitter, max_jitter);
        gyro.push(RawSample::new(tg, rate));
    }

    let push = config.push_seconds.max(0.0);
    let true_displacement = 0.5 * config.push_accel.norm() * push * push;

    Ok(SimTrace {
        accel,
        gyro,
        true_displacement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_trace() {
        let a = generate(&SimConfig::default()).unwrap();
        let b = generate(&SimConfig::default()).unwrap();
        assert_eq!(a.accel, b.accel);
        assert_eq!(a.gyro, b.gyro);

        let c = generate(&SimConfig {
            seed: 7,
            ..Default::default()
        })
        .unwrap();
        assert_ne!(a.accel, c.accel);
    }

    #[test]
    fn test_trace_shape() {
        let trace = generate(&SimConfig::default()).unwrap();
        assert_eq!(trace.accel.len(), 251);
        assert_eq!(trace.gyro.len(), 251);
        assert!((trace.true_displacement - 2.0).abs() < 1e-12);
        assert!(trace.accel.windows(2).all(|p| p[1].timestamp > p[0].timestamp));
        assert!(trace.gyro.windows(2).all(|p| p[1].timestamp > p[0].timestamp));
    }

    #[test]
    fn test_degree_output_scales_gyro() {
        let rad = generate(&SimConfig::default()).unwrap();
        let deg = generate(&SimConfig {
            gyro_in_degrees: true,
            ..Default::default()
        })
        .unwrap();
        let r = rad.gyro[10].value.x;
        assert!((deg.gyro[10].value.x - r.to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn test_negative_noise_rejected() {
        let err = generate(&SimConfig {
            accel_noise_std: -1.0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrackError::InvalidConfig(ref msg) if msg.contains("accel_noise_std")));

        let err = generate(&SimConfig {
            gyro_noise_std: -0.5,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrackError::InvalidConfig(ref msg) if msg.contains("gyro_noise_std")));

        let err = generate(&SimConfig {
            jitter_std: f64::NAN,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, TrackError::InvalidConfig(ref msg) if msg.contains("jitter_std")));
    }

    #[test]
    fn test_noiseless_trace_allowed() {
        let trace = generate(&SimConfig {
            accel_noise_std: 0.0,
            gyro_noise_std: 0.0,
            jitter_std: 0.0,
            ..Default::default()
        })
        .unwrap();
        assert!(trace.gyro.iter().all(|s| s.value == Vector3::zeros()));
    }
}
