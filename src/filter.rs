//! Zero-phase Butterworth low-pass filter
//!
//! Design: the analog Butterworth prototype is split into pole pairs, each
//! realized as a biquad low-pass section pre-warped at the cutoff. An odd
//! order adds one first-order section.
//!
//! Application: forward-backward pass through the cascade with
//! odd-extension edge padding and steady-state initial conditions, so the
//! output has no phase lag and no start-up transient at either edge.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz as _, Type};
use nalgebra::Vector3;
use tracing::debug;

use crate::state::SynchronizedFrame;
use crate::{Result, Stage, TrackError};

/// Digital low-pass Butterworth filter as a cascade of second-order sections
#[derive(Debug, Clone)]
pub struct Butterworth {
    order: usize,
    sections: Vec<Coefficients<f64>>,
}

impl Butterworth {
    /// Designs a low-pass filter of `order` with `cutoff_hz` at `sample_rate_hz`.
    pub fn lowpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Result<Self> {
        if order == 0 {
            return Err(TrackError::InvalidConfig(
                "filter order must be >= 1".to_string(),
            ));
        }
        let nyquist = 0.5 * sample_rate_hz;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(TrackError::InvalidConfig(format!(
                "cutoff {cutoff_hz} Hz must lie in (0, {nyquist}) Hz for a {sample_rate_hz} Hz trace"
            )));
        }

        let n = order as f64;
        let mut sections = Vec::with_capacity((order + 1) / 2);
        for k in 0..order / 2 {
            // Pole pair k of the prototype sits at damping sin((2k + 1) pi / 2n).
            let q = 0.5 / (std::f64::consts::PI * (2 * k + 1) as f64 / (2.0 * n)).sin();
            let coeffs = Coefficients::<f64>::from_params(
                Type::LowPass,
                sample_rate_hz.hz(),
                cutoff_hz.hz(),
                q,
            )
            .map_err(|e| TrackError::InvalidConfig(format!("biquad design failed: {e:?}")))?;
            sections.push(coeffs);
        }
        if order % 2 == 1 {
            sections.push(first_order_section(cutoff_hz, sample_rate_hz));
        }

        Ok(Self { order, sections })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn sections(&self) -> &[Coefficients<f64>] {
        &self.sections
    }

    /// Gain of the whole cascade at DC.
    pub fn dc_gain(&self) -> f64 {
        self.sections.iter().map(section_dc_gain).product()
    }

    /// Samples of odd-extension padding added at each edge.
    pub fn padlen(&self) -> usize {
        3 * (self.order + 1)
    }

    /// Single causal pass through the cascade, each section starting in the
    /// steady state of its first input sample.
    pub fn filter_forward(&self, x: &[f64]) -> Vec<f64> {
        self.sections
            .iter()
            .fold(x.to_vec(), |signal, coeffs| run_section(coeffs, &signal))
    }

    /// Zero-phase forward-backward filtering.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>> {
        let edge = self.padlen();
        if x.len() <= edge {
            return Err(TrackError::FilterStability {
                stage: Stage::LowPassFilter,
                order: self.order,
                len: x.len(),
                min_len: edge,
            });
        }

        let ext = odd_extend(x, edge);
        let mut y = self.filter_forward(&ext);
        y.reverse();
        let mut y = self.filter_forward(&y);
        y.reverse();

        Ok(y[edge..y.len() - edge].to_vec())
    }
}

/// Bilinear first-order low-pass pre-warped at the cutoff.
fn first_order_section(cutoff_hz: f64, sample_rate_hz: f64) -> Coefficients<f64> {
    let k = (std::f64::consts::PI * cutoff_hz / sample_rate_hz).tan();
    let norm = 1.0 + k;
    Coefficients {
        a1: (k - 1.0) / norm,
        a2: 0.0,
        b0: k / norm,
        b1: k / norm,
        b2: 0.0,
    }
}

fn section_dc_gain(c: &Coefficients<f64>) -> f64 {
    (c.b0 + c.b1 + c.b2) / (1.0 + c.a1 + c.a2)
}

/// Runs one section starting from the steady state for a constant `x[0]`.
///
/// From that state a constant input yields the constant `gain * x[0]`, so by
/// linearity the output is that constant plus the zero-state response to
/// `x - x[0]`.
fn run_section(coeffs: &Coefficients<f64>, x: &[f64]) -> Vec<f64> {
    let Some(&x0) = x.first() else {
        return Vec::new();
    };
    let offset = section_dc_gain(coeffs) * x0;
    let mut section = DirectForm2Transposed::<f64>::new(*coeffs);
    x.iter().map(|&xk| section.run(xk - x0) + offset).collect()
}

/// Point-symmetric extension of `x` by `n` samples at both ends.
fn odd_extend(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let first = x[0];
    let last = x[len - 1];

    let mut ext = Vec::with_capacity(len + 2 * n);
    ext.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=n).map(|i| 2.0 * last - x[len - 1 - i]));
    ext
}

fn filter_column(
    filter: &Butterworth,
    frames: &[SynchronizedFrame],
    pick: impl Fn(&SynchronizedFrame) -> Vector3<f64>,
) -> Result<Vec<Vector3<f64>>> {
    let mut axes = Vec::with_capacity(3);
    for axis in 0..3 {
        let column: Vec<f64> = frames.iter().map(|f| pick(f)[axis]).collect();
        axes.push(filter.filtfilt(&column)?);
    }
    Ok((0..frames.len())
        .map(|i| Vector3::new(axes[0][i], axes[1][i], axes[2][i]))
        .collect())
}

/// Low-pass filters every accel axis (and gyro axis when `filter_gyro`) of a
/// trace, returning a new frame sequence.
pub fn filter_frames(
    frames: &[SynchronizedFrame],
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
    filter_gyro: bool,
) -> Result<Vec<SynchronizedFrame>> {
    let filter = Butterworth::lowpass(order, cutoff_hz, sample_rate_hz)?;
    debug!(
        order,
        cutoff_hz,
        sample_rate_hz,
        sections = ?filter.sections(),
        "designed low-pass filter"
    );

    let accel = filter_column(&filter, frames, |f| f.accel)?;
    let gyro = if filter_gyro {
        filter_column(&filter, frames, |f| f.gyro)?
    } else {
        frames.iter().map(|f| f.gyro).collect()
    };

    Ok(frames
        .iter()
        .zip(accel.into_iter().zip(gyro))
        .map(|(f, (a, g))| SynchronizedFrame::new(f.timestamp, a, g))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_order_coefficients() {
        // 5 Hz at 50 Hz, i.e. wn = 0.2
        let f = Butterworth::lowpass(2, 5.0, 50.0).unwrap();
        assert_eq!(f.sections().len(), 1);
        let c = &f.sections()[0];
        assert!((c.b0 - 0.067_455_27).abs() < 1e-6);
        assert!((c.b1 - 0.134_910_55).abs() < 1e-6);
        assert!((c.b2 - 0.067_455_27).abs() < 1e-6);
        assert!((c.a1 + 1.142_980_5).abs() < 1e-6);
        assert!((c.a2 - 0.412_801_6).abs() < 1e-6);
    }

    #[test]
    fn test_section_layout() {
        assert_eq!(Butterworth::lowpass(1, 3.0, 100.0).unwrap().sections().len(), 1);
        assert_eq!(Butterworth::lowpass(3, 3.0, 100.0).unwrap().sections().len(), 2);
        assert_eq!(Butterworth::lowpass(4, 3.0, 100.0).unwrap().sections().len(), 2);
        let odd = Butterworth::lowpass(3, 3.0, 100.0).unwrap();
        assert_eq!(odd.sections()[1].a2, 0.0);
        assert_eq!(odd.sections()[1].b2, 0.0);
    }

    #[test]
    fn test_unity_dc_gain() {
        for order in 1..=4 {
            let f = Butterworth::lowpass(order, 3.0, 100.0).unwrap();
            assert!((f.dc_gain() - 1.0).abs() < 1e-9, "order {order}");
        }
    }

    #[test]
    fn test_half_power_at_cutoff() {
        // |H(e^jw)|^2 = 1/2 at the cutoff for every order
        let fs = 100.0;
        let fc = 10.0;
        let w = 2.0 * std::f64::consts::PI * fc / fs;
        let z1 = nalgebra::Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        for order in 1..=4 {
            let f = Butterworth::lowpass(order, fc, fs).unwrap();
            let h: nalgebra::Complex<f64> = f
                .sections()
                .iter()
                .map(|c| (z1 * c.b1 + z2 * c.b2 + c.b0) / (z1 * c.a1 + z2 * c.a2 + 1.0))
                .product();
            assert!((h.norm_sqr() - 0.5).abs() < 1e-9, "order {order}");
        }
    }

    #[test]
    fn test_forward_pass_starts_settled() {
        let f = Butterworth::lowpass(3, 5.0, 50.0).unwrap();
        let y = f.filter_forward(&[2.5; 20]);
        for v in y {
            assert!((v - 2.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_signal_unchanged() {
        let f = Butterworth::lowpass(2, 5.0, 50.0).unwrap();
        let x = vec![9.81; 40];
        let y = f.filtfilt(&x).unwrap();
        assert_eq!(y.len(), x.len());
        for v in y {
            assert!((v - 9.81).abs() < 1e-9);
        }
    }

    #[test]
    fn test_nyquist_tone_removed() {
        let f = Butterworth::lowpass(2, 5.0, 50.0).unwrap();
        let x: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let y = f.filtfilt(&x).unwrap();
        for v in &y[50..150] {
            assert!(v.abs() < 1e-3);
        }
    }

    #[test]
    fn test_short_sequence_rejected() {
        let f = Butterworth::lowpass(2, 5.0, 50.0).unwrap();
        assert_eq!(f.padlen(), 9);
        let err = f.filtfilt(&[0.0; 9]).unwrap_err();
        assert_eq!(
            err,
            TrackError::FilterStability {
                stage: Stage::LowPassFilter,
                order: 2,
                len: 9,
                min_len: 9
            }
        );
        assert!(f.filtfilt(&[0.0; 10]).is_ok());
    }

    #[test]
    fn test_cutoff_above_nyquist_rejected() {
        assert!(matches!(
            Butterworth::lowpass(2, 30.0, 50.0),
            Err(TrackError::InvalidConfig(_))
        ));
        assert!(matches!(
            Butterworth::lowpass(0, 5.0, 50.0),
            Err(TrackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_filter_frames_keeps_timestamps_and_optional_gyro() {
        let frames: Vec<SynchronizedFrame> = (0..30)
            .map(|i| {
                let t = i as f64 * 0.02;
                let wobble = if i % 2 == 0 { 0.5 } else { -0.5 };
                SynchronizedFrame::new(
                    t,
                    Vector3::new(wobble, 0.0, 9.81),
                    Vector3::new(0.1 + wobble, 0.0, 0.0),
                )
            })
            .collect();

        let out = filter_frames(&frames, 2, 5.0, 50.0, false).unwrap();
        assert_eq!(out.len(), frames.len());
        for (o, f) in out.iter().zip(frames.iter()) {
            assert_eq!(o.timestamp, f.timestamp);
            assert_eq!(o.gyro, f.gyro);
            assert!((o.accel.z - 9.81).abs() < 1e-9);
        }
        assert!(out[15].accel.x.abs() < 0.05);
    }
}
