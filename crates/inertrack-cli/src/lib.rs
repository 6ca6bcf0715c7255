//! File-driven dead-reckoning runs.
//!
//! Loads sensor exports (or draws a synthetic trace), runs the reconstruction
//! and writes the trajectory and summary into a fresh run directory.

pub mod io;
pub mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use inertrack::sim::{self, SimConfig};
use inertrack::{reconstruct, RawSample, Reconstruction, TimeUnit, TrackerConfig};
use tracing::info;

use crate::output::{OutputFiles, RunSummary, OUTPUT_SCHEMA_VERSION};

/// Where the sensor streams come from
#[derive(Debug, Clone)]
pub enum Source {
    Files {
        accel: PathBuf,
        gyro: PathBuf,
        time_unit: TimeUnit,
    },
    Synthetic(SimConfig),
}

impl Source {
    fn describe(&self) -> String {
        match self {
            Source::Files { accel, gyro, .. } => {
                format!("{} + {}", accel.display(), gyro.display())
            }
            Source::Synthetic(cfg) => format!("synthetic (seed {})", cfg.seed),
        }
    }

    fn load(&self) -> Result<(Vec<RawSample>, Vec<RawSample>)> {
        match self {
            Source::Files {
                accel,
                gyro,
                time_unit,
            } => Ok((
                io::read_sensor_csv(accel, *time_unit)?,
                io::read_sensor_csv(gyro, *time_unit)?,
            )),
            Source::Synthetic(cfg) => {
                let trace = sim::generate(cfg).context("failed to generate synthetic trace")?;
                Ok((trace.accel, trace.gyro))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub reconstruction: Reconstruction,
    pub summary: RunSummary,
    pub outputs: OutputFiles,
}

/// Runs one reconstruction and writes `trajectory.csv` and `summary.json`
/// under a timestamped directory of `output_base_dir`.
pub fn run(
    source: &Source,
    config: &TrackerConfig,
    reference_distance: Option<f64>,
    output_base_dir: &Path,
) -> Result<RunReport> {
    let (accel, gyro) = source.load()?;
    info!(
        accel_samples = accel.len(),
        gyro_samples = gyro.len(),
        source = %source.describe(),
        "loaded sensor streams"
    );

    let reconstruction = reconstruct(&accel, &gyro, config).context("reconstruction failed")?;

    let output_dir = output::create_timestamped_run_dir(output_base_dir)?;
    let outputs = OutputFiles::in_dir(output_dir);

    let records = output::trajectory_records(&reconstruction);
    output::write_csv(&outputs.csv_path, &records)?;

    let summary = RunSummary {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        source: source.describe(),
        config: config.clone(),
        dropped_samples: reconstruction.dropped,
        summary: reconstruction.summary.clone(),
        reference: reference_distance.map(|d| reconstruction.summary.compare_to_reference(d)),
    };
    output::write_summary(&outputs.summary_path, &summary)?;

    Ok(RunReport {
        reconstruction,
        summary,
        outputs,
    })
}
