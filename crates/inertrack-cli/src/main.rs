use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use inertrack::sim::SimConfig;
use inertrack::{TimeUnit, TrackerConfig};
use inertrack_cli::{run, Source};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimeUnitArg {
    S,
    Ms,
    Us,
    Ns,
}

impl From<TimeUnitArg> for TimeUnit {
    fn from(arg: TimeUnitArg) -> Self {
        match arg {
            TimeUnitArg::S => TimeUnit::Seconds,
            TimeUnitArg::Ms => TimeUnit::Milliseconds,
            TimeUnitArg::Us => TimeUnit::Microseconds,
            TimeUnitArg::Ns => TimeUnit::Nanoseconds,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "inertrack")]
#[command(author, version, about = "Dead-reckoning from accelerometer and gyroscope recordings")]
struct Cli {
    /// Accelerometer CSV with a timestamp,X,Y,Z header
    #[arg(long, required_unless_present = "synthetic")]
    accel: Option<PathBuf>,

    /// Gyroscope CSV with a timestamp,X,Y,Z header
    #[arg(long, required_unless_present = "synthetic")]
    gyro: Option<PathBuf>,

    /// Unit of the CSV timestamps
    #[arg(long, value_enum, default_value = "ms")]
    time_unit: TimeUnitArg,

    /// TOML file with tracker parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Max accel/gyro timestamp gap for pairing [s]
    #[arg(long)]
    tolerance: Option<f64>,

    /// Low-pass cutoff [Hz]
    #[arg(long)]
    cutoff: Option<f64>,

    /// Orientation filter gain
    #[arg(long)]
    gain: Option<f64>,

    /// Stationary lead-in used for gravity estimation [s]
    #[arg(long)]
    gravity_window: Option<f64>,

    /// Tape-measured distance to compare the estimate against [m]
    #[arg(long)]
    reference_distance: Option<f64>,

    /// Run on a generated trace instead of files
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Seed for --synthetic
    #[arg(long)]
    seed: Option<u64>,

    /// Output base directory
    #[arg(long, default_value = "output-inertrack")]
    outdir: PathBuf,
}

fn build_config(cli: &Cli) -> Result<TrackerConfig> {
    let mut cfg = match &cli.config {
        Some(path) => TrackerConfig::from_toml_file(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(v) = cli.tolerance {
        cfg.merge_tolerance = v;
    }
    if let Some(v) = cli.cutoff {
        cfg.filter_cutoff_hz = v;
    }
    if let Some(v) = cli.gain {
        cfg.orientation_gain = v;
    }
    if let Some(v) = cli.gravity_window {
        cfg.gravity_window_seconds = v;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn build_source(cli: &Cli) -> Result<Source> {
    if cli.synthetic {
        let mut sim = SimConfig::default();
        if let Some(seed) = cli.seed {
            sim.seed = seed;
        }
        return Ok(Source::Synthetic(sim));
    }
    match (&cli.accel, &cli.gyro) {
        (Some(accel), Some(gyro)) => Ok(Source::Files {
            accel: accel.clone(),
            gyro: gyro.clone(),
            time_unit: cli.time_unit.into(),
        }),
        _ => bail!("--accel and --gyro are both required unless --synthetic is given"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inertrack=info,inertrack_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let source = build_source(&cli)?;

    let report = run(&source, &config, cli.reference_distance, &cli.outdir)?;
    let s = &report.summary.summary;

    println!(
        "Reconstruction complete. Frames: {} | Dropped: {} | Rate: {:.1} Hz | Gyro: {:?}",
        s.sample_count, report.summary.dropped_samples, s.sampling_rate_hz, s.unit_decision.unit
    );
    println!(
        "Net displacement: {:.3} m | Path length: {:.3} m | Duration: {:.2} s",
        s.net_displacement, s.path_length, s.duration
    );
    println!(
        "Final speed: {:.3} m/s | Gravity: {:.4} m/s^2 ({:+.4})",
        s.final_speed, s.gravity_magnitude, s.gravity_deviation
    );
    if let Some(reference) = &report.summary.reference {
        match reference.relative_error {
            Some(rel) => println!(
                "Reference: {:.3} m | Error: {:.3} m ({:.1} %)",
                reference.reference_m,
                reference.absolute_error_m,
                rel * 100.0
            ),
            None => println!(
                "Reference: {:.3} m | Error: {:.3} m",
                reference.reference_m, reference.absolute_error_m
            ),
        }
    }
    println!("Run directory: {}", report.outputs.output_dir.display());
    println!("CSV: {}", report.outputs.csv_path.display());
    println!("Summary: {}", report.outputs.summary_path.display());

    Ok(())
}
