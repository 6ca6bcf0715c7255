use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use inertrack::observer::euler_track;
use inertrack::{DistanceError, Reconstruction, TrackerConfig, TrajectorySummary};
use serde::Serialize;

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

/// One row of `trajectory.csv`
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryRecord {
    pub time_s: f64,
    pub qw: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    pub accel_motion_x: f64,
    pub accel_motion_y: f64,
    pub accel_motion_z: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub vel_z: f64,
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
}

/// Contents of `summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub schema_version: String,
    /// `synthetic` or the accelerometer/gyroscope file pair
    pub source: String,
    pub config: TrackerConfig,
    pub dropped_samples: usize,
    pub summary: TrajectorySummary,
    pub reference: Option<DistanceError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFiles {
    pub output_dir: PathBuf,
    pub csv_path: PathBuf,
    pub summary_path: PathBuf,
}

impl OutputFiles {
    pub fn in_dir(output_dir: PathBuf) -> Self {
        Self {
            csv_path: output_dir.join("trajectory.csv"),
            summary_path: output_dir.join("summary.json"),
            output_dir,
        }
    }
}

pub fn trajectory_records(run: &Reconstruction) -> Vec<TrajectoryRecord> {
    let euler = euler_track(&run.orientation);
    run.motion
        .iter()
        .zip(run.orientation.iter())
        .zip(euler)
        .map(|((m, q), euler)| {
            TrajectoryRecord {
                time_s: m.timestamp,
                qw: q.w,
                qx: q.i,
                qy: q.j,
                qz: q.k,
                roll_deg: euler.roll_deg,
                pitch_deg: euler.pitch_deg,
                yaw_deg: euler.yaw_deg,
                accel_motion_x: m.accel_motion.x,
                accel_motion_y: m.accel_motion.y,
                accel_motion_z: m.accel_motion.z,
                vel_x: m.velocity.x,
                vel_y: m.velocity.y,
                vel_z: m.velocity.z,
                pos_x: m.position.x,
                pos_y: m.position.y,
                pos_z: m.position.z,
            }
        })
        .collect()
}

pub fn write_csv(path: &Path, records: &[TrajectoryRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open CSV path {}", path.display()))?;

    for record in records {
        writer.serialize(record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(summary)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Creates `<base>/<UTC timestamp>`, suffixing `-01`, `-02`, ... on collision.
pub fn create_timestamped_run_dir(base_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(base_dir)
        .with_context(|| format!("failed to create output base directory {}", base_dir.display()))?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let run_dir = base_dir.join(&timestamp);
    if !run_dir.exists() {
        fs::create_dir_all(&run_dir)?;
        return Ok(run_dir);
    }

    let mut counter: usize = 1;
    loop {
        let candidate = base_dir.join(format!("{timestamp}-{counter:02}"));
        if !candidate.exists() {
            fs::create_dir_all(&candidate)?;
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_dirs_are_unique() {
        let base = tempfile::tempdir().unwrap();
        let a = create_timestamped_run_dir(base.path()).unwrap();
        let b = create_timestamped_run_dir(base.path()).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir());
        assert!(b.is_dir());
    }

    #[test]
    fn test_trajectory_rows_carry_euler_view() {
        use inertrack::sim::{generate, SimConfig};
        use inertrack::EulerAngles;

        let trace = generate(&SimConfig::default()).unwrap();
        let run = inertrack::reconstruct(&trace.accel, &trace.gyro, &TrackerConfig::default())
            .unwrap();
        let rows = trajectory_records(&run);
        assert_eq!(rows.len(), run.motion.len());
        for (row, q) in rows.iter().zip(&run.orientation) {
            let euler = EulerAngles::from_quaternion(q);
            assert_eq!(row.roll_deg, euler.roll_deg);
            assert_eq!(row.yaw_deg, euler.yaw_deg);
            assert_eq!(row.qw, q.w);
        }
    }

    #[test]
    fn test_output_file_names() {
        let files = OutputFiles::in_dir(PathBuf::from("/tmp/run"));
        assert_eq!(files.csv_path, PathBuf::from("/tmp/run/trajectory.csv"));
        assert_eq!(files.summary_path, PathBuf::from("/tmp/run/summary.json"));
    }
}
