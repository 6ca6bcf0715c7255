use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use inertrack::{RawSample, TimeUnit};

/// Column positions of one sensor file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    time: usize,
    x: usize,
    y: usize,
    z: usize,
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

fn resolve_columns(headers: &StringRecord, path: &Path) -> Result<Columns> {
    let missing = |name: &str| anyhow!("{}: missing `{name}` column", path.display());
    Ok(Columns {
        time: find_column(headers, &["timestamp", "time"]).ok_or_else(|| missing("timestamp"))?,
        x: find_column(headers, &["x"]).ok_or_else(|| missing("X"))?,
        y: find_column(headers, &["y"]).ok_or_else(|| missing("Y"))?,
        z: find_column(headers, &["z"]).ok_or_else(|| missing("Z"))?,
    })
}

fn parse_field(record: &StringRecord, idx: usize, line: u64, path: &Path) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| anyhow!("{}:{line}: missing field {idx}", path.display()))?;
    raw.parse::<f64>()
        .with_context(|| format!("{}:{line}: invalid number `{raw}`", path.display()))
}

/// Reads a `timestamp,X,Y,Z` sensor export and converts timestamps to seconds.
pub fn read_sensor_csv(path: &Path, unit: TimeUnit) -> Result<Vec<RawSample>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open sensor CSV {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();
    let cols = resolve_columns(&headers, path)?;

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        let line = row as u64 + 2;
        let t = parse_field(&record, cols.time, line, path)?;
        let x = parse_field(&record, cols.x, line, path)?;
        let y = parse_field(&record, cols.y, line, path)?;
        let z = parse_field(&record, cols.z, line, path)?;
        samples.push(RawSample::from_xyz(unit.to_seconds(t), x, y, z));
    }

    if samples.is_empty() {
        bail!("{} contains no samples", path.display());
    }
    Ok(samples)
}

/// Writes samples back out in the same layout with timestamps in seconds.
pub fn write_sensor_csv(path: &Path, samples: &[RawSample]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open CSV path {}", path.display()))?;
    writer.write_record(["timestamp", "X", "Y", "Z"])?;
    for s in samples {
        writer.write_record([
            s.timestamp.to_string(),
            s.value.x.to_string(),
            s.value.y.to_string(),
            s.value.z.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
