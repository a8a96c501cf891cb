//! Run exports: per-source JSON snapshots and the resume CSV.
//!
//! Snapshots are the debugging view of a run. Each file carries the value
//! line, its placeholder twin and the resume row exactly as the writer sees
//! them.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::domain::{Dataset, LedgerRow, ResumeRow, SourceResult};
use crate::error::{AppError, ErrorKind};

/// Serializes a `LedgerRow` as a JSON object in field order.
struct RowObject<'a>(&'a LedgerRow);

impl Serialize for RowObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, cell) in self.0.iter() {
            map.serialize_entry(key, cell)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    code: &'a str,
    status: u16,
    description: &'a str,
    line_info: Option<RowObject<'a>>,
    line_tmp: Option<RowObject<'a>>,
    resume: &'a ResumeRow,
}

/// `cmegroup-<code>.json`, with the code lowercased and stripped of whitespace.
pub fn snapshot_file_name(code: &str) -> String {
    let slug: String = code
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    format!("cmegroup-{slug}.json")
}

fn write_snapshot(path: &Path, entry: &SourceResult, date_format: &str) -> Result<(), AppError> {
    let values = entry.line.as_ref().map(|l| l.to_row(date_format));
    let placeholders = entry.placeholder.as_ref().map(|p| p.to_row());
    let snapshot = Snapshot {
        code: &entry.code,
        status: entry.status.code,
        description: &entry.status.description,
        line_info: values.as_ref().map(RowObject),
        line_tmp: placeholders.as_ref().map(RowObject),
        resume: &entry.resume,
    };

    let file = File::create(path).map_err(|e| {
        AppError::new(
            ErrorKind::WriteFailure,
            format!("Failed to create snapshot '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, &snapshot)
        .map_err(|e| AppError::new(ErrorKind::WriteFailure, format!("Failed to write snapshot JSON: {e}")))
}

/// Write one snapshot per dataset entry into `dir`.
pub fn write_snapshots(dir: &Path, dataset: &Dataset, date_format: &str) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir).map_err(|e| {
        AppError::new(
            ErrorKind::WriteFailure,
            format!("Failed to create dump dir '{}': {e}", dir.display()),
        )
    })?;

    let mut written = Vec::with_capacity(dataset.len());
    for entry in dataset.iter() {
        let path = dir.join(snapshot_file_name(&entry.code));
        write_snapshot(&path, entry, date_format)?;
        written.push(path);
    }
    Ok(written)
}

/// Write the run's resume rows to CSV (`date,tradeDate,origin,amount`).
pub fn write_resume_csv(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(
            ErrorKind::WriteFailure,
            format!("Failed to create resume CSV '{}': {e}", path.display()),
        )
    })?;
    for entry in dataset.iter() {
        writer
            .serialize(&entry.resume)
            .map_err(|e| AppError::new(ErrorKind::WriteFailure, format!("Failed to write resume CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(ErrorKind::WriteFailure, format!("Failed to flush resume CSV: {e}")))
}
