//! Merge a `Dataset` into the ledger pairs.
//!
//! Each template is read once. Values are substituted into one copy (the
//! instance); values followed by a fresh placeholder row go into a second copy
//! that replaces the template, so the template grows by one concrete row per
//! run and stays expandable. All four outputs are staged next to their
//! destinations and only renamed into place once every one of them is ready.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::domain::{Dataset, LedgerRow, RESUME_TABLE, ResumeRow};
use crate::error::{AppError, ErrorKind};
use crate::ledger::document::Document;

/// Default rendering of `NormalizedLine::date` in the data ledger.
pub const DEFAULT_LEDGER_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPaths {
    pub data_template: PathBuf,
    pub data_instance: PathBuf,
    pub resume_template: PathBuf,
    pub resume_instance: PathBuf,
}

impl LedgerPaths {
    /// Standard file names under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            data_template: dir.join("data.template.json"),
            data_instance: dir.join("data.json"),
            resume_template: dir.join("resume.template.json"),
            resume_instance: dir.join("resume.json"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub date_format: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_LEDGER_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Regions that received a new row.
    pub updated: Vec<String>,
    /// Regions left as they were because the source failed.
    pub unchanged: Vec<String>,
    pub resume_rows: usize,
}

/// Exclusive marker next to a template, removed on drop. Holds the owner's PID.
struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    fn acquire(target: &Path) -> Result<Self, AppError> {
        let path = lock_path(target);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let lock = Self { path };
                writeln!(file, "{}", std::process::id()).map_err(|e| {
                    AppError::new(
                        ErrorKind::WriteFailure,
                        format!("Failed to write lock '{}': {e}", lock.path.display()),
                    )
                })?;
                Ok(lock)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&path)
                    .ok()
                    .map(|pid| pid.trim().to_string())
                    .filter(|pid| !pid.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                Err(AppError::new(
                    ErrorKind::WriteFailure,
                    format!(
                        "Ledger '{}' is locked by another run (pid {owner}). \
                         If no run is active, delete '{}' and retry",
                        target.display(),
                        path.display()
                    ),
                ))
            }
            Err(e) => Err(AppError::new(
                ErrorKind::WriteFailure,
                format!("Failed to create lock '{}': {e}", path.display()),
            )),
        }
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

pub fn lock_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn read_template(path: &Path) -> Result<Vec<u8>, AppError> {
    fs::read(path).map_err(|e| {
        AppError::new(
            ErrorKind::Config,
            format!("Failed to read template '{}': {e}", path.display()),
        )
    })
}

fn unknown_region(name: &str, path: &Path) -> AppError {
    AppError::new(
        ErrorKind::UnknownRegion,
        format!("Template '{}' has no region named '{name}'", path.display()),
    )
}

/// Write `bytes` to a temp file in `target`'s directory.
fn stage(target: &Path, bytes: &[u8]) -> Result<NamedTempFile, AppError> {
    let write_err = |e: io::Error| {
        AppError::new(
            ErrorKind::WriteFailure,
            format!("Failed to stage '{}': {e}", target.display()),
        )
    };
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    Ok(tmp)
}

/// Substitute `dataset` into the ledger pairs at `paths` and persist all four documents.
///
/// Nothing on disk changes unless every region check and every staging write
/// succeeds.
pub fn write<D: Document>(
    dataset: &Dataset,
    paths: &LedgerPaths,
    options: &WriteOptions,
) -> Result<WriteSummary, AppError> {
    for template in [&paths.data_template, &paths.resume_template] {
        if !template.is_file() {
            return Err(AppError::new(
                ErrorKind::Config,
                format!("Template '{}' not found", template.display()),
            ));
        }
    }

    let _data_lock = LedgerLock::acquire(&paths.data_template)?;
    let _resume_lock = LedgerLock::acquire(&paths.resume_template)?;

    let data_bytes = read_template(&paths.data_template)?;
    let resume_bytes = read_template(&paths.resume_template)?;
    let mut data_instance = D::open(&data_bytes)?;
    let mut data_template = D::open(&data_bytes)?;
    let mut resume_instance = D::open(&resume_bytes)?;
    let mut resume_template = D::open(&resume_bytes)?;

    for code in dataset.codes() {
        if !data_template.has_region(code) {
            return Err(unknown_region(code, &paths.data_template));
        }
    }
    if !resume_template.has_region(RESUME_TABLE) {
        return Err(unknown_region(RESUME_TABLE, &paths.resume_template));
    }

    let mut summary = WriteSummary::default();
    for entry in dataset.iter() {
        match (&entry.line, &entry.placeholder) {
            (Some(line), Some(placeholder)) if entry.status.is_ok() => {
                let values = line.to_row(&options.date_format);
                data_instance.substitute_region(&entry.code, std::slice::from_ref(&values))?;
                data_template.substitute_region(&entry.code, &[values, placeholder.to_row()])?;
                debug!(region = %entry.code, months = line.months.len(), "Region expanded");
                summary.updated.push(entry.code.clone());
            }
            _ => summary.unchanged.push(entry.code.clone()),
        }
    }

    let mut resume_rows: Vec<LedgerRow> = dataset.iter().map(|e| e.resume.to_row()).collect();
    summary.resume_rows = resume_rows.len();
    resume_instance.substitute_region(RESUME_TABLE, &resume_rows)?;
    resume_rows.push(ResumeRow::placeholder_row());
    resume_template.substitute_region(RESUME_TABLE, &resume_rows)?;

    let outputs = [
        (&paths.data_instance, data_instance.serialize()?),
        (&paths.resume_instance, resume_instance.serialize()?),
        (&paths.data_template, data_template.serialize()?),
        (&paths.resume_template, resume_template.serialize()?),
    ];

    let mut staged = Vec::with_capacity(outputs.len());
    for (target, bytes) in &outputs {
        staged.push((*target, stage(target, bytes)?));
    }

    // Instances first: if a later rename fails the old template still reproduces them.
    for (target, tmp) in staged {
        tmp.persist(target).map_err(|e| {
            AppError::new(
                ErrorKind::WriteFailure,
                format!("Failed to replace '{}': {}", target.display(), e.error),
            )
        })?;
    }

    info!(
        updated = summary.updated.len(),
        unchanged = summary.unchanged.len(),
        resume_rows = summary.resume_rows,
        "Ledger written"
    );
    Ok(summary)
}
