//! Starter templates for a fresh ledger directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::{Cell, RESUME_TABLE, ResumeRow, Source, placeholder};
use crate::error::{AppError, ErrorKind};
use crate::ledger::document::{Document, Sheet, Workbook};
use crate::ledger::writer::LedgerPaths;

/// Marker columns laid out per source. Longer curves widen the region on first write.
pub const DEFAULT_TEMPLATE_MONTHS: usize = 15;

/// One sheet per source: title, header row, marker row.
pub fn data_template(sources: &[Source], months: usize) -> Workbook {
    let sheets = sources
        .iter()
        .map(|source| {
            let mut fields = vec!["date".to_string(), "volume".to_string()];
            fields.extend((1..=months).map(|i| format!("month{i}")));

            let mut sheet = Sheet::new(source.code.clone());
            sheet.rows.push(vec![Cell::text(source.display_name.clone())]);
            sheet.rows.push(fields.iter().map(|f| Cell::text(header(f))).collect());
            sheet
                .rows
                .push(fields.iter().map(|f| Cell::Text(placeholder(&source.code, f))).collect());
            sheet
        })
        .collect();
    Workbook { sheets }
}

pub fn resume_template() -> Workbook {
    let mut sheet = Sheet::new("Resume");
    sheet.rows.push(ResumeRow::FIELDS.iter().map(|f| Cell::text(header(f))).collect());
    sheet.rows.push(
        ResumeRow::FIELDS
            .iter()
            .map(|f| Cell::Text(placeholder(RESUME_TABLE, f)))
            .collect(),
    );
    Workbook { sheets: vec![sheet] }
}

fn header(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn write_new(path: &Path, bytes: &[u8], force: bool) -> Result<(), AppError> {
    if path.exists() && !force {
        return Err(AppError::new(
            ErrorKind::Config,
            format!("'{}' already exists (use --force to overwrite)", path.display()),
        ));
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new(
                ErrorKind::WriteFailure,
                format!("Failed to create '{}': {e}", dir.display()),
            )
        })?;
    }
    fs::write(path, bytes).map_err(|e| {
        AppError::new(
            ErrorKind::WriteFailure,
            format!("Failed to write '{}': {e}", path.display()),
        )
    })
}

/// Write both templates. Refuses to overwrite existing files unless `force`.
pub fn init_templates(
    paths: &LedgerPaths,
    sources: &[Source],
    months: usize,
    force: bool,
) -> Result<Vec<PathBuf>, AppError> {
    let data = data_template(sources, months).serialize()?;
    let resume = resume_template().serialize()?;

    // Check both before writing either.
    if !force {
        for path in [&paths.data_template, &paths.resume_template] {
            if path.exists() {
                return Err(AppError::new(
                    ErrorKind::Config,
                    format!("'{}' already exists (use --force to overwrite)", path.display()),
                ));
            }
        }
    }

    write_new(&paths.data_template, &data, force)?;
    write_new(&paths.resume_template, &resume, force)?;
    info!(
        data = %paths.data_template.display(),
        resume = %paths.resume_template.display(),
        sources = sources.len(),
        "Templates written"
    );
    Ok(vec![paths.data_template.clone(), paths.resume_template.clone()])
}
