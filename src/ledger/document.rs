//! Ledger document capability and the JSON workbook implementation.
//!
//! A workbook is a list of named sheets, each a grid of cells. A *region* is
//! the table row whose cells hold `${table:<region>.<field>}` markers.
//! Substituting rows into a region replaces that marker row with one row per
//! item, so a template can be expanded any number of times.
//!
//! Layout rules for a substituted row:
//! - marker columns take the item's value for that field (empty if absent)
//! - an item made only of this region's markers keeps every marker column, so
//!   the next expansion still lines up with the existing columns
//! - non-marker cells on the marker row are copied unchanged
//! - item fields the marker row does not name are appended after the last
//!   column, in item order

use serde::{Deserialize, Serialize};

use crate::domain::{Cell, LedgerRow, placeholder};
use crate::error::{AppError, ErrorKind};

const MARKER_PREFIX: &str = "${table:";

/// A template-substitutable ledger document.
pub trait Document: Sized {
    fn open(bytes: &[u8]) -> Result<Self, AppError>;

    fn has_region(&self, name: &str) -> bool;

    /// Replace region `name` with `rows`. Fails with `UNKNOWN_REGION` if absent.
    fn substitute_region(&mut self, name: &str, rows: &[LedgerRow]) -> Result<(), AppError>;

    fn serialize(&self) -> Result<Vec<u8>, AppError>;
}

/// Parse `${table:<region>.<field>}` into `(region, field)`.
pub fn parse_marker(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_prefix(MARKER_PREFIX)?.strip_suffix('}')?;
    let (region, field) = inner.rsplit_once('.')?;
    if region.is_empty() || field.is_empty() {
        return None;
    }
    Some((region, field))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    fn region_row(&self, region: &str) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.iter().any(|c| is_region_marker(c, region))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// All region names, in sheet/row order.
    pub fn regions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sheet in &self.sheets {
            for row in &sheet.rows {
                for cell in row {
                    if let Some((region, _)) = cell.as_text().and_then(parse_marker) {
                        if !out.iter().any(|r| r == region) {
                            out.push(region.to_string());
                        }
                    }
                }
            }
        }
        out
    }

    fn locate(&self, region: &str) -> Option<(usize, usize)> {
        self.sheets
            .iter()
            .enumerate()
            .find_map(|(si, sheet)| sheet.region_row(region).map(|ri| (si, ri)))
    }
}

fn is_region_marker(cell: &Cell, region: &str) -> bool {
    cell.as_text()
        .and_then(parse_marker)
        .is_some_and(|(r, _)| r == region)
}

/// Column plan derived from a marker row.
enum Slot {
    Field(String),
    Fixed(Cell),
}

fn expand(marker_row: &[Cell], region: &str, rows: &[LedgerRow]) -> Vec<Vec<Cell>> {
    let slots: Vec<Slot> = marker_row
        .iter()
        .map(|cell| match cell.as_text().and_then(parse_marker) {
            Some((r, field)) if r == region => Slot::Field(field.to_string()),
            _ => Slot::Fixed(cell.clone()),
        })
        .collect();

    let mut extra: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            let named = slots.iter().any(|s| matches!(s, Slot::Field(f) if f == key));
            if !named && !extra.iter().any(|e| e == key) {
                extra.push(key.to_string());
            }
        }
    }

    rows.iter()
        .map(|row| {
            let is_marker_row = !row.is_empty() && row.iter().all(|(_, c)| is_region_marker(c, region));
            let mut cells: Vec<Cell> = slots
                .iter()
                .map(|slot| match slot {
                    Slot::Field(f) => row.get(f).cloned().unwrap_or_else(|| {
                        if is_marker_row {
                            Cell::Text(placeholder(region, f))
                        } else {
                            Cell::Empty
                        }
                    }),
                    Slot::Fixed(c) => c.clone(),
                })
                .collect();
            cells.extend(extra.iter().map(|k| row.get(k).cloned().unwrap_or(Cell::Empty)));
            cells
        })
        .collect()
}

impl Document for Workbook {
    fn open(bytes: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(bytes)
            .map_err(|e| AppError::new(ErrorKind::Config, format!("Invalid workbook: {e}")))
    }

    fn has_region(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }

    fn substitute_region(&mut self, name: &str, rows: &[LedgerRow]) -> Result<(), AppError> {
        let (si, ri) = self.locate(name).ok_or_else(|| {
            AppError::new(
                ErrorKind::UnknownRegion,
                format!("Template has no region named '{name}'"),
            )
        })?;
        let sheet = &mut self.sheets[si];
        let expanded = expand(&sheet.rows[ri], name, rows);
        sheet.rows.splice(ri..=ri, expanded);
        Ok(())
    }

    fn serialize(&self) -> Result<Vec<u8>, AppError> {
        let mut bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| AppError::new(ErrorKind::WriteFailure, format!("Failed to serialize workbook: {e}")))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_row(region: &str, fields: &[&str]) -> Vec<Cell> {
        fields.iter().map(|f| Cell::text(placeholder(region, f))).collect()
    }

    fn template() -> Workbook {
        let mut cu = Sheet::new("CU");
        cu.rows.push(vec![Cell::text("Date"), Cell::text("Volume"), Cell::text("Month1")]);
        cu.rows.push(marker_row("CU", &["date", "volume", "month1"]));
        let mut other = Sheet::new("NYH");
        other.rows.push(marker_row("NYH", &["date", "volume"]));
        Workbook {
            sheets: vec![cu, other],
        }
    }

    #[test]
    fn markers_parse() {
        assert_eq!(parse_marker("${table:CU.month12}"), Some(("CU", "month12")));
        assert_eq!(parse_marker("${table:Sugar 11.date}"), Some(("Sugar 11", "date")));
        assert_eq!(parse_marker("${CU.date}"), None);
        assert_eq!(parse_marker("${table:CU}"), None);
        assert_eq!(parse_marker("plain"), None);
    }

    #[test]
    fn substitution_expands_marker_row_and_widens() {
        let mut wb = template();
        let row = LedgerRow::new()
            .with("date", Cell::text("23/05/2025"))
            .with("volume", Cell::Number(1725.0))
            .with("month1", Cell::Number(1.7))
            .with("month2", Cell::Number(1.8));
        wb.substitute_region("CU", &[row]).unwrap();

        let sheet = wb.sheet("CU").unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(
            sheet.rows[1],
            vec![Cell::text("23/05/2025"), Cell::Number(1725.0), Cell::Number(1.7), Cell::Number(1.8)]
        );
        assert!(!wb.has_region("CU"));
        assert!(wb.has_region("NYH"));
    }

    #[test]
    fn missing_fields_are_blank() {
        let mut wb = template();
        let row = LedgerRow::new().with("date", Cell::text("d"));
        wb.substitute_region("CU", &[row]).unwrap();
        assert_eq!(wb.sheet("CU").unwrap().rows[1], vec![Cell::text("d"), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn narrower_marker_item_keeps_every_marker_column() {
        let mut wb = template();
        let markers = LedgerRow::new()
            .with("date", Cell::text(placeholder("CU", "date")))
            .with("volume", Cell::text(placeholder("CU", "volume")));
        wb.substitute_region("CU", &[markers]).unwrap();
        assert_eq!(wb.sheet("CU").unwrap().rows[1], marker_row("CU", &["date", "volume", "month1"]));
    }

    #[test]
    fn unknown_region_fails_loudly() {
        let mut wb = template();
        let err = wb.substitute_region("D", &[LedgerRow::new()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownRegion);
    }

    #[test]
    fn fixed_cells_on_marker_row_are_kept() {
        let mut sheet = Sheet::new("resume");
        sheet.rows.push(vec![Cell::text("note"), Cell::text(placeholder("resumeData", "origin"))]);
        let mut wb = Workbook { sheets: vec![sheet] };
        let rows = vec![
            LedgerRow::new().with("origin", Cell::text("a")),
            LedgerRow::new().with("origin", Cell::text("b")),
        ];
        wb.substitute_region("resumeData", &rows).unwrap();
        let rows = &wb.sheet("resume").unwrap().rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![Cell::text("note"), Cell::text("b")]);
    }

    #[test]
    fn serialize_then_open_preserves_content() {
        let wb = template();
        let bytes = Document::serialize(&wb).unwrap();
        let back = Workbook::open(&bytes).unwrap();
        assert_eq!(back, wb);
        assert_eq!(back.regions(), ["CU", "NYH"]);
    }
}
