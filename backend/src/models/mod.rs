//! Domain models for tabular files.
//!
//! - [`Table`] - named, typed columns plus a row index
//! - [`UploadedFile`] - one file handed to the pipeline
//! - [`FileControls`] - per-file option state (cleaning, selection, chart, conversion)
//! - [`ExportArtifact`] - serialized result ready for download

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::config::{CSV_MIME, XLSX_MIME};

// =============================================================================
// Cells and Columns
// =============================================================================

/// A single table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
            Cell::Missing => Ok(()),
        }
    }
}

/// Column type, fixed when the file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Cell>,
}

impl Column {
    /// Build a column, inferring its kind: numeric when every non-missing
    /// cell is a number.
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let kind = if cells.iter().all(|c| matches!(c, Cell::Number(_) | Cell::Missing)) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        };
        Self { name: name.into(), kind, cells }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }
}

// =============================================================================
// Table
// =============================================================================

/// Ordered named columns of equal length.
///
/// `index` holds the original 0-based row position of each row. It survives
/// deduplication so previews and charts keep the labels the rows were read
/// with, and it is never exported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<Column>,
    pub index: Vec<usize>,
}

impl Table {
    /// Build a table from columns. Panics if the columns differ in length.
    pub fn new(columns: Vec<Column>) -> Self {
        let rows = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        assert!(
            columns.iter().all(|c| c.cells.len() == rows),
            "all columns must have the same length"
        );
        Self { columns, index: (0..rows).collect() }
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Cells of one row, in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.columns.iter().map(move |c| &c.cells[row])
    }

    /// Lazy view of the first `n` rows.
    pub fn head(&self, n: usize) -> Head<'_> {
        Head { table: self, pos: 0, end: n.min(self.row_count()) }
    }

    /// Keep only the rows whose flag is `true`.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.cells.retain(|_| *flags.next().unwrap_or(&false));
        }
        let mut flags = keep.iter();
        self.index.retain(|_| *flags.next().unwrap_or(&false));
    }
}

/// A row borrowed from a [`Table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row<'a> {
    pub index: usize,
    pub cells: Vec<&'a Cell>,
}

/// Iterator over the first rows of a table. Consumed once.
pub struct Head<'a> {
    table: &'a Table,
    pos: usize,
    end: usize,
}

impl<'a> Iterator for Head<'a> {
    type Item = Row<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.end {
            return None;
        }
        let row = self.pos;
        self.pos += 1;
        Some(Row {
            index: self.table.index[row],
            cells: self.table.row(row).collect(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Head<'_> {}

// =============================================================================
// Uploads
// =============================================================================

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Excel,
}

/// A file as handed over by the upload interface.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// =============================================================================
// Per-file controls
// =============================================================================

/// Cleaning toggles for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleaningOptions {
    pub remove_duplicates: bool,
    pub fill_missing_numeric: bool,
}

/// Columns to keep. `None` keeps all columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSelection(pub Option<Vec<String>>);

impl ColumnSelection {
    pub fn all() -> Self {
        Self(None)
    }

    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Some(names.into_iter().map(Into::into).collect()))
    }
}

/// Export target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFormat {
    #[serde(alias = "csv", alias = "CSV")]
    Csv,
    #[serde(alias = "excel", alias = "xlsx")]
    Excel,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Csv => ".csv",
            TargetFormat::Excel => ".xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Csv => CSV_MIME,
            TargetFormat::Excel => XLSX_MIME,
        }
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(TargetFormat::Csv),
            "excel" | "xlsx" => Ok(TargetFormat::Excel),
            other => Err(format!("Unknown target format '{}' (expected csv or excel)", other)),
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFormat::Csv => f.write_str("CSV"),
            TargetFormat::Excel => f.write_str("Excel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub target_format: TargetFormat,
}

/// Everything the user has set for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileControls {
    pub cleaning: CleaningOptions,
    pub columns: ColumnSelection,
    pub show_chart: bool,
    pub convert: Option<ConversionRequest>,
}

/// Per-file controls keyed by file name.
pub type Controls = HashMap<String, FileControls>;

// =============================================================================
// Export
// =============================================================================

/// Serialized table ready for download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub data: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
}
