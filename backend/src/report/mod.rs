//! File metadata and preview for display.

use serde::Serialize;

use crate::config::PREVIEW_ROWS;
use crate::models::{Cell, ColumnKind, Head, Table, UploadedFile};

/// File size in kilobytes with two decimals (`bytes / 1024`).
pub fn format_size_kb(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

/// Name and type of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

/// What is shown about a file before any cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub size_bytes: usize,
    pub size_kb: String,
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
}

impl FileMetadata {
    pub fn describe(file: &UploadedFile, table: &Table) -> Self {
        Self {
            name: file.name.clone(),
            size_bytes: file.size(),
            size_kb: format_size_kb(file.size()),
            row_count: table.row_count(),
            columns: table
                .columns
                .iter()
                .map(|c| ColumnInfo { name: c.name.clone(), kind: c.kind })
                .collect(),
        }
    }
}

/// First rows of a table.
pub fn preview(table: &Table) -> Head<'_> {
    table.head(PREVIEW_ROWS)
}

/// Owned preview row, for responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    pub index: usize,
    pub cells: Vec<Cell>,
}

/// Collect the preview into owned rows.
pub fn preview_rows(table: &Table) -> Vec<PreviewRow> {
    preview(table)
        .map(|row| PreviewRow {
            index: row.index,
            cells: row.cells.into_iter().cloned().collect(),
        })
        .collect()
}
