//! Error types for the Datasweep file pipeline.
//!
//! Each pipeline step has its own error family:
//!
//! - [`ParseError`] - format detection and CSV/Excel parsing
//! - [`SelectionError`] - column projection
//! - [`VisualizationError`] - chart preparation
//! - [`ExportError`] - CSV/Excel serialization
//! - [`PipelineError`] - per-file orchestration (wraps all of the above)
//! - [`ServerError`] - HTTP layer
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Parsing Errors
// =============================================================================

/// Errors while detecting a file's format or parsing it into a table.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Extension other than `.csv` / `.xlsx`.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Failed to read the file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CSV content.
    #[error("Invalid CSV at line {line}: {message}")]
    Csv { line: u64, message: String },

    /// Invalid or unreadable workbook.
    #[error("Invalid Excel file: {0}")]
    Excel(String),

    /// The workbook has no worksheet to read.
    #[error("Excel file has no worksheets")]
    NoWorksheet,

    /// No header row found.
    #[error("No columns to parse from file")]
    Empty,
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let message = match err.kind() {
            csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
                format!("Expected {} fields, saw {}", expected_len, len)
            }
            _ => err.to_string(),
        };
        ParseError::Csv { line, message }
    }
}

// =============================================================================
// Selection Errors
// =============================================================================

/// Errors while projecting a table onto a column subset.
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    /// Nothing selected; a table needs at least one column to convert.
    #[error("Select at least one column")]
    Empty,

    /// A requested column does not exist.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

// =============================================================================
// Visualization Errors
// =============================================================================

/// Reasons a chart cannot be rendered.
#[derive(Debug, Error, PartialEq)]
pub enum VisualizationError {
    #[error("No numeric columns available for visualization!")]
    NoNumericColumns,

    #[error("No data available for visualization after cleaning!")]
    NoData,
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing a table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV writer failure.
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    /// `rust_xlsxwriter` failure.
    #[error("{0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Failure while assembling the OOXML package.
    #[error("Spreadsheet package error: {0}")]
    Package(#[from] zip::result::ZipError),

    /// Table exceeds the worksheet grid.
    #[error("Table of {rows} rows x {cols} columns exceeds the worksheet limits")]
    TooLarge { rows: usize, cols: usize },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (per file)
// =============================================================================

/// Per-file orchestration errors.
///
/// Raised when a step is fatal for one file. [`crate::transform::pipeline::process_file`]
/// records it on the file's outcome and batch processing moves on to the
/// next file.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Detection or parsing failed.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Column selection rejected.
    #[error("{0}")]
    Selection(#[from] SelectionError),

    /// Both serialization engines failed.
    #[error("Error writing file: {0}")]
    Export(#[from] ExportError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for serialization.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
