//! # Datasweep - CSV/Excel cleaning and conversion
//!
//! Datasweep takes uploaded CSV or Excel files, shows what is in them, applies
//! optional cleaning (duplicate removal, mean imputation), projects a column
//! subset, charts the first two numeric columns and converts the result to
//! CSV or Excel for download.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Parser    │────▶│  Transform  │────▶│   Export    │
//! │  (upload)   │     │  (auto-enc) │     │ (clean/sel) │     │ (csv/xlsx)  │
//! └─────────────┘     └─────────────┘     └──────┬──────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                          ┌─────────────┐
//!                                          │    Chart    │
//!                                          └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use datasweep::{process_file, FileControls, UploadedFile};
//!
//! let file = UploadedFile::from_path("data.csv".as_ref()).unwrap();
//! let outcome = process_file(&file, &FileControls::default());
//! println!("{} rows", outcome.metadata.unwrap().row_count);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Table, cells, upload and control types
//! - [`config`] - Constants and server configuration
//! - [`parser`] - CSV/Excel parsing with encoding detection
//! - [`report`] - File metadata and previews
//! - [`transform`] - Cleaning, column selection and the per-file pipeline
//! - [`chart`] - Bar chart data
//! - [`export`] - CSV and XLSX serialization
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Reporting
pub mod report;

// Transformation
pub mod transform;

// Visualization
pub mod chart;

// Serialization
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError,
    ParseError,
    PipelineError,
    SelectionError,
    ServerError,
    VisualizationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Cell,
    CleaningOptions,
    Column,
    ColumnKind,
    ColumnSelection,
    Controls,
    ConversionRequest,
    ExportArtifact,
    FileControls,
    FileFormat,
    Table,
    TargetFormat,
    UploadedFile,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_encoding,
    detect_format,
    parse_bytes,
    parse_file,
    parse_upload,
};

// =============================================================================
// Re-exports - Report
// =============================================================================

pub use report::{format_size_kb, preview, FileMetadata};

// =============================================================================
// Re-exports - Cleaning and selection
// =============================================================================

pub use transform::{fill_missing_numeric, remove_duplicates, select_columns, CleaningReport};

// =============================================================================
// Re-exports - Chart
// =============================================================================

pub use chart::{bar_chart, BarChart};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{convert, write_csv, write_xlsx, Conversion};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    prepare_table,
    process_batch,
    process_file,
    BatchReport,
    FileOutcome,
    FileStatus,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::logs::{LogEntry, LogLevel};
pub use api::types::{error_response, ProcessResponse};
pub use config::ServerConfig;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
