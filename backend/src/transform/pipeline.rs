//! Per-file processing pipeline.
//!
//! Each user action re-runs the whole pipeline for a file from the top with
//! that file's current [`FileControls`]:
//!
//! ```text
//! detect → parse → report → clean → select → chart → convert
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use datasweep::{process_batch, Controls, UploadedFile};
//!
//! let files = vec![UploadedFile::new("a.csv", b"id,val\n1,10\n".to_vec())];
//! let report = process_batch(&files, &Controls::new());
//! println!("{}", report.message);
//! ```

use serde::Serialize;

use crate::api::logs::{log_info, log_success, FileLog, LogEntry};
use crate::chart::{bar_chart, BarChart};
use crate::error::{ParseError, PipelineError, PipelineResult};
use crate::export::convert;
use crate::models::{Controls, ExportArtifact, FileControls, Table, UploadedFile};
use crate::parser::parse_upload;
use crate::report::{preview_rows, FileMetadata, PreviewRow};
use crate::transform::cleaner::{self, CleaningReport};
use crate::transform::selector::select_columns;

/// Message shown once every file of a batch has been handled.
pub const BATCH_DONE_MESSAGE: &str = "All files processed!";

/// How far a file got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Every requested step ran.
    Processed,
    /// Unsupported extension, nothing was parsed.
    Skipped,
    /// A step failed; earlier steps' results are kept.
    Failed,
}

/// Download descriptor for an artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

/// Everything produced for one file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub file_name: String,
    pub status: FileStatus,
    pub metadata: Option<FileMetadata>,
    /// First rows as parsed.
    pub preview: Vec<PreviewRow>,
    /// Rows removed by deduplication, when enabled.
    pub duplicates_removed: Option<usize>,
    /// Cells filled by imputation, when enabled.
    pub cells_filled: Option<usize>,
    /// Columns kept after selection.
    pub selected_columns: Vec<String>,
    /// First rows after cleaning and selection.
    pub result_preview: Vec<PreviewRow>,
    pub chart: Option<BarChart>,
    pub download: Option<ArtifactInfo>,
    pub error: Option<String>,
    pub messages: Vec<LogEntry>,
    #[serde(skip)]
    pub artifact: Option<ExportArtifact>,
}

impl FileOutcome {
    fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            status: FileStatus::Processed,
            metadata: None,
            preview: Vec::new(),
            duplicates_removed: None,
            cells_filled: None,
            selected_columns: Vec::new(),
            result_preview: Vec::new(),
            chart: None,
            download: None,
            error: None,
            messages: Vec::new(),
            artifact: None,
        }
    }
}

/// Run the pipeline for one file.
///
/// Never fails as a whole: a fatal step is recorded on the outcome
/// (`status`, `error`, and an error message) and later steps are skipped.
pub fn process_file(file: &UploadedFile, controls: &FileControls) -> FileOutcome {
    let mut outcome = FileOutcome::new(&file.name);
    let mut log = FileLog::new(&file.name);

    if let Err(err) = run(file, controls, &mut outcome, &mut log) {
        outcome.status = match err {
            PipelineError::Parse(ParseError::UnsupportedFormat(_)) => FileStatus::Skipped,
            _ => FileStatus::Failed,
        };
        tracing::debug!(file = %file.name, error = %err, "file pipeline stopped");
        log.error(err.to_string());
        outcome.error = Some(err.to_string());
    }

    outcome.messages = log.into_entries();
    outcome
}

fn run(
    file: &UploadedFile,
    controls: &FileControls,
    outcome: &mut FileOutcome,
    log: &mut FileLog,
) -> PipelineResult<()> {
    // 1-2. Detect and parse
    let (format, mut table) = parse_upload(file)?;
    tracing::debug!(file = %file.name, ?format, rows = table.row_count(), "parsed");

    // 3. Report
    outcome.metadata = Some(FileMetadata::describe(file, &table));
    outcome.preview = preview_rows(&table);

    // 4. Clean
    let CleaningReport { duplicates_removed, cells_filled } = cleaner::apply(&mut table, controls.cleaning);
    if let Some(removed) = duplicates_removed {
        log.success(format!("Duplicates Removed! ({} rows)", removed));
    }
    if let Some(filled) = cells_filled {
        log.success(format!("Missing Values have been Filled! ({} cells)", filled));
    }
    outcome.duplicates_removed = duplicates_removed;
    outcome.cells_filled = cells_filled;

    // 5. Select
    let table = select_columns(&table, &controls.columns)?;
    outcome.selected_columns = table.column_names();
    outcome.result_preview = preview_rows(&table);

    // 6. Chart
    if controls.show_chart {
        match bar_chart(&table) {
            Ok(chart) => outcome.chart = Some(chart),
            Err(err) => log.error(err.to_string()),
        }
    }

    // 7. Convert
    if let Some(request) = controls.convert {
        let conversion = convert(&table, &file.name, request)?;
        if let Some(primary_error) = &conversion.primary_error {
            log.error(format!("Error writing Excel file: {}", primary_error));
        }
        let artifact = conversion.artifact;
        log.info(format!("Download {} as {}", file.name, request.target_format));
        outcome.download = Some(ArtifactInfo {
            filename: artifact.filename.clone(),
            mime_type: artifact.mime_type.to_string(),
            size_bytes: artifact.data.len(),
        });
        outcome.artifact = Some(artifact);
    }

    Ok(())
}

/// Clean and project a parsed table without reporting, charting or
/// converting.
pub fn prepare_table(file: &UploadedFile, controls: &FileControls) -> PipelineResult<Table> {
    let (_, mut table) = parse_upload(file)?;
    cleaner::apply(&mut table, controls.cleaning);
    Ok(select_columns(&table, &controls.columns)?)
}

/// Result of processing several files.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub message: String,
}

/// Process every file independently with its own controls (looked up by
/// file name; absent entries use defaults).
pub fn process_batch(files: &[UploadedFile], controls: &Controls) -> BatchReport {
    log_info(format!("Processing {} file(s)", files.len()));
    let defaults = FileControls::default();

    let outcomes: Vec<FileOutcome> = files
        .iter()
        .map(|file| process_file(file, controls.get(&file.name).unwrap_or(&defaults)))
        .collect();

    let count = |status: FileStatus| outcomes.iter().filter(|o| o.status == status).count();
    let report = BatchReport {
        processed: count(FileStatus::Processed),
        skipped: count(FileStatus::Skipped),
        failed: count(FileStatus::Failed),
        files: outcomes,
        message: BATCH_DONE_MESSAGE.to_string(),
    };

    log_success(BATCH_DONE_MESSAGE);
    report
}
