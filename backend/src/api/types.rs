//! REST API types for frontend integration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::transform::pipeline::BatchReport;

/// Response sent after processing an upload batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning" (some files skipped or failed)
    pub status: String,

    /// When the batch finished (RFC 3339)
    pub completed_at: String,

    #[serde(flatten)]
    pub report: BatchReport,
}

impl From<BatchReport> for ProcessResponse {
    fn from(report: BatchReport) -> Self {
        let status = if report.skipped + report.failed == 0 { "ready" } else { "warning" };

        ProcessResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            completed_at: chrono::Utc::now().to_rfc3339(),
            report,
        }
    }
}

/// Query parameters of the convert endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertQuery {
    /// Target format ("csv" or "excel"); overrides the file's controls.
    pub to: Option<String>,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "files": [],
    })
}
