//! HTTP Server for the datasweep API.
//!
//! Provides REST endpoints for uploading CSV/Excel files, running the
//! cleaning pipeline and downloading converted files.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                                  |
//! |--------|-------------------|----------------------------------------------|
//! | GET    | `/health`         | Health check                                 |
//! | POST   | `/api/process`    | Run the pipeline on every uploaded file      |
//! | POST   | `/api/convert`    | Run the pipeline on one file, return it      |
//! | GET    | `/api/logs`       | SSE stream for real-time messages            |
//!
//! Uploads are multipart forms: one or more `file` parts, plus an optional
//! `controls` part holding a JSON object of per-file controls keyed by file
//! name.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, ConvertQuery, ProcessResponse};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::models::{ConversionRequest, Controls, TargetFormat, UploadedFile};
use crate::transform::pipeline::{process_batch, process_file, FileStatus};

type ApiError = (StatusCode, Json<Value>);

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        let status = match err {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(error_response(&err.to_string())))
    }
}

/// Build the application router.
pub fn router(config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/process", post(process_upload))
        .route("/api/convert", post(convert_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(&config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Datasweep server running on http://localhost:{}", config.port);
    println!("   POST /api/process - Upload files, get previews, charts and reports");
    println!("   POST /api/convert - Upload one file, download it converted");
    println!("   GET  /api/logs    - SSE message stream");
    println!("   GET  /health      - Health check");
    println!();
    tracing::info!(port = config.port, max_upload_bytes = config.max_upload_bytes, "server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "datasweep",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "process": "POST /api/process",
            "convert": "POST /api/convert",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Files and controls read from a multipart upload.
struct UploadForm {
    files: Vec<UploadedFile>,
    controls: Controls,
}

async fn read_form(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut files = Vec::new();
    let mut controls = Controls::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ServerError::BadRequest("File part without a file name".into()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                files.push(UploadedFile::new(name, bytes.to_vec()));
            }
            "controls" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                controls = serde_json::from_str(&text)
                    .map_err(|e| ServerError::BadRequest(format!("Invalid controls: {}", e)))?;
            }
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }

    if files.is_empty() {
        return Err(ServerError::BadRequest("No file provided".into()));
    }

    Ok(UploadForm { files, controls })
}

/// Process every uploaded file
async fn process_upload(multipart: Multipart) -> Result<Json<ProcessResponse>, ApiError> {
    let UploadForm { files, controls } = read_form(multipart).await?;

    println!("\n{}", "=".repeat(70));
    for file in &files {
        println!("📄 NEW UPLOAD: {} ({} bytes)", file.name, file.size());
    }
    println!("{}\n", "=".repeat(70));

    let report = tokio::task::spawn_blocking(move || process_batch(&files, &controls))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    println!(
        "📊 {} processed, {} skipped, {} failed",
        report.processed, report.skipped, report.failed
    );

    Ok(Json(ProcessResponse::from(report)))
}

/// Run the pipeline on a single file and return the converted artifact
async fn convert_upload(
    Query(query): Query<ConvertQuery>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let UploadForm { mut files, mut controls } = read_form(multipart).await?;
    if files.len() != 1 {
        return Err(ServerError::BadRequest("Convert expects exactly one file".into()).into());
    }
    let file = files.remove(0);

    let mut file_controls = controls.remove(&file.name).unwrap_or_default();
    if let Some(to) = query.to.as_deref() {
        let target_format: TargetFormat = to.parse().map_err(ServerError::BadRequest)?;
        file_controls.convert = Some(ConversionRequest { target_format });
    }
    if file_controls.convert.is_none() {
        return Err(ServerError::BadRequest("No target format given (use ?to=csv or ?to=excel)".into()).into());
    }

    let outcome = tokio::task::spawn_blocking(move || process_file(&file, &file_controls))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let artifact = match (outcome.status, outcome.artifact) {
        (FileStatus::Processed, Some(artifact)) => artifact,
        (status, _) => {
            let message = outcome.error.unwrap_or_else(|| "Conversion failed".into());
            log_error(format!("Conversion of {} failed: {}", outcome.file_name, message));
            let code = if status == FileStatus::Skipped {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            return Err((code, Json(error_response(&message))));
        }
    };

    let headers = [
        (header::CONTENT_TYPE, artifact.mime_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.filename),
        ),
    ];

    Ok((headers, artifact.data).into_response())
}

/// `attachment` disposition with an ASCII-safe file name.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' { c } else { '_' })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::XLSX_MIME;

    const BOUNDARY: &str = "datasweep-test-boundary";

    /// One multipart part: (field name, optional file name, content).
    type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn post(uri: &str, parts: &[Part<'_>]) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();

        router(&ServerConfig::default()).oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    const A_CSV: &[u8] = b"id,val\n1,10\n1,10\n2,\n";

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router(&ServerConfig::default()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_process_applies_controls_per_file() {
        let controls = br#"{"a.csv": {"cleaning": {"removeDuplicates": true}, "showChart": true}}"#;
        let response = post(
            "/api/process",
            &[
                ("file", Some("a.csv"), A_CSV),
                ("file", Some("b.csv"), A_CSV),
                ("controls", None, controls),
            ],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ready");
        assert_eq!(json["processed"], 2);
        assert_eq!(json["files"][0]["duplicatesRemoved"], 1);
        assert_eq!(json["files"][0]["chart"]["series"][0]["name"], "id");
        assert!(json["files"][1]["duplicatesRemoved"].is_null());
        assert!(json["files"][1]["chart"].is_null());
    }

    #[tokio::test]
    async fn test_process_reports_skipped_files() {
        let response = post(
            "/api/process",
            &[("file", Some("notes.txt"), b"hello"), ("file", Some("a.csv"), A_CSV)],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "warning");
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["files"][0]["status"], "skipped");
        assert_eq!(json["files"][0]["error"], "Unsupported file type: .txt");
    }

    #[tokio::test]
    async fn test_process_without_file_is_bad_request() {
        let response = post("/api/process", &[("controls", None, b"{}")]).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid request: No file provided");
    }

    #[tokio::test]
    async fn test_invalid_controls_is_bad_request() {
        let response = post(
            "/api/process",
            &[("file", Some("a.csv"), A_CSV), ("controls", None, b"not json")],
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_convert_query_overrides_controls() {
        let controls = br#"{"Data.CSV": {"convert": {"targetFormat": "csv"}}}"#;
        let response = post(
            "/api/convert?to=excel",
            &[("file", Some("Data.CSV"), A_CSV), ("controls", None, controls)],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_MIME);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Data.xlsx\""
        );
        assert_eq!(&body_bytes(response).await[..2], b"PK");
    }

    #[tokio::test]
    async fn test_convert_uses_file_controls() {
        let controls =
            br#"{"a.csv": {"cleaning": {"removeDuplicates": true}, "convert": {"targetFormat": "csv"}}}"#;
        let response = post(
            "/api/convert",
            &[("file", Some("a.csv"), A_CSV), ("controls", None, controls)],
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"a.csv\""
        );
        assert_eq!(body_bytes(response).await, b"id,val\n1,10\n2,\n".to_vec());
    }

    #[tokio::test]
    async fn test_convert_without_target_is_bad_request() {
        let response = post("/api/convert", &[("file", Some("a.csv"), A_CSV)]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_convert_unknown_target_is_bad_request() {
        let response = post("/api/convert?to=pdf", &[("file", Some("a.csv"), A_CSV)]).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("pdf"));
    }

    #[tokio::test]
    async fn test_convert_expects_exactly_one_file() {
        let response = post(
            "/api/convert?to=csv",
            &[("file", Some("a.csv"), A_CSV), ("file", Some("b.csv"), A_CSV)],
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Invalid request: Convert expects exactly one file"
        );
    }

    #[tokio::test]
    async fn test_convert_unsupported_file_is_415() {
        let response = post("/api/convert?to=csv", &[("file", Some("notes.txt"), b"hello")]).await;

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body_json(response).await["error"], "Unsupported file type: .txt");
    }

    #[tokio::test]
    async fn test_convert_unparsable_file_is_422() {
        let response = post(
            "/api/convert?to=excel",
            &[("file", Some("ragged.csv"), b"a,b\n1,2,3\n")],
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Expected 2 fields, saw 3"));
    }

    #[test]
    fn test_content_disposition_is_ascii() {
        assert_eq!(content_disposition("a.csv"), "attachment; filename=\"a.csv\"");
        assert_eq!(
            content_disposition("données \"v2\".xlsx"),
            "attachment; filename=\"donn_es _v2_.xlsx\""
        );
    }

    #[test]
    fn test_server_error_status() {
        let (status, body) = ApiError::from(ServerError::BadRequest("No file provided".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["error"], "Invalid request: No file provided");

        let (status, _) = ApiError::from(ServerError::Internal("join".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_router_builds() {
        let _ = router(&ServerConfig::default());
    }
}
