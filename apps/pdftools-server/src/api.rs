//! API handlers for the PDF tools server
//!
//! Provides REST endpoints for:
//! - File upload, listing, download and deletion
//! - Job creation and status polling
//! - The operation catalog

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use pdftools_core::{Arity, Category, Operation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::jobs::JobStatus;
use crate::polling::JobView;
use crate::registry::{FileRecord, FileStatus, NewFile};
use crate::storage::StoredFile;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdftools-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Summary of a stored upload
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub original_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub status: FileStatus,
}

impl From<&FileRecord> for UploadedFile {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id,
            original_name: record.original_name.clone(),
            file_type: record.file_type.clone(),
            file_size: record.file_size,
            status: record.status,
        }
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<UploadedFile>,
}

/// A file that passed validation but has not been written yet
struct PendingUpload {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

/// Handler: POST /api/upload
///
/// Every file is validated before any is written, so a rejected request
/// leaves nothing behind.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let config = &state.config;
    let mut pending = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        if pending.len() >= config.max_files_per_upload {
            return Err(ApiError::InvalidRequest(format!(
                "Too many files; at most {} per upload",
                config.max_files_per_upload
            )));
        }

        let name = field.file_name().unwrap_or("file").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !ServerConfig::is_allowed_mime(&mime_type) {
            return Err(ApiError::UnsupportedMediaType(format!(
                "Invalid file type: {}",
                mime_type
            )));
        }

        let bytes = field.bytes().await?;
        if bytes.len() > config.max_file_size {
            return Err(ApiError::PayloadTooLarge(format!(
                "{} exceeds the maximum file size of {} MB",
                name,
                config.max_file_size / (1024 * 1024)
            )));
        }
        debug!("Received {} ({}, {} bytes)", name, mime_type, bytes.len());
        pending.push(PendingUpload {
            name,
            mime_type,
            bytes: bytes.to_vec(),
        });
    }

    if pending.is_empty() {
        return Err(ApiError::InvalidRequest("No files uploaded".into()));
    }

    let storage = state.registry.storage();
    let mut stored: Vec<(PendingUpload, StoredFile)> = Vec::with_capacity(pending.len());
    for upload in pending {
        match storage.save_upload(&upload.name, &upload.bytes).await {
            Ok(file) => stored.push((upload, file)),
            Err(e) => {
                for (_, file) in &stored {
                    if let Err(cleanup) = storage.remove(&file.path).await {
                        warn!("Could not remove {}: {}", file.path.display(), cleanup);
                    }
                }
                return Err(e.into());
            }
        }
    }

    let files: Vec<UploadedFile> = stored
        .into_iter()
        .map(|(upload, file)| {
            let record = state.registry.create(NewFile {
                original_name: upload.name,
                file_type: upload.mime_type,
                stored: file,
                status: FileStatus::Uploaded,
                metadata: serde_json::Value::Null,
            });
            UploadedFile::from(&record)
        })
        .collect();

    info!("Uploaded {} file(s)", files.len());
    Ok(Json(UploadResponse {
        success: true,
        files,
    }))
}

fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("{} not found", what)))
}

/// Handler: GET /api/files
pub async fn handle_list_files(State(state): State<AppState>) -> Json<Vec<FileRecord>> {
    Json(state.registry.list())
}

/// Handler: GET /api/files/:id
pub async fn handle_get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FileRecord>> {
    let id = parse_id(&id, "File")?;
    state
        .registry
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("File not found".into()))
}

/// Handler: DELETE /api/files/:id
pub async fn handle_delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let id = parse_id(&id, "File")?;
    state
        .registry
        .delete(&id)
        .await
        .ok_or_else(|| ApiError::NotFound("File not found".into()))?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Make a name safe to place inside a quoted `Content-Disposition` value.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && !matches!(c, '"' | '\\'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Handler: GET /api/files/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "File")?;
    let record = state
        .registry
        .get(&id)
        .ok_or_else(|| ApiError::NotFound("File not found".into()))?;

    let bytes = match state.registry.read(&record).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not found on disk".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(&record.original_name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, record.file_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Process request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub operation: String,
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
}

/// Handler: POST /api/process
///
/// Only an unknown operation or a missing input file is rejected here.
/// Everything else is checked by the job itself and reported through its
/// status.
pub async fn handle_process(
    State(state): State<AppState>,
    body: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessResponse>> {
    let Json(request) = body?;

    let operation: Operation = request
        .operation
        .parse()
        .map_err(|e: pdftools_core::PdfToolsError| ApiError::UnknownOperation(e.to_string()))?;

    let mut input_files = Vec::with_capacity(request.input_files.len());
    for raw in &request.input_files {
        let id = Uuid::parse_str(raw)
            .ok()
            .filter(|id| state.registry.get(id).is_some())
            .ok_or_else(|| ApiError::FileNotFound(format!("File {} not found", raw)))?;
        input_files.push(id);
    }

    let job = state
        .manager
        .submit(operation, input_files, request.parameters);

    Ok(Json(ProcessResponse {
        job_id: job.id,
        status: job.status,
        progress: job.progress,
    }))
}

/// Handler: GET /api/jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Json<Vec<JobView>> {
    Json(
        state
            .jobs
            .list()
            .into_iter()
            .map(|job| JobView::new(job, &state.registry, &state.polling))
            .collect(),
    )
}

/// Handler: GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobView>> {
    let id = parse_id(&id, "Job")?;
    let job = state
        .jobs
        .get(&id)
        .ok_or_else(|| ApiError::NotFound("Job not found".into()))?;
    Ok(Json(JobView::new(job, &state.registry, &state.polling)))
}

/// Handler: DELETE /api/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let id = parse_id(&id, "Job")?;
    state
        .jobs
        .remove(&id)
        .ok_or_else(|| ApiError::NotFound("Job not found".into()))?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Catalog entry for one operation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub id: Operation,
    pub title: &'static str,
    pub category: Category,
    pub min_inputs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_inputs: Option<usize>,
}

impl From<Operation> for OperationInfo {
    fn from(op: Operation) -> Self {
        let (min_inputs, max_inputs) = match op.arity() {
            Arity::Exactly(n) => (n, Some(n)),
            Arity::AtLeast(n) => (n, None),
            Arity::OptionalOne => (0, Some(1)),
        };
        Self {
            id: op,
            title: op.title(),
            category: op.category(),
            min_inputs,
            max_inputs,
        }
    }
}

/// Handler: GET /api/operations
pub async fn handle_list_operations() -> Json<Vec<OperationInfo>> {
    Json(Operation::ALL.into_iter().map(OperationInfo::from).collect())
}
