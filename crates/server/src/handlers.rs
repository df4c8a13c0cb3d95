use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use stowage_protocol::constants::{
    FIELD_CHUNK_INDEX, FIELD_CHUNK_OFFSET, FIELD_FILE, FIELD_FILE_NAME, FIELD_FILE_SIZE,
    FIELD_TOTAL_CHUNKS,
};
use stowage_protocol::{CancelRequest, ChunkUploadRequest, ErrorKind, ErrorResponse, PurgeResponse, UploadAck};
use stowage_transfer::TransferError;

use crate::routes::AppState;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// A handler failure, rendered as a status code plus the wire error body.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
        }
    }

    fn write_failure(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: ErrorKind::WriteFailure,
            message: message.into(),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        let (status, kind) = match &err {
            TransferError::AlreadyExists(_) => (StatusCode::CONFLICT, ErrorKind::AlreadyExists),
            TransferError::Rejected(_) => (StatusCode::CONFLICT, ErrorKind::Rejected),
            TransferError::SizeMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::SizeMismatch)
            }
            TransferError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::WriteFailure),
            TransferError::SessionNotFound(_) => (StatusCode::NOT_FOUND, ErrorKind::InvalidRequest),
            TransferError::InvalidFileName(_) | TransferError::InvalidChunk(_) => {
                (StatusCode::BAD_REQUEST, ErrorKind::InvalidRequest)
            }
        };
        Self {
            status,
            kind,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(self.status.as_u16(), self.kind, self.message);
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// `POST /upload` — one chunk per request.
pub(crate) async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadAck>, ApiError> {
    let mut file_name: Option<String> = None;
    let mut chunk_index: Option<u64> = None;
    let mut chunk_byte_offset: Option<u64> = None;
    let mut total_chunks: Option<u64> = None;
    let mut file_size: Option<u64> = None;
    let mut payload: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some(FIELD_FILE_NAME) => file_name = Some(text_field(field).await?),
            Some(FIELD_CHUNK_INDEX) => chunk_index = Some(numeric_field(field).await?),
            Some(FIELD_CHUNK_OFFSET) => chunk_byte_offset = Some(numeric_field(field).await?),
            Some(FIELD_TOTAL_CHUNKS) => total_chunks = Some(numeric_field(field).await?),
            Some(FIELD_FILE_SIZE) => file_size = Some(numeric_field(field).await?),
            Some(FIELD_FILE) => {
                payload = Some(field.bytes().await.map_err(|e| {
                    ApiError::invalid(format!("failed to read chunk payload: {e}"))
                })?);
            }
            // Unknown fields are ignored for forward compatibility.
            _ => {}
        }
    }

    let request = ChunkUploadRequest {
        file_name: file_name.ok_or_else(|| missing(FIELD_FILE_NAME))?,
        chunk_index: chunk_index.ok_or_else(|| missing(FIELD_CHUNK_INDEX))?,
        chunk_byte_offset: chunk_byte_offset.ok_or_else(|| missing(FIELD_CHUNK_OFFSET))?,
        total_chunks: total_chunks.ok_or_else(|| missing(FIELD_TOTAL_CHUNKS))?,
        file_size: file_size.ok_or_else(|| missing(FIELD_FILE_SIZE))?,
    };
    let payload = payload.ok_or_else(|| missing(FIELD_FILE))?;

    request
        .validate(payload.len() as u64)
        .map_err(|e| ApiError::invalid(e.to_string()))?;

    process_chunk(&state, request, payload).await
}

fn missing(field: &str) -> ApiError {
    ApiError::invalid(format!("missing form field: {field}"))
}

async fn text_field(field: Field<'_>) -> Result<String, ApiError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| ApiError::invalid(format!("failed to read field {name}: {e}")))
}

async fn numeric_field(field: Field<'_>) -> Result<u64, ApiError> {
    let name = field.name().unwrap_or_default().to_string();
    let text = text_field(field).await?;
    text.trim()
        .parse::<u64>()
        .map_err(|_| ApiError::invalid(format!("field {name} must be a non-negative integer")))
}

async fn process_chunk(
    state: &AppState,
    request: ChunkUploadRequest,
    payload: Bytes,
) -> Result<Json<UploadAck>, ApiError> {
    let session = state.registry.begin_or_continue(
        &request.file_name,
        request.total_chunks,
        request.file_size,
    )?;

    let writer = Arc::clone(&state.writer);
    let file_name = request.file_name.clone();
    let offset = request.chunk_byte_offset;
    let body = payload.clone();
    tokio::task::spawn_blocking(move || writer.write_chunk(&file_name, offset, &body))
        .await
        .map_err(|e| ApiError::write_failure(format!("write task failed: {e}")))??;

    let progress = session.mark_received(request.chunk_index)?;
    tracing::debug!(
        file_name = %request.file_name,
        chunk_index = request.chunk_index,
        total_chunks = request.total_chunks,
        received = progress.received_count,
        duplicate = !progress.newly_received,
        "chunk persisted"
    );

    if progress.complete {
        state.registry.finalize(&request.file_name)?;
    }

    Ok(Json(UploadAck::for_chunk(
        request.chunk_index,
        &request.file_name,
    )))
}

// ---------------------------------------------------------------------------
// Purge / cancel / health
// ---------------------------------------------------------------------------

/// `GET /purge` — delete every upload artifact and reset session state.
pub(crate) async fn purge(State(state): State<AppState>) -> Result<Json<PurgeResponse>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let removed = tokio::task::spawn_blocking(move || registry.purge())
        .await
        .map_err(|e| ApiError::write_failure(format!("purge task failed: {e}")))??;
    Ok(Json(PurgeResponse { removed }))
}

/// `POST /cancel` — abort one in-flight upload and drop its partial file.
///
/// Only a file with an active (or rejected) session is deleted; a
/// completed upload with no session is not cancellable.
pub(crate) async fn cancel(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<StatusCode, ApiError> {
    let aborted = state.registry.abort(&request.file_name);
    let removed = if aborted {
        let writer = Arc::clone(&state.writer);
        let file_name = request.file_name.clone();
        tokio::task::spawn_blocking(move || writer.remove(&file_name))
            .await
            .map_err(|e| ApiError::write_failure(format!("cancel task failed: {e}")))??
    } else {
        false
    };

    tracing::info!(file_name = %request.file_name, aborted, removed, "upload cancelled");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /health`.
pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
