//! Resumable chunked upload handlers.
//!
//! A client opens a session, sends the file in contiguous byte ranges tagged with
//! `Content-Range`, and finalizes once every byte has arrived. A chunk is either the `file`
//! field of a `multipart/form-data` body or a raw body. A session can be inspected at any
//! point to learn where to resume.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use std::sync::Arc;
use stowage_core::models::{
    ChunkUploadResponse, InitiateUploadRequest, StoredFileResponse, UploadSessionResponse,
};
use stowage_core::{AppError, ByteRange};
use tokio_util::io::StreamReader;
use uuid::Uuid;
use validator::Validate;

/// Open an upload session
#[utoipa::path(
    post,
    path = "/api/v0/uploads",
    tag = "uploads",
    request_body = InitiateUploadRequest,
    responses(
        (status = 201, description = "Upload session opened", body = UploadSessionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File exceeds the maximum size", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(
        file_name = %request.file_name,
        file_size = request.file_size,
        operation = "initiate_upload"
    )
)]
pub async fn initiate_upload(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<InitiateUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;

    let session = state
        .uploads
        .open(&request.file_name, request.file_size, &request.mime_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadSessionResponse::from(session)),
    ))
}

/// Get upload session status
#[utoipa::path(
    get,
    path = "/api/v0/uploads/{upload_id}",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Upload session", body = UploadSessionResponse),
        (status = 404, description = "Upload session not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_upload_status(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session = state.uploads.status(upload_id).await?;
    Ok(Json(UploadSessionResponse::from(session)))
}

/// Upload one chunk
///
/// The chunk is the `file` field of a multipart form, or the whole body for any other
/// content type. `Content-Range: bytes <start>-<end>/<total>` gives its inclusive position;
/// `start` may not be past the uploaded size reported by the session.
#[utoipa::path(
    post,
    path = "/api/v0/uploads/{upload_id}/chunks",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session ID"),
        ("Content-Range" = String, Header, description = "Chunk position, e.g. 'bytes 0-1048575/5242880'")
    ),
    request_body(
        content(
            (inline(Object) = "multipart/form-data"),
            (Vec<u8> = "application/octet-stream")
        ),
        description = "Multipart form with a single 'file' field, or the raw chunk bytes"
    ),
    responses(
        (status = 200, description = "Chunk accepted", body = ChunkUploadResponse),
        (status = 400, description = "Invalid Content-Range or chunk length", body = ErrorResponse),
        (status = 404, description = "Upload session not found", body = ErrorResponse),
        (status = 409, description = "Chunk out of order or session already terminal", body = ErrorResponse),
        (status = 500, description = "Chunk could not be written", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, request))]
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
    headers: HeaderMap,
    request: Request,
) -> Result<impl IntoResponse, HttpAppError> {
    let range = content_range(&headers)?;

    let session = if is_multipart(&headers) {
        let mut multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::InvalidInput(format!("Invalid multipart request: {}", e)))?;
        let field = loop {
            match multipart
                .next_field()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
            {
                Some(field) if field.name() == Some("file") => break field,
                Some(_) => continue,
                None => {
                    return Err(AppError::InvalidInput(
                        "No file provided; send the chunk in a field named 'file'".to_string(),
                    )
                    .into())
                }
            }
        };
        let reader = Box::pin(StreamReader::new(field.map_err(std::io::Error::other)));
        state.uploads.write_chunk(upload_id, range, reader).await?
    } else {
        let stream = request
            .into_body()
            .into_data_stream()
            .map_err(std::io::Error::other);
        let reader = Box::pin(StreamReader::new(stream));
        state.uploads.write_chunk(upload_id, range, reader).await?
    };

    Ok(Json(ChunkUploadResponse::from(session)))
}

/// Finalize an upload
#[utoipa::path(
    post,
    path = "/api/v0/uploads/{upload_id}/finalize",
    tag = "uploads",
    params(
        ("upload_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Upload finalized", body = StoredFileResponse),
        (status = 400, description = "Upload incomplete", body = ErrorResponse),
        (status = 404, description = "Upload session not found", body = ErrorResponse),
        (status = 409, description = "Session already completed or failed", body = ErrorResponse),
        (status = 500, description = "File could not be promoted or recorded", body = ErrorResponse),
        (status = 502, description = "Durable store push failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn finalize_upload(
    State(state): State<Arc<AppState>>,
    Path(upload_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = state.uploads.finalize(upload_id).await?;
    Ok(Json(StoredFileResponse::from(file)))
}

fn content_range(headers: &HeaderMap) -> Result<ByteRange, AppError> {
    let value = headers
        .get(header::CONTENT_RANGE)
        .ok_or_else(|| AppError::InvalidRange("Missing Content-Range header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| AppError::InvalidRange("Content-Range header is not ASCII".to_string()))?;
    value.parse()
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}
