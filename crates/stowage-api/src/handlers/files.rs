//! Stored file handlers: single-request upload and lookup.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    Json,
};
use std::io::Cursor;
use std::sync::Arc;
use stowage_core::models::StoredFileResponse;
use stowage_core::AppError;
use stowage_storage::BoxedReader;
use uuid::Uuid;

/// File extracted from a multipart request.
struct MultipartFile {
    data: Vec<u8>,
    file_name: String,
    content_type: String,
}

/// Read the single `file` field of a multipart request into memory.
async fn extract_multipart_file(mut multipart: Multipart) -> Result<MultipartFile, AppError> {
    let mut file: Option<MultipartFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if file.is_some() {
            return Err(AppError::InvalidInput(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "unknown".to_string());
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?;

        file = Some(MultipartFile {
            data: data.to_vec(),
            file_name,
            content_type,
        });
    }

    file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))
}

/// Upload a whole file in one request
#[utoipa::path(
    post,
    path = "/api/v0/files",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Multipart form with a single 'file' field"),
    responses(
        (status = 200, description = "File stored", body = StoredFileResponse),
        (status = 400, description = "Invalid multipart request", body = ErrorResponse),
        (status = 413, description = "File exceeds the maximum size", body = ErrorResponse),
        (status = 500, description = "File could not be stored", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "direct_upload"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = extract_multipart_file(multipart).await?;
    let size = file.data.len() as u64;
    let reader: BoxedReader = Box::pin(Cursor::new(file.data));

    let stored = state
        .uploads
        .direct_upload(&file.file_name, size, &file.content_type, reader)
        .await?;

    Ok(Json(StoredFileResponse::from(stored)))
}

/// Get a stored file
#[utoipa::path(
    get,
    path = "/api/v0/files/{file_id}",
    tag = "files",
    params(
        ("file_id" = Uuid, Path, description = "Stored file ID")
    ),
    responses(
        (status = 200, description = "Stored file", body = StoredFileResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = state.uploads.get_file(file_id).await?;
    Ok(Json(StoredFileResponse::from(file)))
}
