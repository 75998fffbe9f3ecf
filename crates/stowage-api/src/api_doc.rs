//! OpenAPI documentation, served at `/api/openapi.json` and browsable at `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use stowage_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage API",
        version = "0.1.0",
        description = "Resumable chunked file uploads (v0). Open a session, send contiguous byte ranges with Content-Range, then finalize. Small files can be sent in a single multipart request. All endpoints are versioned under /api/v0/."
    ),
    paths(
        // Chunked uploads
        handlers::uploads::initiate_upload,
        handlers::uploads::get_upload_status,
        handlers::uploads::upload_chunk,
        handlers::uploads::finalize_upload,
        // Files
        handlers::files::upload_file,
        handlers::files::get_file,
    ),
    components(
        schemas(
            models::InitiateUploadRequest,
            models::UploadSessionResponse,
            models::ChunkUploadResponse,
            models::StoredFileResponse,
            models::UploadStatus,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Resumable chunked upload sessions"),
        (name = "files", description = "Stored files and single-request uploads")
    )
)]
pub struct ApiDoc;
