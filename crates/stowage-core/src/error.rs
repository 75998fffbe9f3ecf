//! Error types module
//!
//! All failures surfaced by the upload core are unified under the `AppError` enum. Each
//! variant belongs to exactly one [`ErrorClass`], which decides whether the failure is
//! reported only (validation, sequencing), fatal to the session (I/O) or a conflict with
//! an already-terminal session.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for rejected requests the client must correct
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Broad error classes of the upload core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or out-of-bounds input. Never retried automatically.
    Validation,
    /// Request arrived in the wrong order; the client must resend or wait.
    Sequencing,
    /// Storage or persistence failure. Fatal to the session it occurred in.
    Io,
    /// Unknown session or file id.
    NotFound,
    /// Operation on an already-terminal session.
    StateConflict,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "OUT_OF_ORDER_CHUNK")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// Error class within the upload taxonomy
    fn error_class(&self) -> ErrorClass;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid content range: {0}")]
    InvalidRange(String),

    #[error("File size {size} exceeds maximum allowed size of {max} bytes")]
    SizeLimitExceeded { size: u64, max: u64 },

    #[error("Total size mismatch: range declares {declared} bytes, upload expects {expected}")]
    TotalSizeMismatch { declared: u64, expected: u64 },

    #[error("Chunk out of order: starts at {start} but only {uploaded} bytes are uploaded")]
    OutOfOrderChunk { start: u64, uploaded: u64 },

    #[error("Upload incomplete: expected {total} bytes, got {uploaded} bytes")]
    UploadIncomplete { uploaded: u64, total: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload {0} already completed")]
    AlreadyCompleted(Uuid),

    #[error("Upload {0} has failed")]
    AlreadyFailed(Uuid),

    #[error("Upload {0} was changed by another writer")]
    StaleSessionUpdate(Uuid),

    #[error("Failed to allocate staging file: {0}")]
    StagingAllocationFailed(String),

    #[error("Failed to persist upload record: {0}")]
    PersistenceFailed(String),

    #[error("Failed to write chunk: {0}")]
    ChunkWriteFailed(String),

    #[error("Chunk size mismatch: expected {expected} bytes, got {actual}")]
    ChunkSizeMismatch { expected: u64, actual: u64 },

    #[error("Failed to move file to final location: {0}")]
    FinalizeMoveFailed(String),

    #[error("Failed to sync file to durable store: {0}")]
    DurableSyncFailed(String),

    #[error("Direct upload failed: {0}")]
    DirectUploadFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level, class).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
    ErrorClass,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
            ErrorClass::Validation,
        ),
        AppError::InvalidRange(_) => (
            400,
            "INVALID_CONTENT_RANGE",
            false,
            Some("Send a Content-Range header of the form 'bytes <start>-<end>/<total>'"),
            false,
            LogLevel::Debug,
            ErrorClass::Validation,
        ),
        AppError::SizeLimitExceeded { .. } => (
            413,
            "SIZE_LIMIT_EXCEEDED",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
            ErrorClass::Validation,
        ),
        AppError::TotalSizeMismatch { .. } => (
            400,
            "TOTAL_SIZE_MISMATCH",
            false,
            Some("Use the total size declared when the upload was opened"),
            false,
            LogLevel::Debug,
            ErrorClass::Validation,
        ),
        AppError::OutOfOrderChunk { .. } => (
            409,
            "OUT_OF_ORDER_CHUNK",
            true,
            Some("Query upload status and resend from the uploaded size"),
            false,
            LogLevel::Warn,
            ErrorClass::Sequencing,
        ),
        AppError::UploadIncomplete { .. } => (
            400,
            "UPLOAD_INCOMPLETE",
            true,
            Some("Upload the remaining chunks before finalizing"),
            false,
            LogLevel::Debug,
            ErrorClass::Sequencing,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
            ErrorClass::NotFound,
        ),
        AppError::AlreadyCompleted(_) => (
            409,
            "ALREADY_COMPLETED",
            false,
            None,
            false,
            LogLevel::Debug,
            ErrorClass::StateConflict,
        ),
        AppError::AlreadyFailed(_) => (
            409,
            "ALREADY_FAILED",
            false,
            Some("Open a new upload session"),
            false,
            LogLevel::Debug,
            ErrorClass::StateConflict,
        ),
        AppError::StaleSessionUpdate(_) => (
            409,
            "STALE_SESSION_UPDATE",
            true,
            Some("Query upload status and resend from the uploaded size"),
            false,
            LogLevel::Warn,
            ErrorClass::StateConflict,
        ),
        AppError::StagingAllocationFailed(_) => (
            500,
            "STAGING_ALLOCATION_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::PersistenceFailed(_) => (
            500,
            "PERSISTENCE_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::ChunkWriteFailed(_) => (
            500,
            "CHUNK_WRITE_FAILED",
            false,
            Some("Open a new upload session"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::ChunkSizeMismatch { .. } => (
            400,
            "CHUNK_SIZE_MISMATCH",
            false,
            Some("Open a new upload session"),
            false,
            LogLevel::Warn,
            ErrorClass::Io,
        ),
        AppError::FinalizeMoveFailed(_) => (
            500,
            "FINALIZE_MOVE_FAILED",
            false,
            Some("Open a new upload session"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::DurableSyncFailed(_) => (
            502,
            "DURABLE_SYNC_FAILED",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::DirectUploadFailed(_) => (
            500,
            "DIRECT_UPLOAD_FAILED",
            true,
            Some("Retry the upload"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
            ErrorClass::Io,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::InvalidRange(_) => "InvalidRange",
            AppError::SizeLimitExceeded { .. } => "SizeLimitExceeded",
            AppError::TotalSizeMismatch { .. } => "TotalSizeMismatch",
            AppError::OutOfOrderChunk { .. } => "OutOfOrderChunk",
            AppError::UploadIncomplete { .. } => "UploadIncomplete",
            AppError::NotFound(_) => "NotFound",
            AppError::AlreadyCompleted(_) => "AlreadyCompleted",
            AppError::AlreadyFailed(_) => "AlreadyFailed",
            AppError::StaleSessionUpdate(_) => "StaleSessionUpdate",
            AppError::StagingAllocationFailed(_) => "StagingAllocationFailed",
            AppError::PersistenceFailed(_) => "PersistenceFailed",
            AppError::ChunkWriteFailed(_) => "ChunkWriteFailed",
            AppError::ChunkSizeMismatch { .. } => "ChunkSizeMismatch",
            AppError::FinalizeMoveFailed(_) => "FinalizeMoveFailed",
            AppError::DurableSyncFailed(_) => "DurableSyncFailed",
            AppError::DirectUploadFailed(_) => "DirectUploadFailed",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn error_class(&self) -> ErrorClass {
        app_error_static_metadata(self).6
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::StagingAllocationFailed(_) => {
                "Failed to allocate upload storage".to_string()
            }
            AppError::PersistenceFailed(_) => "Failed to save upload record".to_string(),
            AppError::ChunkWriteFailed(_) => "Failed to write chunk".to_string(),
            AppError::FinalizeMoveFailed(_) => {
                "Failed to move file to final location".to_string()
            }
            AppError::DurableSyncFailed(_) => {
                "Failed to replicate file to durable storage".to_string()
            }
            AppError::DirectUploadFailed(_) => "Failed to store uploaded file".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::InvalidInput(ref msg)
            | AppError::InvalidRange(ref msg)
            | AppError::NotFound(ref msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
