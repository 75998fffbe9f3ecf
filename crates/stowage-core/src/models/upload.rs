use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Lifecycle state of an upload session.
///
/// `Pending` → `Uploading` → `Completed` | `Failed`. Nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "upload_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UploadStatus::Pending),
            "uploading" => Ok(UploadStatus::Uploading),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// One in-progress or terminal resumable upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadSession {
    pub id: Uuid,
    /// Server-generated name of the staging blob and, later, the final file.
    pub staged_name: String,
    /// Client-supplied display name. Untrusted.
    pub original_name: String,
    pub total_size: u64,
    /// Contiguous-from-zero byte count confirmed written.
    pub uploaded_size: u64,
    pub mime_type: String,
    pub status: UploadStatus,
    pub staging_location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadSession {
    pub fn new(
        original_name: String,
        staged_name: String,
        total_size: u64,
        mime_type: String,
        staging_location: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            staged_name,
            original_name,
            total_size,
            uploaded_size: 0,
            mime_type,
            status: UploadStatus::Pending,
            staging_location,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Rejects any operation on a terminal session.
    pub fn ensure_active(&self) -> Result<(), AppError> {
        match self.status {
            UploadStatus::Pending | UploadStatus::Uploading => Ok(()),
            UploadStatus::Completed => Err(AppError::AlreadyCompleted(self.id)),
            UploadStatus::Failed => Err(AppError::AlreadyFailed(self.id)),
        }
    }

    /// Advances the frontier after a chunk ending at `end_exclusive` was fully written.
    ///
    /// The frontier never moves backwards and never passes `total_size`.
    pub fn record_chunk(&mut self, end_exclusive: u64) {
        self.uploaded_size = self
            .uploaded_size
            .max(end_exclusive.min(self.total_size));
        self.status = UploadStatus::Uploading;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self) {
        self.status = UploadStatus::Failed;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.status = UploadStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_size == self.total_size
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        (self.uploaded_size as f64 / self.total_size as f64) * 100.0
    }
}

/// Request to open a chunked upload session
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct InitiateUploadRequest {
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "File name must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    /// Total file size in bytes
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub file_size: u64,
    /// Content type (MIME type)
    #[validate(length(
        min = 1,
        max = 255,
        message = "MIME type must be between 1 and 255 characters"
    ))]
    pub mime_type: String,
}

/// Upload session as returned to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadSessionResponse {
    pub upload_id: Uuid,
    pub file_name: String,
    pub total_size: u64,
    pub uploaded_size: u64,
    pub mime_type: String,
    pub status: UploadStatus,
    pub upload_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<UploadSession> for UploadSessionResponse {
    fn from(session: UploadSession) -> Self {
        let upload_percent = session.progress_percent();
        Self {
            upload_id: session.id,
            file_name: session.original_name,
            total_size: session.total_size,
            uploaded_size: session.uploaded_size,
            mime_type: session.mime_type,
            status: session.status,
            upload_percent,
            created_at: session.created_at,
            updated_at: session.updated_at,
            completed_at: session.completed_at,
        }
    }
}

/// Progress after an accepted chunk
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChunkUploadResponse {
    pub upload_id: Uuid,
    pub uploaded_size: u64,
    pub total_size: u64,
    pub status: UploadStatus,
    pub upload_percent: f64,
}

impl From<UploadSession> for ChunkUploadResponse {
    fn from(session: UploadSession) -> Self {
        Self {
            upload_id: session.id,
            uploaded_size: session.uploaded_size,
            total_size: session.total_size,
            status: session.status,
            upload_percent: session.progress_percent(),
        }
    }
}
