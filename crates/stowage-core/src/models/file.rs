use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A finalized, immutable file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    pub id: Uuid,
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    /// Final path of the file on disk.
    pub location: String,
    /// Originating upload session, or a fresh id for direct uploads.
    pub session_ref: Uuid,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn new(
        stored_name: String,
        original_name: String,
        size: u64,
        mime_type: String,
        location: String,
        session_ref: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stored_name,
            original_name,
            size,
            mime_type,
            location,
            session_ref,
            created_at: Utc::now(),
        }
    }
}

/// Stored file as returned to clients
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StoredFileResponse {
    pub id: Uuid,
    pub file_name: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub upload_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<StoredFile> for StoredFileResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            id: file.id,
            file_name: file.stored_name,
            original_name: file.original_name,
            size: file.size,
            mime_type: file.mime_type,
            upload_id: file.session_ref,
            created_at: file.created_at,
        }
    }
}
