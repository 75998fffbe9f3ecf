use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use stowage_core::{AppError, StoredFile, UploadSession, UploadStatus};
use uuid::Uuid;

use super::memory::InMemoryUploadRepository;

/// Trait for upload record persistence
/// This abstracts the storage of sessions and stored files (PostgreSQL or in-memory)
#[async_trait::async_trait]
pub trait UploadRecordStore: Send + Sync {
    async fn create_session(&self, session: &UploadSession) -> Result<(), AppError>;

    /// Fails with `NotFound` when no session has this id.
    async fn get_session(&self, id: Uuid) -> Result<UploadSession, AppError>;

    /// Persists progress, status and timestamps of an existing session.
    ///
    /// Only an active record whose uploaded size does not exceed the new one is updated, so a
    /// writer holding a stale copy can neither move the frontier back nor reopen a terminal
    /// session. Such a write fails with `StaleSessionUpdate`.
    async fn update_session(&self, session: &UploadSession) -> Result<(), AppError>;

    async fn create_file(&self, file: &StoredFile) -> Result<(), AppError>;

    /// The stored file promoted from the given session, if any.
    async fn find_file_by_session(&self, session_id: Uuid)
        -> Result<Option<StoredFile>, AppError>;

    /// Fails with `NotFound` when no file has this id.
    async fn get_file(&self, id: Uuid) -> Result<StoredFile, AppError>;
}

/// Choose the record store: PostgreSQL when a pool is available, in-memory otherwise.
pub fn create_record_store(pool: Option<PgPool>) -> Arc<dyn UploadRecordStore> {
    match pool {
        Some(pool) => {
            tracing::info!("Initializing PostgreSQL upload repository");
            Arc::new(PostgresUploadRepository::new(pool))
        }
        None => {
            tracing::warn!("No database configured, upload records are kept in memory only");
            Arc::new(InMemoryUploadRepository::new())
        }
    }
}

fn to_db_size(value: u64, field: &str) -> Result<i64, AppError> {
    i64::try_from(value)
        .map_err(|_| AppError::InvalidInput(format!("{} {} is too large to store", field, value)))
}

fn from_db_size(value: i64, field: &str) -> Result<u64, AppError> {
    u64::try_from(value)
        .map_err(|_| AppError::Internal(format!("Negative {} in database: {}", field, value)))
}

/// Repository for upload sessions and stored files
#[derive(Clone)]
pub struct PostgresUploadRepository {
    pool: PgPool,
}

impl PostgresUploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UploadRecordStore for PostgresUploadRepository {
    async fn create_session(&self, session: &UploadSession) -> Result<(), AppError> {
        // Use dynamic SQLx queries to avoid requiring DATABASE_URL/sqlx prepare
        sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                id, staged_name, original_name, total_size, uploaded_size,
                mime_type, status, staging_location, created_at, updated_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.id)
        .bind(&session.staged_name)
        .bind(&session.original_name)
        .bind(to_db_size(session.total_size, "total_size")?)
        .bind(to_db_size(session.uploaded_size, "uploaded_size")?)
        .bind(&session.mime_type)
        .bind(session.status)
        .bind(&session.staging_location)
        .bind(session.created_at)
        .bind(session.updated_at)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<UploadSession, AppError> {
        let row = sqlx::query_as::<_, UploadSessionRow>(
            r#"
            SELECT
                id, staged_name, original_name, total_size, uploaded_size,
                mime_type, status, staging_location, created_at, updated_at, completed_at
            FROM upload_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Upload session {} not found", id)))?
            .try_into()
    }

    async fn update_session(&self, session: &UploadSession) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE upload_sessions
            SET uploaded_size = $2, status = $3, updated_at = $4, completed_at = $5
            WHERE id = $1
              AND status IN ('pending', 'uploading')
              AND uploaded_size <= $2
            "#,
        )
        .bind(session.id)
        .bind(to_db_size(session.uploaded_size, "uploaded_size")?)
        .bind(session.status)
        .bind(session.updated_at)
        .bind(session.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM upload_sessions WHERE id = $1)")
                    .bind(session.id)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(AppError::NotFound(format!(
                    "Upload session {} not found",
                    session.id
                )));
            }
            tracing::warn!(
                session_id = %session.id,
                uploaded_size = session.uploaded_size,
                status = %session.status,
                "Rejected stale upload session update"
            );
            return Err(AppError::StaleSessionUpdate(session.id));
        }

        Ok(())
    }

    async fn create_file(&self, file: &StoredFile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO stored_files (
                id, stored_name, original_name, size, mime_type, location, session_ref, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(file.id)
        .bind(&file.stored_name)
        .bind(&file.original_name)
        .bind(to_db_size(file.size, "size")?)
        .bind(&file.mime_type)
        .bind(&file.location)
        .bind(file.session_ref)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<StoredFile, AppError> {
        let row = sqlx::query_as::<_, StoredFileRow>(
            r#"
            SELECT id, stored_name, original_name, size, mime_type, location, session_ref, created_at
            FROM stored_files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?
            .try_into()
    }

    async fn find_file_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<StoredFile>, AppError> {
        let row = sqlx::query_as::<_, StoredFileRow>(
            r#"
            SELECT id, stored_name, original_name, size, mime_type, location, session_ref, created_at
            FROM stored_files
            WHERE session_ref = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredFile::try_from).transpose()
    }
}

/// Upload session row
#[derive(Debug)]
struct UploadSessionRow {
    id: Uuid,
    staged_name: String,
    original_name: String,
    total_size: i64,
    uploaded_size: i64,
    mime_type: String,
    status: UploadStatus,
    staging_location: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UploadSessionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UploadSessionRow {
            id: row.try_get("id")?,
            staged_name: row.try_get("staged_name")?,
            original_name: row.try_get("original_name")?,
            total_size: row.try_get("total_size")?,
            uploaded_size: row.try_get("uploaded_size")?,
            mime_type: row.try_get("mime_type")?,
            status: row.try_get("status")?,
            staging_location: row.try_get("staging_location")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

impl TryFrom<UploadSessionRow> for UploadSession {
    type Error = AppError;

    fn try_from(row: UploadSessionRow) -> Result<Self, Self::Error> {
        Ok(UploadSession {
            id: row.id,
            staged_name: row.staged_name,
            original_name: row.original_name,
            total_size: from_db_size(row.total_size, "total_size")?,
            uploaded_size: from_db_size(row.uploaded_size, "uploaded_size")?,
            mime_type: row.mime_type,
            status: row.status,
            staging_location: row.staging_location,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Stored file row
#[derive(Debug, sqlx::FromRow)]
struct StoredFileRow {
    id: Uuid,
    stored_name: String,
    original_name: String,
    size: i64,
    mime_type: String,
    location: String,
    session_ref: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoredFileRow> for StoredFile {
    type Error = AppError;

    fn try_from(row: StoredFileRow) -> Result<Self, Self::Error> {
        Ok(StoredFile {
            id: row.id,
            stored_name: row.stored_name,
            original_name: row.original_name,
            size: from_db_size(row.size, "size")?,
            mime_type: row.mime_type,
            location: row.location,
            session_ref: row.session_ref,
            created_at: row.created_at,
        })
    }
}
