//! Resumable chunked-upload state machine
//!
//! A session moves `pending → uploading → completed | failed`. Chunks are addressed by
//! inclusive byte ranges and may re-send bytes below the contiguous frontier
//! (`uploaded_size`) but never skip past it. All work on one session runs under that
//! session's lock, so validation, the staging write and the record update cannot
//! interleave with another chunk write or a finalize.

use std::sync::Arc;

use stowage_core::naming::generate_stored_name;
use stowage_core::{AppError, ByteRange, StoredFile, UploadSession};
use stowage_db::UploadRecordStore;
use stowage_storage::{ChunkSink, DurableStore, FinalStore};
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::finalizer::Finalizer;
use crate::locks::SessionLocks;
use crate::UPLOAD_LOG_TARGET;

/// Mark `session` failed, persist it, and hand back `err`.
///
/// A failure to persist the failed state is logged; the original error wins.
pub(crate) async fn fail_session(
    records: &dyn UploadRecordStore,
    session: &mut UploadSession,
    err: AppError,
) -> AppError {
    session.mark_failed();
    if let Err(persist_err) = records.update_session(session).await {
        tracing::error!(
            target: UPLOAD_LOG_TARGET,
            session_id = %session.id,
            error = %persist_err,
            "Failed to persist failed upload state"
        );
    }
    tracing::error!(
        target: UPLOAD_LOG_TARGET,
        session_id = %session.id,
        error = %err,
        "Upload session failed"
    );
    err
}

/// Record-store failures surface as `PersistenceFailed`, except a rejected stale write,
/// which the caller resolves by re-reading the session.
pub(crate) fn persistence_error(err: AppError) -> AppError {
    match err {
        AppError::StaleSessionUpdate(_) => err,
        other => AppError::PersistenceFailed(other.to_string()),
    }
}

/// Upload service: open, chunk, finalize and inspect upload sessions
#[derive(Clone)]
pub struct UploadService {
    pub(crate) records: Arc<dyn UploadRecordStore>,
    staging: Arc<dyn ChunkSink>,
    pub(crate) final_store: Arc<dyn FinalStore>,
    finalizer: Finalizer,
    locks: SessionLocks,
    pub(crate) max_file_size: u64,
}

impl UploadService {
    /// Create a new UploadService
    ///
    /// `durable` is the optional secondary object store finalized files are pushed to.
    pub fn new(
        records: Arc<dyn UploadRecordStore>,
        staging: Arc<dyn ChunkSink>,
        final_store: Arc<dyn FinalStore>,
        durable: Option<Arc<dyn DurableStore>>,
        max_file_size: u64,
    ) -> Self {
        let finalizer = Finalizer::new(records.clone(), final_store.clone(), durable);
        Self {
            records,
            staging,
            final_store,
            finalizer,
            locks: SessionLocks::new(),
            max_file_size,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub(crate) fn check_size_limit(&self, size: u64) -> Result<(), AppError> {
        if size > self.max_file_size {
            return Err(AppError::SizeLimitExceeded {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Open a new upload session and allocate its staging blob.
    ///
    /// Nothing is left behind on failure: a blob whose record cannot be persisted is removed.
    #[tracing::instrument(skip(self), fields(upload.total_size = total_size))]
    pub async fn open(
        &self,
        original_name: &str,
        total_size: u64,
        mime_type: &str,
    ) -> Result<UploadSession, AppError> {
        if total_size == 0 {
            return Err(AppError::InvalidInput(
                "File size must be at least 1 byte".to_string(),
            ));
        }
        self.check_size_limit(total_size)?;

        let staged_name = generate_stored_name(original_name);
        let location = self
            .staging
            .allocate(&staged_name, total_size)
            .await
            .map_err(|e| {
                tracing::error!(
                    target: UPLOAD_LOG_TARGET,
                    staged_name = %staged_name,
                    error = %e,
                    "Failed to allocate staging file"
                );
                AppError::StagingAllocationFailed(e.to_string())
            })?;

        let session = UploadSession::new(
            original_name.to_string(),
            staged_name,
            total_size,
            mime_type.to_string(),
            location,
        );

        if let Err(e) = self.records.create_session(&session).await {
            if let Err(cleanup_err) = self.staging.remove(&session.staging_location).await {
                tracing::warn!(
                    target: UPLOAD_LOG_TARGET,
                    location = %session.staging_location,
                    error = %cleanup_err,
                    "Failed to remove staging file after persistence failure"
                );
            }
            tracing::error!(
                target: UPLOAD_LOG_TARGET,
                session_id = %session.id,
                error = %e,
                "Failed to persist upload session"
            );
            return Err(AppError::PersistenceFailed(e.to_string()));
        }

        tracing::info!(
            target: UPLOAD_LOG_TARGET,
            session_id = %session.id,
            original_name = %session.original_name,
            size_bytes = total_size,
            "Upload session opened"
        );

        Ok(session)
    }

    /// Write one chunk into a session's staging blob.
    ///
    /// `reader` must yield exactly `range.len()` bytes. A short or long stream fails the
    /// session, as does any staging I/O error. If the new frontier cannot be recorded the
    /// session keeps its previous state and the chunk can be resent.
    #[tracing::instrument(skip(self, reader), fields(upload.start = range.start, upload.end = range.end))]
    pub async fn write_chunk<R>(
        &self,
        session_id: Uuid,
        range: ByteRange,
        mut reader: R,
    ) -> Result<UploadSession, AppError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let _guard = self.locks.acquire(session_id).await;
        let start = std::time::Instant::now();

        let mut session = self.records.get_session(session_id).await?;
        session.ensure_active()?;

        if range.total != session.total_size {
            return Err(AppError::TotalSizeMismatch {
                declared: range.total,
                expected: session.total_size,
            });
        }

        if range.start > session.uploaded_size {
            tracing::warn!(
                target: UPLOAD_LOG_TARGET,
                session_id = %session_id,
                start = range.start,
                uploaded_size = session.uploaded_size,
                "Rejected out-of-order chunk"
            );
            return Err(AppError::OutOfOrderChunk {
                start: range.start,
                uploaded: session.uploaded_size,
            });
        }

        let expected = range.len();
        let written = match self
            .staging
            .write_at(&session.staging_location, range.start, &mut reader, expected)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                let err = AppError::ChunkWriteFailed(e.to_string());
                return Err(fail_session(self.records.as_ref(), &mut session, err).await);
            }
        };

        if written != expected {
            let err = AppError::ChunkSizeMismatch {
                expected,
                actual: written,
            };
            return Err(fail_session(self.records.as_ref(), &mut session, err).await);
        }

        // Anything left in the stream means the client sent more than the range declared.
        let trailing = match tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
            Ok(trailing) => trailing,
            Err(e) => {
                let err = AppError::ChunkWriteFailed(e.to_string());
                return Err(fail_session(self.records.as_ref(), &mut session, err).await);
            }
        };
        if trailing > 0 {
            let err = AppError::ChunkSizeMismatch {
                expected,
                actual: written + trailing,
            };
            return Err(fail_session(self.records.as_ref(), &mut session, err).await);
        }

        session.record_chunk(range.end_exclusive());
        self.records
            .update_session(&session)
            .await
            .map_err(persistence_error)?;

        tracing::info!(
            target: UPLOAD_LOG_TARGET,
            session_id = %session_id,
            start = range.start,
            end = range.end,
            uploaded_size = session.uploaded_size,
            total_size = session.total_size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chunk accepted"
        );

        Ok(session)
    }

    /// Promote a fully uploaded session to a stored file.
    #[tracing::instrument(skip(self))]
    pub async fn finalize(&self, session_id: Uuid) -> Result<StoredFile, AppError> {
        let _guard = self.locks.acquire(session_id).await;

        let mut session = self.records.get_session(session_id).await?;
        session.ensure_active()?;

        if !session.is_complete() {
            return Err(AppError::UploadIncomplete {
                uploaded: session.uploaded_size,
                total: session.total_size,
            });
        }

        self.finalizer.commit(&mut session).await
    }

    /// Current state of a session.
    pub async fn status(&self, session_id: Uuid) -> Result<UploadSession, AppError> {
        self.records.get_session(session_id).await
    }

    pub async fn get_file(&self, file_id: Uuid) -> Result<StoredFile, AppError> {
        self.records.get_file(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use stowage_core::UploadStatus;
    use stowage_db::InMemoryUploadRepository;
    use stowage_storage::{BoxedReader, LocalFinalStore, LocalStaging};
    use tempfile::TempDir;

    async fn service(max: u64) -> (UploadService, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let staging = LocalStaging::new(dir.path().join("temp")).await.unwrap();
        let final_store = LocalFinalStore::new(dir.path().join("files")).await.unwrap();
        let service = UploadService::new(
            Arc::new(InMemoryUploadRepository::new()),
            Arc::new(staging),
            Arc::new(final_store),
            None,
            max,
        );
        (service, dir)
    }

    fn body(data: &[u8]) -> BoxedReader {
        Box::pin(Cursor::new(data.to_vec()))
    }

    #[tokio::test]
    async fn test_open_rejects_zero_size() {
        let (service, _dir) = service(100).await;
        let result = service.open("a.txt", 0, "text/plain").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_open_allocates_staging_blob() {
        let (service, _dir) = service(100).await;
        let session = service.open("a.txt", 8, "text/plain").await.unwrap();
        let meta = std::fs::metadata(&session.staging_location).unwrap();
        assert_eq!(meta.len(), 8);
        assert_eq!(session.status, UploadStatus::Pending);
    }

    #[tokio::test]
    async fn test_trailing_bytes_fail_session() {
        let (service, _dir) = service(100).await;
        let session = service.open("a.txt", 4, "text/plain").await.unwrap();
        let range: ByteRange = "bytes 0-1/4".parse().unwrap();

        let result = service.write_chunk(session.id, range, body(b"abc")).await;
        assert!(matches!(
            result,
            Err(AppError::ChunkSizeMismatch {
                expected: 2,
                actual: 3
            })
        ));
        let after = service.status(session.id).await.unwrap();
        assert_eq!(after.status, UploadStatus::Failed);
        assert_eq!(after.uploaded_size, 0);
    }
}
