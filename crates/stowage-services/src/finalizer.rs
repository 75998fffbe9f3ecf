use std::collections::HashMap;
use std::sync::Arc;

use stowage_core::{AppError, StoredFile, UploadSession};
use stowage_db::UploadRecordStore;
use stowage_storage::{DurableStore, FinalStore};

use crate::upload::{fail_session, persistence_error};
use crate::UPLOAD_LOG_TARGET;

/// Promotes completed staging blobs to the final directory and, when configured, to the
/// durable object store.
///
/// Order of effects: move, persist the stored file, push to the durable store, mark the
/// session completed. Any failure marks the session failed. A failed durable push leaves
/// the stored file record in place with the session failed.
///
/// If only the final status update is lost, the session stays active with its stored file
/// already recorded; the next commit finds that file and just marks the session completed.
#[derive(Clone)]
pub struct Finalizer {
    records: Arc<dyn UploadRecordStore>,
    final_store: Arc<dyn FinalStore>,
    durable: Option<Arc<dyn DurableStore>>,
}

impl Finalizer {
    pub fn new(
        records: Arc<dyn UploadRecordStore>,
        final_store: Arc<dyn FinalStore>,
        durable: Option<Arc<dyn DurableStore>>,
    ) -> Self {
        Self {
            records,
            final_store,
            durable,
        }
    }

    /// Commit a session whose bytes are all staged. The caller holds the session lock.
    pub async fn commit(&self, session: &mut UploadSession) -> Result<StoredFile, AppError> {
        let start = std::time::Instant::now();

        let existing = self
            .records
            .find_file_by_session(session.id)
            .await
            .map_err(persistence_error)?;
        if let Some(file) = existing {
            tracing::warn!(
                target: UPLOAD_LOG_TARGET,
                session_id = %session.id,
                file_id = %file.id,
                "Stored file already recorded, completing session"
            );
            return self.complete(session, file, start).await;
        }

        let location = match self
            .final_store
            .promote(&session.staging_location, &session.staged_name)
            .await
        {
            Ok(location) => location,
            Err(e) => {
                let err = AppError::FinalizeMoveFailed(e.to_string());
                return Err(fail_session(self.records.as_ref(), session, err).await);
            }
        };

        let file = StoredFile::new(
            session.staged_name.clone(),
            session.original_name.clone(),
            session.total_size,
            session.mime_type.clone(),
            location,
            session.id,
        );

        if let Err(e) = self.records.create_file(&file).await {
            let err = AppError::PersistenceFailed(e.to_string());
            return Err(fail_session(self.records.as_ref(), session, err).await);
        }

        if let Some(durable) = &self.durable {
            if let Err(err) = self.push_durable(durable.as_ref(), session, &file).await {
                return Err(fail_session(self.records.as_ref(), session, err).await);
            }
        }

        self.complete(session, file, start).await
    }

    async fn complete(
        &self,
        session: &mut UploadSession,
        file: StoredFile,
        start: std::time::Instant,
    ) -> Result<StoredFile, AppError> {
        session.mark_completed();
        self.records
            .update_session(session)
            .await
            .map_err(persistence_error)?;

        tracing::info!(
            target: UPLOAD_LOG_TARGET,
            session_id = %session.id,
            file_id = %file.id,
            size_bytes = file.size,
            durable = self.durable.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload finalized"
        );

        Ok(file)
    }

    async fn push_durable(
        &self,
        durable: &dyn DurableStore,
        session: &UploadSession,
        file: &StoredFile,
    ) -> Result<(), AppError> {
        let reader = self
            .final_store
            .open(&file.location)
            .await
            .map_err(|e| AppError::DurableSyncFailed(e.to_string()))?;

        let metadata = HashMap::from([
            ("original_name".to_string(), session.original_name.clone()),
            ("session_id".to_string(), session.id.to_string()),
        ]);

        durable
            .put(
                &file.stored_name,
                reader,
                file.size,
                &file.mime_type,
                &metadata,
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    target: UPLOAD_LOG_TARGET,
                    session_id = %session.id,
                    bucket = %durable.bucket(),
                    error = %e,
                    "Durable store push failed"
                );
                AppError::DurableSyncFailed(e.to_string())
            })
    }
}
