//! Single-request uploads that skip the session state machine.

use stowage_core::naming::generate_stored_name;
use stowage_core::{AppError, StoredFile};
use stowage_storage::BoxedReader;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::upload::UploadService;
use crate::UPLOAD_LOG_TARGET;

impl UploadService {
    /// Stream `reader` straight into the final directory and record it as a stored file.
    ///
    /// The stored file references a fresh id that belongs to no upload session. On any
    /// failure, including a stream whose length differs from `size`, the partial file is
    /// removed and no record is created.
    #[tracing::instrument(skip(self, reader), fields(upload.size = size))]
    pub async fn direct_upload(
        &self,
        original_name: &str,
        size: u64,
        mime_type: &str,
        reader: BoxedReader,
    ) -> Result<StoredFile, AppError> {
        self.check_size_limit(size)?;
        let start = std::time::Instant::now();

        let stored_name = generate_stored_name(original_name);
        // One byte past the declared size is enough to detect an oversized stream.
        let limited: BoxedReader = Box::pin(reader.take(size.saturating_add(1)));

        let (location, written) = self
            .final_store
            .write_new(&stored_name, limited)
            .await
            .map_err(|e| {
                tracing::error!(
                    target: UPLOAD_LOG_TARGET,
                    stored_name = %stored_name,
                    error = %e,
                    "Direct upload write failed"
                );
                AppError::DirectUploadFailed(e.to_string())
            })?;

        if written != size {
            self.discard(&location).await;
            return Err(AppError::DirectUploadFailed(format!(
                "Expected {} bytes, received {}{}",
                size,
                written,
                if written > size { " or more" } else { "" }
            )));
        }

        let file = StoredFile::new(
            stored_name,
            original_name.to_string(),
            size,
            mime_type.to_string(),
            location,
            Uuid::new_v4(),
        );

        if let Err(e) = self.records.create_file(&file).await {
            self.discard(&file.location).await;
            return Err(AppError::DirectUploadFailed(e.to_string()));
        }

        tracing::info!(
            target: UPLOAD_LOG_TARGET,
            file_id = %file.id,
            original_name = %file.original_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Direct upload stored"
        );

        Ok(file)
    }

    async fn discard(&self, location: &str) {
        if let Err(e) = self.final_store.remove(location).await {
            tracing::warn!(
                target: UPLOAD_LOG_TARGET,
                location = %location,
                error = %e,
                "Failed to remove partial direct upload"
            );
        }
    }
}
