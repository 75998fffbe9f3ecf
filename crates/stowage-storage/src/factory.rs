#[cfg(feature = "storage-s3")]
use crate::S3DurableStore;
use crate::{DurableStore, LocalFinalStore, LocalStaging, StorageResult};
#[cfg(not(feature = "storage-s3"))]
use crate::StorageError;
use std::sync::Arc;
use stowage_core::Config;

/// Create the staging area and the final directory configured for this process.
pub async fn create_local_stores(config: &Config) -> StorageResult<(LocalStaging, LocalFinalStore)> {
    let staging = LocalStaging::new(config.upload_temp_dir().clone()).await?;
    let final_store = LocalFinalStore::new(config.upload_final_dir().clone()).await?;
    Ok((staging, final_store))
}

/// Create the durable object store, if enabled by configuration.
pub fn create_durable_store(config: &Config) -> StorageResult<Option<Arc<dyn DurableStore>>> {
    if !config.durable_store_enabled() {
        return Ok(None);
    }

    #[cfg(feature = "storage-s3")]
    {
        let store = S3DurableStore::new(
            config.durable_store_bucket().to_string(),
            config.durable_store_region().to_string(),
            config.durable_store_endpoint().map(String::from),
        )?;
        Ok(Some(Arc::new(store)))
    }

    #[cfg(not(feature = "storage-s3"))]
    {
        Err(StorageError::ConfigError(
            "Durable store not available (storage-s3 feature not enabled)".to_string(),
        ))
    }
}
