//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_core::Config;
use stowage_storage::{
    create_durable_store, create_local_stores, DurableStore, LocalFinalStore, LocalStaging,
};

/// Storage backends the upload service writes to.
pub struct Stores {
    pub staging: LocalStaging,
    pub final_store: LocalFinalStore,
    pub durable: Option<Arc<dyn DurableStore>>,
}

/// Create the upload directories and, when enabled, the durable object store.
pub async fn setup_storage(config: &Config) -> Result<Stores> {
    tracing::info!("Initializing upload storage...");
    let (staging, final_store) = create_local_stores(config)
        .await
        .context("Failed to prepare upload directories")?;
    tracing::info!(
        temp_dir = %staging.base_path().display(),
        final_dir = %final_store.base_path().display(),
        "Upload directories ready"
    );

    let durable = create_durable_store(config).context("Failed to create durable store")?;
    match &durable {
        Some(store) => tracing::info!(
            bucket = %store.bucket(),
            endpoint = ?config.durable_store_endpoint(),
            "Durable store enabled"
        ),
        None => tracing::info!("Durable store disabled"),
    }

    Ok(Stores {
        staging,
        final_store,
        durable,
    })
}
