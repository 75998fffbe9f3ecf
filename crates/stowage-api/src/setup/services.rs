//! Service initialization and application state setup

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use stowage_core::Config;
use stowage_db::create_record_store;
use stowage_services::UploadService;

use super::storage::{setup_storage, Stores};
use crate::state::AppState;

/// Build the upload service over the configured record store and storage backends.
pub async fn initialize_services(config: &Config, pool: Option<PgPool>) -> Result<Arc<AppState>> {
    let Stores {
        staging,
        final_store,
        durable,
    } = setup_storage(config).await?;

    let records = create_record_store(pool.clone());
    let uploads = UploadService::new(
        records,
        Arc::new(staging),
        Arc::new(final_store),
        durable,
        config.max_file_size_bytes(),
    );

    tracing::info!(
        max_file_size_mb = config.max_file_size_bytes() / 1024 / 1024,
        "Upload service initialized"
    );

    Ok(Arc::new(AppState {
        config: config.clone(),
        db_pool: pool,
        uploads,
    }))
}
