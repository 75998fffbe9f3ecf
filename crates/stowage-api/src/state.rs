//! Application state shared by every handler.

use sqlx::PgPool;
use stowage_core::Config;
use stowage_services::UploadService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `None` when records are kept in memory.
    pub db_pool: Option<PgPool>,
    pub uploads: UploadService,
}
