//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use stowage_core::Config;

/// Validate critical configuration values
///
/// Runs the config's own checks, then the ones that only matter for serving HTTP.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.is_production() {
        if config.cors_origins().iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS configured to allow all origins (*) in production. \
                Please set specific allowed origins via CORS_ORIGINS environment variable."
            ));
        }
        if config.database_url().is_none() {
            tracing::warn!(
                "Production mode without DATABASE_URL - upload records will not survive a restart"
            );
        }
    }

    if config.http_concurrency_limit() == 0 {
        return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT cannot be 0"));
    }

    if config.request_timeout_secs() == 0 {
        return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECS cannot be 0"));
    }

    if config.db_timeout_seconds() == 0 {
        return Err(anyhow::anyhow!("Database timeout cannot be 0"));
    }

    Ok(())
}
