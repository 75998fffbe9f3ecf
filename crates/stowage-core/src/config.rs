//! Configuration module
//!
//! Environment-driven configuration for the HTTP server, the record store, the staging
//! and final directories and the optional durable object store.

use std::env;
use std::path::PathBuf;

// Common constants
const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: u64 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 300;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const DEFAULT_DURABLE_BUCKET: &str = "uploads";
const DEFAULT_DURABLE_REGION: &str = "us-east-1";

/// Server-level configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub request_timeout_secs: u64,
    pub http_concurrency_limit: usize,
}

/// Upload service configuration
#[derive(Clone, Debug)]
pub struct StowageConfig {
    pub base: BaseConfig,
    /// When unset, upload records are kept in memory only.
    pub database_url: Option<String>,
    pub upload_temp_dir: PathBuf,
    pub upload_final_dir: PathBuf,
    pub max_file_size_bytes: u64,
    // Durable object store (S3-compatible: MinIO, AWS S3, ...)
    pub durable_store_enabled: bool,
    pub durable_store_bucket: String,
    pub durable_store_endpoint: Option<String>,
    pub durable_store_region: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            cors_origins: vec!["*".to_string()],
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            environment: "development".to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
        }
    }
}

impl Default for StowageConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig::default(),
            database_url: None,
            upload_temp_dir: PathBuf::from("./uploads/temp"),
            upload_final_dir: PathBuf::from("./uploads/files"),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            durable_store_enabled: false,
            durable_store_bucket: DEFAULT_DURABLE_BUCKET.to_string(),
            durable_store_endpoint: None,
            durable_store_region: DEFAULT_DURABLE_REGION.to_string(),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<StowageConfig>);

impl From<StowageConfig> for Config {
    fn from(config: StowageConfig) -> Self {
        Config(Box::new(config))
    }
}

impl Config {
    fn inner(&self) -> &StowageConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = StowageConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.inner().base.request_timeout_secs
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.inner().base.http_concurrency_limit
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn upload_temp_dir(&self) -> &PathBuf {
        &self.inner().upload_temp_dir
    }

    pub fn upload_final_dir(&self) -> &PathBuf {
        &self.inner().upload_final_dir
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.inner().max_file_size_bytes
    }

    pub fn durable_store_enabled(&self) -> bool {
        self.inner().durable_store_enabled
    }

    pub fn durable_store_bucket(&self) -> &str {
        &self.inner().durable_store_bucket
    }

    pub fn durable_store_endpoint(&self) -> Option<&str> {
        self.inner().durable_store_endpoint.as_deref()
    }

    pub fn durable_store_region(&self) -> &str {
        &self.inner().durable_store_region
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl StowageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("Invalid MAX_FILE_SIZE_MB: {}", e))?;

        let base = BaseConfig {
            server_port: env::var("PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT: {}", e))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid DB_MAX_CONNECTIONS: {}", e))?,
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid DB_TIMEOUT_SECONDS: {}", e))?,
            environment,
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            http_concurrency_limit: env::var("HTTP_CONCURRENCY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(HTTP_CONCURRENCY_LIMIT),
        };

        Ok(Self {
            base,
            database_url: env_non_empty("DATABASE_URL"),
            upload_temp_dir: env::var("UPLOAD_TEMP_DIR")
                .unwrap_or_else(|_| "./uploads/temp".to_string())
                .into(),
            upload_final_dir: env::var("UPLOAD_FINAL_DIR")
                .unwrap_or_else(|_| "./uploads/files".to_string())
                .into(),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            durable_store_enabled: env_flag("ENABLE_DURABLE_STORE"),
            durable_store_bucket: env::var("DURABLE_STORE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_DURABLE_BUCKET.to_string()),
            durable_store_endpoint: env_non_empty("DURABLE_STORE_ENDPOINT"),
            durable_store_region: env::var("DURABLE_STORE_REGION")
                .unwrap_or_else(|_| DEFAULT_DURABLE_REGION.to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.upload_temp_dir == self.upload_final_dir {
            return Err(anyhow::anyhow!(
                "UPLOAD_TEMP_DIR and UPLOAD_FINAL_DIR must be different directories"
            ));
        }

        if self.database_url.is_some() && self.base.db_max_connections == 0 {
            return Err(anyhow::anyhow!("Database max connections cannot be 0"));
        }

        if self.durable_store_enabled && self.durable_store_bucket.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "DURABLE_STORE_BUCKET must be set when ENABLE_DURABLE_STORE is true"
            ));
        }

        Ok(())
    }
}
