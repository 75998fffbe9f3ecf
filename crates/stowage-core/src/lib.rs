//! Stowage Core Library
//!
//! This crate provides the domain models, error types, configuration and byte-range
//! parsing shared by every Stowage component.

pub mod config;
pub mod error;
pub mod models;
pub mod naming;
pub mod range;

// Re-export commonly used types
pub use config::{BaseConfig, Config, StowageConfig};
pub use error::{AppError, ErrorClass, ErrorMetadata, LogLevel};
pub use models::{StoredFile, UploadSession, UploadStatus};
pub use range::ByteRange;
