//! Stowage API Library
//!
//! This crate provides the HTTP handlers and the application setup that wires the upload
//! service to its record store and storage backends.

// Module declarations
mod api_doc;
mod handlers;
mod telemetry;

// Public modules
pub mod constants;
pub mod error;
pub mod setup;
pub mod state;

// Re-exports
pub use api_doc::ApiDoc;
pub use error::ErrorResponse;
