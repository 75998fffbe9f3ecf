//! Stowage Storage Library
//!
//! This crate provides the storage abstractions used by the upload core and their
//! implementations:
//!
//! - [`ChunkSink`]: staging blobs that accept random-access range writes
//! - [`FinalStore`]: the final directory finalized files are promoted into
//! - [`DurableStore`]: an optional S3-compatible object store finalized files are pushed to
//!
//! Local names must not contain `..`, path separators or a leading `/`. Locations handed
//! back by a store are only accepted again by the same store.

pub mod factory;
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_durable_store, create_local_stores};
pub use local::{move_file, LocalFinalStore, LocalStaging};
#[cfg(feature = "storage-s3")]
pub use s3::S3DurableStore;
pub use traits::{
    BoxedReader, ChunkSink, DurableStore, FinalStore, StorageError, StorageResult,
};
