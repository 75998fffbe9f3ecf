//! Storage abstraction traits
//!
//! The upload core talks to storage only through these traits, so staging, final and
//! durable backends can be swapped (or faked in tests) independently.

use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Owned async byte stream handed to storage backends.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Move failed: {0}")]
    MoveFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Staging area for in-progress uploads.
///
/// Blobs are allocated at their declared size and then written at arbitrary,
/// non-sequential offsets. Writes never truncate already-written regions.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Allocate a zero-filled staging blob of `size` bytes named `name`.
    /// Returns the blob's location.
    async fn allocate(&self, name: &str, size: u64) -> StorageResult<String>;

    /// Write at most `max_len` bytes from `reader` at absolute `offset`.
    ///
    /// Returns the exact number of bytes transferred; a short stream yields a smaller
    /// count rather than an error. Bytes past `max_len` are left unread in `reader`.
    async fn write_at(
        &self,
        location: &str,
        offset: u64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        max_len: u64,
    ) -> StorageResult<u64>;

    /// Remove a staging blob. Removing a missing blob is not an error.
    async fn remove(&self, location: &str) -> StorageResult<()>;
}

/// Final location of finalized files.
#[async_trait]
pub trait FinalStore: Send + Sync {
    /// Move a fully written staging blob to the final area under `name`.
    /// Returns the final location.
    async fn promote(&self, staging_location: &str, name: &str) -> StorageResult<String>;

    /// Stream `reader` to end of input into a new file `name`.
    /// Returns the final location and the number of bytes written.
    async fn write_new(&self, name: &str, reader: BoxedReader) -> StorageResult<(String, u64)>;

    /// Open a finalized file for reading.
    async fn open(&self, location: &str) -> StorageResult<BoxedReader>;

    /// Remove a finalized file. Removing a missing file is not an error.
    async fn remove(&self, location: &str) -> StorageResult<()>;
}

/// Secondary durable object store finalized files are pushed to.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store `size` bytes from `reader` under `key`, tagged with `content_type` and
    /// user `metadata`.
    async fn put(
        &self,
        key: &str,
        reader: BoxedReader,
        size: u64,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<()>;

    /// Bucket the store writes into.
    fn bucket(&self) -> &str;
}
