//! Test helpers: build an UploadService over temp directories, plus failure-injecting fakes.
//!
//! Run from workspace root: `cargo test -p stowage-services`.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stowage_core::{AppError, ByteRange, StoredFile, UploadSession};
use stowage_db::{InMemoryUploadRepository, UploadRecordStore};
use stowage_services::UploadService;
use stowage_storage::{
    BoxedReader, DurableStore, FinalStore, LocalFinalStore, LocalStaging, StorageError,
    StorageResult,
};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

pub const MAX_FILE_SIZE: u64 = 1024;

/// Test service with the record store and directories it writes to.
pub struct TestContext {
    pub service: UploadService,
    pub records: Arc<FlakyRecordStore>,
    pub staging_dir: PathBuf,
    pub final_dir: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestContext {
    pub fn file_names(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .expect("Failed to read directory")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    pub fn staged_files(&self) -> Vec<String> {
        Self::file_names(&self.staging_dir)
    }

    pub fn final_files(&self) -> Vec<String> {
        Self::file_names(&self.final_dir)
    }
}

pub async fn setup() -> TestContext {
    setup_with(None, None).await
}

pub async fn setup_with_durable(durable: Arc<dyn DurableStore>) -> TestContext {
    setup_with(Some(durable), None).await
}

/// Build a service over fresh temp directories. `final_store` replaces the local final
/// directory store when given.
pub async fn setup_with(
    durable: Option<Arc<dyn DurableStore>>,
    final_store: Option<Arc<dyn FinalStore>>,
) -> TestContext {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let staging_dir = temp_dir.path().join("temp");
    let final_dir = temp_dir.path().join("files");

    let staging = LocalStaging::new(&staging_dir)
        .await
        .expect("Failed to create staging area");
    let local_final: Arc<dyn FinalStore> = Arc::new(
        LocalFinalStore::new(&final_dir)
            .await
            .expect("Failed to create final store"),
    );
    let records = Arc::new(FlakyRecordStore::default());

    let service = UploadService::new(
        records.clone(),
        Arc::new(staging),
        final_store.unwrap_or(local_final),
        durable,
        MAX_FILE_SIZE,
    );

    TestContext {
        service,
        records,
        staging_dir,
        final_dir,
        _temp_dir: temp_dir,
    }
}

pub fn body(data: &[u8]) -> BoxedReader {
    Box::pin(Cursor::new(data.to_vec()))
}

pub fn range(value: &str) -> ByteRange {
    value.parse().expect("Invalid test range")
}

/// In-memory record store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyRecordStore {
    pub inner: InMemoryUploadRepository,
    pub fail_create_session: AtomicBool,
    pub fail_create_file: AtomicBool,
    pub fail_update_session: AtomicBool,
}

#[async_trait]
impl UploadRecordStore for FlakyRecordStore {
    async fn create_session(&self, session: &UploadSession) -> Result<(), AppError> {
        if self.fail_create_session.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected create_session failure".into()));
        }
        self.inner.create_session(session).await
    }

    async fn get_session(&self, id: uuid::Uuid) -> Result<UploadSession, AppError> {
        self.inner.get_session(id).await
    }

    async fn update_session(&self, session: &UploadSession) -> Result<(), AppError> {
        if self.fail_update_session.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected update_session failure".into()));
        }
        self.inner.update_session(session).await
    }

    async fn create_file(&self, file: &StoredFile) -> Result<(), AppError> {
        if self.fail_create_file.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected create_file failure".into()));
        }
        self.inner.create_file(file).await
    }

    async fn get_file(&self, id: uuid::Uuid) -> Result<StoredFile, AppError> {
        self.inner.get_file(id).await
    }

    async fn find_file_by_session(
        &self,
        session_id: uuid::Uuid,
    ) -> Result<Option<StoredFile>, AppError> {
        self.inner.find_file_by_session(session_id).await
    }
}

/// A recorded durable-store push.
#[derive(Debug, Clone)]
pub struct DurablePut {
    pub key: String,
    pub data: Vec<u8>,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Durable store that keeps pushes in memory, or fails every push.
#[derive(Default)]
pub struct MemoryDurableStore {
    pub puts: Mutex<Vec<DurablePut>>,
    pub fail: bool,
}

impl MemoryDurableStore {
    pub fn failing() -> Self {
        Self {
            puts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn puts(&self) -> Vec<DurablePut> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn put(
        &self,
        key: &str,
        mut reader: BoxedReader,
        _size: u64,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<()> {
        if self.fail {
            return Err(StorageError::UploadFailed("injected durable failure".into()));
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.puts.lock().unwrap().push(DurablePut {
            key: key.to_string(),
            data,
            content_type: content_type.to_string(),
            metadata: metadata.clone(),
        });
        Ok(())
    }

    fn bucket(&self) -> &str {
        "test-bucket"
    }
}

/// Final store whose promote always fails.
pub struct UnmovableFinalStore;

#[async_trait]
impl FinalStore for UnmovableFinalStore {
    async fn promote(&self, staging_location: &str, _name: &str) -> StorageResult<String> {
        Err(StorageError::MoveFailed(format!(
            "injected move failure for {}",
            staging_location
        )))
    }

    async fn write_new(&self, name: &str, _reader: BoxedReader) -> StorageResult<(String, u64)> {
        Err(StorageError::WriteFailed(format!("injected write failure for {}", name)))
    }

    async fn open(&self, location: &str) -> StorageResult<BoxedReader> {
        Err(StorageError::NotFound(location.to_string()))
    }

    async fn remove(&self, _location: &str) -> StorageResult<()> {
        Ok(())
    }
}
