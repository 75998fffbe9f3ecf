use crate::traits::{BoxedReader, ChunkSink, FinalStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Resolve a server-generated file name inside `base_path`.
fn name_to_path(base_path: &Path, name: &str) -> StorageResult<PathBuf> {
    if name.is_empty()
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.starts_with('.')
    {
        return Err(StorageError::InvalidKey(format!(
            "File name '{}' contains invalid characters",
            name
        )));
    }
    Ok(base_path.join(name))
}

/// Accept a location only if it names a file directly inside `base_path`.
fn location_to_path(base_path: &Path, location: &str) -> StorageResult<PathBuf> {
    let path = PathBuf::from(location);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidKey(format!("Invalid location '{}'", location)))?;
    if path.parent() != Some(base_path) {
        return Err(StorageError::InvalidKey(format!(
            "Location '{}' resolves outside storage directory",
            location
        )));
    }
    name_to_path(base_path, name)
}

async fn ensure_dir(path: &Path) -> StorageResult<()> {
    fs::create_dir_all(path).await.map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to create storage directory {}: {}",
            path.display(),
            e
        ))
    })
}

async fn remove_if_exists(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::DeleteFailed(format!(
            "Failed to delete file {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Move `from` to `to`: rename, falling back to copy + fsync + delete when the rename
/// is refused (e.g. across filesystems).
pub async fn move_file(from: &Path, to: &Path) -> StorageResult<()> {
    let rename_err = match fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    tracing::debug!(
        from = %from.display(),
        to = %to.display(),
        error = %rename_err,
        "Rename failed, falling back to copy"
    );

    let copy_result = async {
        fs::copy(from, to).await?;
        fs::File::open(to).await?.sync_all().await
    }
    .await;

    if let Err(e) = copy_result {
        let _ = remove_if_exists(to).await;
        return Err(StorageError::MoveFailed(format!(
            "Failed to move {} to {}: {}",
            from.display(),
            to.display(),
            e
        )));
    }

    fs::remove_file(from).await.map_err(|e| {
        StorageError::MoveFailed(format!(
            "Copied {} but failed to remove source: {}",
            from.display(),
            e
        ))
    })
}

/// Local filesystem staging area
#[derive(Clone)]
pub struct LocalStaging {
    base_path: PathBuf,
}

impl LocalStaging {
    /// Create the staging area, creating `base_path` if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        ensure_dir(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl ChunkSink for LocalStaging {
    async fn allocate(&self, name: &str, size: u64) -> StorageResult<String> {
        let path = name_to_path(&self.base_path, name)?;

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::AllocationFailed(format!(
                    "Failed to create staging file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        if let Err(e) = file.set_len(size).await {
            drop(file);
            let _ = remove_if_exists(&path).await;
            return Err(StorageError::AllocationFailed(format!(
                "Failed to size staging file {} to {} bytes: {}",
                path.display(),
                size,
                e
            )));
        }

        tracing::debug!(path = %path.display(), size_bytes = size, "Staging file allocated");

        Ok(path.to_string_lossy().into_owned())
    }

    async fn write_at(
        &self,
        location: &str,
        offset: u64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        max_len: u64,
    ) -> StorageResult<u64> {
        let path = location_to_path(&self.base_path, location)?;
        let start = std::time::Instant::now();

        let mut file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to open staging file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        file.seek(SeekFrom::Start(offset)).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to seek to {} in {}: {}",
                offset,
                path.display(),
                e
            ))
        })?;

        let mut limited = reader.take(max_len);
        let written = tokio::io::copy(&mut limited, &mut file)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to write chunk to {}: {}",
                    path.display(),
                    e
                ))
            })?;

        file.flush().await?;
        file.sync_data().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            offset = offset,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chunk written to staging file"
        );

        Ok(written)
    }

    async fn remove(&self, location: &str) -> StorageResult<()> {
        let path = location_to_path(&self.base_path, location)?;
        if remove_if_exists(&path).await? {
            tracing::debug!(path = %path.display(), "Staging file removed");
        }
        Ok(())
    }
}

/// Local filesystem final directory
#[derive(Clone)]
pub struct LocalFinalStore {
    base_path: PathBuf,
}

impl LocalFinalStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        ensure_dir(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl FinalStore for LocalFinalStore {
    async fn promote(&self, staging_location: &str, name: &str) -> StorageResult<String> {
        let from = PathBuf::from(staging_location);
        let to = name_to_path(&self.base_path, name)?;
        let start = std::time::Instant::now();

        move_file(&from, &to).await?;

        tracing::info!(
            from = %from.display(),
            to = %to.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File promoted to final directory"
        );

        Ok(to.to_string_lossy().into_owned())
    }

    async fn write_new(
        &self,
        name: &str,
        mut reader: BoxedReader,
    ) -> StorageResult<(String, u64)> {
        let path = name_to_path(&self.base_path, name)?;
        let start = std::time::Instant::now();

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let result = async {
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                let _ = remove_if_exists(&path).await;
                return Err(StorageError::WriteFailed(format!(
                    "Failed to write stream to file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            path = %path.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local file write successful"
        );

        Ok((path.to_string_lossy().into_owned(), written))
    }

    async fn open(&self, location: &str) -> StorageResult<BoxedReader> {
        let path = location_to_path(&self.base_path, location)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn remove(&self, location: &str) -> StorageResult<()> {
        let path = location_to_path(&self.base_path, location)?;
        if remove_if_exists(&path).await? {
            tracing::info!(path = %path.display(), "Final file removed");
        }
        Ok(())
    }
}
