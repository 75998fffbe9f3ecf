use std::collections::HashMap;
use std::sync::Arc;
use stowage_core::{AppError, StoredFile, UploadSession};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::upload::UploadRecordStore;

/// In-memory record store. Records live as long as the process.
#[derive(Clone, Default)]
pub struct InMemoryUploadRepository {
    sessions: Arc<RwLock<HashMap<Uuid, UploadSession>>>,
    files: Arc<RwLock<HashMap<Uuid, StoredFile>>>,
}

impl InMemoryUploadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn file_count(&self) -> usize {
        self.files.read().await.len()
    }

    /// All stored files created from the given session.
    pub async fn files_for_session(&self, session_id: Uuid) -> Vec<StoredFile> {
        self.files
            .read()
            .await
            .values()
            .filter(|f| f.session_ref == session_id)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl UploadRecordStore for InMemoryUploadRepository {
    async fn create_session(&self, session: &UploadSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(AppError::PersistenceFailed(format!(
                "Upload session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<UploadSession, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Upload session {} not found", id)))
    }

    async fn update_session(&self, session: &UploadSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing)
                if existing.status.is_terminal()
                    || existing.uploaded_size > session.uploaded_size =>
            {
                Err(AppError::StaleSessionUpdate(session.id))
            }
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "Upload session {} not found",
                session.id
            ))),
        }
    }

    async fn create_file(&self, file: &StoredFile) -> Result<(), AppError> {
        let mut files = self.files.write().await;
        if files.contains_key(&file.id) {
            return Err(AppError::PersistenceFailed(format!(
                "File {} already exists",
                file.id
            )));
        }
        files.insert(file.id, file.clone());
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<StoredFile, AppError> {
        self.files
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    async fn find_file_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<StoredFile>, AppError> {
        Ok(self
            .files
            .read()
            .await
            .values()
            .filter(|f| f.session_ref == session_id)
            .min_by_key(|f| f.created_at)
            .cloned())
    }
}
