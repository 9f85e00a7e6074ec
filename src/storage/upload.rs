use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::Session;
use crate::storage::{normalize_path, FileStore};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAccess {
    /// Anyone, signed in or not.
    AllowAnon,
    Authenticated,
}

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_name: String,
    /// Rooted virtual path, e.g. `/artifacts/ab12.png`.
    pub file_path: String,
    pub public_url: String,
    pub content_length: u64,
}

/// A named upload area on a file store, with its size limit and read policy.
#[derive(Clone)]
pub struct UploadLocation {
    name: String,
    store: Arc<dyn FileStore>,
    public_base: String,
    max_file_bytes: u64,
    read_access: ReadAccess,
}

impl UploadLocation {
    pub fn new(name: &str, store: Arc<dyn FileStore>, public_base: &str, max_file_bytes: u64) -> Self {
        Self {
            name: name.trim_matches('/').to_string(),
            store,
            public_base: public_base.trim_end_matches('/').to_string(),
            max_file_bytes,
            read_access: ReadAccess::AllowAnon,
        }
    }

    pub fn with_read_access(mut self, read_access: ReadAccess) -> Self {
        self.read_access = read_access;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    pub fn can_read(&self, session: Option<&Session>) -> bool {
        match self.read_access {
            ReadAccess::AllowAnon => true,
            ReadAccess::Authenticated => session.is_some(),
        }
    }

    pub fn public_url(&self, file_path: &str) -> String {
        format!("{}/{}", self.public_base, file_path.trim_start_matches('/'))
    }

    fn virtual_path(&self, file_name: &str) -> AppResult<String> {
        normalize_path(&format!("{}/{}", self.name, file_name))
    }

    pub async fn exists(&self, file_name: &str) -> AppResult<bool> {
        let path = self.virtual_path(file_name)?;
        self.store.exists(&path).await
    }

    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> AppResult<StoredFile> {
        let len = bytes.len() as u64;
        if len > self.max_file_bytes {
            return Err(AppError::validation(
                "file",
                format!("{len} bytes exceeds the {} byte limit", self.max_file_bytes),
            ));
        }
        let path = self.virtual_path(file_name)?;
        self.store.write(&path, bytes).await?;
        info!(store = self.store.name(), %path, bytes = len, "stored upload");

        let file_path = format!("/{path}");
        Ok(StoredFile {
            file_name: file_name.to_string(),
            public_url: self.public_url(&file_path),
            file_path,
            content_length: len,
        })
    }

    pub async fn read(&self, session: Option<&Session>, file_path: &str) -> AppResult<Option<Vec<u8>>> {
        if !self.can_read(session) {
            return Err(AppError::Unauthenticated);
        }
        self.store.read(file_path).await
    }

    pub async fn remove(&self, file_path: &str) -> AppResult<bool> {
        self.store.delete(file_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFileStore;

    fn location(max: u64) -> UploadLocation {
        UploadLocation::new("artifacts", Arc::new(MemoryFileStore::new()), "https://cdn.diffusion.works/", max)
    }

    #[tokio::test]
    async fn test_upload_and_public_url() {
        let uploads = location(1024);
        let stored = uploads.upload("ab12.png", b"png-bytes").await.unwrap();
        assert_eq!(stored.file_path, "/artifacts/ab12.png");
        assert_eq!(stored.public_url, "https://cdn.diffusion.works/artifacts/ab12.png");
        assert_eq!(stored.content_length, 9);
        assert!(uploads.exists("ab12.png").await.unwrap());
        assert!(!uploads.exists("cd34.png").await.unwrap());
        assert_eq!(
            uploads.read(None, &stored.file_path).await.unwrap(),
            Some(b"png-bytes".to_vec())
        );
    }

    #[tokio::test]
    async fn test_upload_limit() {
        let uploads = location(4);
        let err = uploads.upload("big.png", b"12345").await.unwrap_err();
        assert_eq!(err.field_name(), Some("file"));
        assert!(uploads.upload("ok.png", b"1234").await.is_ok());
    }

    #[tokio::test]
    async fn test_authenticated_read_access() {
        let uploads = location(1024).with_read_access(ReadAccess::Authenticated);
        uploads.upload("a.png", b"x").await.unwrap();
        assert!(matches!(
            uploads.read(None, "/artifacts/a.png").await,
            Err(AppError::Unauthenticated)
        ));
        assert!(uploads
            .read(Some(&Session::new(1)), "/artifacts/a.png")
            .await
            .unwrap()
            .is_some());
    }
}
