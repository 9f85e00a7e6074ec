//! Pluggable file storage for generated artifacts.

pub mod bucket;
pub mod local;
pub mod upload;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::utils::error::{AppError, AppResult};

pub use bucket::BucketFileStore;
pub use local::LocalFileStore;
pub use upload::{ReadAccess, StoredFile, UploadLocation};

/// Virtual paths are `/`-separated and relative to the store root.
#[async_trait]
pub trait FileStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write(&self, path: &str, bytes: &[u8]) -> AppResult<()>;

    /// `None` when nothing is stored under `path`.
    async fn read(&self, path: &str) -> AppResult<Option<Vec<u8>>>;

    /// Returns whether a file was removed.
    async fn delete(&self, path: &str) -> AppResult<bool>;

    async fn exists(&self, path: &str) -> AppResult<bool> {
        Ok(self.read(path).await?.is_some())
    }
}

/// Reject anything that could escape the store root.
pub(crate) fn normalize_path(path: &str) -> AppResult<String> {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    if parts.is_empty() || parts.iter().any(|p| *p == ".." || p.contains('\\')) {
        return Err(AppError::validation("path", format!("illegal file path '{path}'")));
    }
    Ok(parts.join("/"))
}

/// Keeps files in a map; for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> AppResult<()> {
        let path = normalize_path(path)?;
        let mut files = self
            .files
            .lock()
            .map_err(|_| AppError::storage("memory store lock poisoned"))?;
        files.insert(path, bytes.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> AppResult<Option<Vec<u8>>> {
        let path = normalize_path(path)?;
        let files = self
            .files
            .lock()
            .map_err(|_| AppError::storage("memory store lock poisoned"))?;
        Ok(files.get(&path).cloned())
    }

    async fn delete(&self, path: &str) -> AppResult<bool> {
        let path = normalize_path(path)?;
        let mut files = self
            .files
            .lock()
            .map_err(|_| AppError::storage("memory store lock poisoned"))?;
        Ok(files.remove(&path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/artifacts//a.png").unwrap(), "artifacts/a.png");
        assert_eq!(normalize_path("./artifacts/a.png").unwrap(), "artifacts/a.png");
        assert!(normalize_path("artifacts/../secret").is_err());
        assert!(normalize_path("/").is_err());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryFileStore::new();
        store.write("/artifacts/a.png", b"png").await.unwrap();
        assert!(store.exists("artifacts/a.png").await.unwrap());
        assert_eq!(store.read("artifacts/a.png").await.unwrap(), Some(b"png".to_vec()));
        assert!(store.delete("artifacts/a.png").await.unwrap());
        assert!(!store.delete("artifacts/a.png").await.unwrap());
        assert!(store.is_empty());
    }
}
