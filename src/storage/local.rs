use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::storage::{normalize_path, FileStore};
use crate::utils::error::AppResult;

/// Files under a directory on the local disk.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let path = normalize_path(path)?;
        Ok(self.root.join(path))
    }

    /// Virtual paths of every file under `prefix`, sorted. Hidden files are skipped.
    pub fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let dir = match normalize_path(prefix) {
            Ok(p) => self.root.join(p),
            Err(_) if prefix.trim_matches('/').is_empty() => self.root.clone(),
            Err(e) => return Err(e),
        };
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&dir).into_iter().filter_entry(|e| !is_hidden(e)) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                paths.push(parts.join("/"));
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

#[async_trait]
impl FileStore for LocalFileStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> AppResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!("Wrote {} bytes to {:?}", bytes.len(), target);
        Ok(())
    }

    async fn read(&self, path: &str) -> AppResult<Option<Vec<u8>>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> AppResult<bool> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() -> AppResult<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalFileStore::new(dir.path());

        store.write("artifacts/2024/a.png", b"first").await?;
        assert_eq!(store.read("/artifacts/2024/a.png").await?, Some(b"first".to_vec()));
        assert!(dir.path().join("artifacts/2024/a.png").exists());

        assert!(store.delete("artifacts/2024/a.png").await?);
        assert_eq!(store.read("artifacts/2024/a.png").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_skips_hidden_files() -> AppResult<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalFileStore::new(dir.path());
        store.write("artifacts/b.png", b"b").await?;
        store.write("artifacts/a.png", b"a").await?;
        store.write("artifacts/.tmp", b"x").await?;
        store.write("other/c.png", b"c").await?;

        assert_eq!(store.list("artifacts")?, vec!["artifacts/a.png", "artifacts/b.png"]);
        assert_eq!(store.list("/")?.len(), 3);
        assert!(store.list("missing")?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        assert!(store.write("../outside.png", b"x").await.is_err());
    }
}
