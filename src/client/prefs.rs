//! Per-device UI preferences, kept in a small key/value store.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::{AppError, AppResult};

pub const APP_PREFS_KEY: &str = "AppPrefs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppPrefs {
    pub artifact_gallery_columns: String,
}

impl Default for AppPrefs {
    fn default() -> Self {
        Self {
            artifact_gallery_columns: "5".to_string(),
        }
    }
}

#[async_trait]
pub trait PrefsStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> AppResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPrefsStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryPrefsStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrefsStorage for MemoryPrefsStorage {
    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| AppError::storage("prefs lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| AppError::storage("prefs lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All items in one JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> AppResult<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PrefsStorage for JsonFileStorage {
    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut items = self.read_all().await?;
        items.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&items)?).await?;
        debug!(path = %self.path.display(), key, "saved preference");
        Ok(())
    }
}
