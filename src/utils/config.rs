use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::utils::error::{AppError, AppResult};

pub const ARTIFACT_BUCKET: &str = "diffusion";
pub const R2_ACCOUNT: &str = "b95f38ca3a6ac31ea582cd624e6eb385";
pub const ASSETS_BASE_PATH: &str = "https://cdn.diffusion.works";
pub const FALLBACK_ASSETS_BASE_PATH: &str = "https://pub-97bba6b94a944260b10a6e7d4bf98053.r2.dev";
pub const UPLOAD_PREFIX: &str = "artifacts";
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const DEFAULT_DATABASE_PATH: &str = "diffusion.sqlite";
const DEFAULT_ARTIFACTS_DIR: &str = "App_Data/files";
const PLACEHOLDER_API_KEY: &str = "<your_api_key>";

/// Where generated files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files under a local directory, served from `assets_base_path`.
    Local(PathBuf),
    /// R2 bucket reached over HTTP with the configured credentials.
    Bucket,
}

/// Process-wide settings, resolved once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub storage: StorageBackend,
    pub artifact_bucket: String,
    pub r2_account: String,
    pub r2_access_key_id: Option<String>,
    pub r2_secret_access_key: Option<String>,
    pub assets_base_path: String,
    pub fallback_assets_base_path: String,
    pub deploy_cdn: Option<String>,
    pub generation_api_key: String,
    pub max_upload_bytes: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_path", &self.database_path)
            .field("storage", &self.storage)
            .field("artifact_bucket", &self.artifact_bucket)
            .field("r2_account", &self.r2_account)
            .field("r2_access_key_id", &self.r2_access_key_id.as_ref().map(|_| "***"))
            .field("assets_base_path", &self.assets_base_path)
            .field("deploy_cdn", &self.deploy_cdn)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            storage: StorageBackend::Local(PathBuf::from(DEFAULT_ARTIFACTS_DIR)),
            artifact_bucket: ARTIFACT_BUCKET.to_string(),
            r2_account: R2_ACCOUNT.to_string(),
            r2_access_key_id: None,
            r2_secret_access_key: None,
            assets_base_path: ASSETS_BASE_PATH.to_string(),
            fallback_assets_base_path: FALLBACK_ASSETS_BASE_PATH.to_string(),
            deploy_cdn: None,
            generation_api_key: PLACEHOLDER_API_KEY.to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Main entry point.
    /// Process environment wins over `.env`; `.env` is optional.
    pub fn load() -> AppResult<Self> {
        let env_path = Path::new(".env");
        let mut vars = if env_path.exists() {
            info!("Loading settings from .env");
            load_env_file(env_path)?
        } else {
            HashMap::new()
        };
        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> AppResult<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        config.r2_access_key_id = get("R2_ACCESS_KEY_ID");
        config.r2_secret_access_key = get("R2_SECRET_ACCESS_KEY");
        config.deploy_cdn = get("DEPLOY_CDN");
        if let Some(key) = get("DREAMAI_APIKEY") {
            config.generation_api_key = key;
        }

        config.storage = match get("ARTIFACTS_DIR") {
            Some(dir) => StorageBackend::Local(PathBuf::from(dir)),
            None if config.r2_access_key_id.is_some() => StorageBackend::Bucket,
            None => StorageBackend::Local(PathBuf::from(DEFAULT_ARTIFACTS_DIR)),
        };

        if config.storage == StorageBackend::Bucket && config.r2_secret_access_key.is_none() {
            return Err(AppError::config(
                "R2_ACCESS_KEY_ID is set but R2_SECRET_ACCESS_KEY is missing",
            ));
        }

        debug!(?config, "resolved configuration");
        Ok(config)
    }

    pub fn r2_service_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.r2_account)
    }

    pub fn has_generation_api_key(&self) -> bool {
        self.generation_api_key != PLACEHOLDER_API_KEY
    }
}

fn load_env_file(path: &Path) -> AppResult<HashMap<String, String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut vars = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            vars.insert(key.trim().to_string(), value.to_string());
        }
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AppConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.artifact_bucket, "diffusion");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(
            config.storage,
            StorageBackend::Local(PathBuf::from(DEFAULT_ARTIFACTS_DIR))
        );
        assert!(!config.has_generation_api_key());
    }

    #[test]
    fn test_bucket_selected_by_credentials() {
        let config = AppConfig::from_vars(&vars(&[
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("DEPLOY_CDN", "diffusion.works"),
        ]))
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Bucket);
        assert_eq!(config.deploy_cdn.as_deref(), Some("diffusion.works"));
        assert_eq!(
            config.r2_service_url(),
            "https://b95f38ca3a6ac31ea582cd624e6eb385.r2.cloudflarestorage.com"
        );
    }

    #[test]
    fn test_bucket_requires_secret() {
        let err = AppConfig::from_vars(&vars(&[("R2_ACCESS_KEY_ID", "key")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = AppConfig::from_vars(&vars(&[
            ("R2_ACCESS_KEY_ID", "very-secret-key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("very-secret-key"));
    }

    #[test]
    fn test_load_env_file() -> AppResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# comment\nDATABASE_PATH=/tmp/app.sqlite\nDEPLOY_CDN=\"cdn.example.org\"\n",
        )?;

        let loaded = load_env_file(&path)?;
        assert_eq!(loaded["DATABASE_PATH"], "/tmp/app.sqlite");
        assert_eq!(loaded["DEPLOY_CDN"], "cdn.example.org");
        assert_eq!(loaded.len(), 2);
        Ok(())
    }
}
