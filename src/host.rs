//! Process-wide wiring, built once at startup and shared by `Arc`.

use std::sync::Arc;

use tracing::info;

use crate::database::Database;
use crate::generation::{GenerationPipeline, ImageGenerator};
use crate::services::Services;
use crate::storage::{BucketFileStore, FileStore, LocalFileStore, ReadAccess, UploadLocation};
use crate::utils::config::{AppConfig, StorageBackend, UPLOAD_PREFIX};
use crate::utils::error::{AppError, AppResult};

pub const DEV_ORIGINS: [&str; 2] = ["http://localhost:5000", "https://localhost:5001"];
pub const ALLOWED_HEADERS: &str = "Content-Type,Authorization";

/// Credentialed cross-origin requests are allowed from an explicit list only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    origins: Vec<String>,
    allowed_headers: String,
    allow_credentials: bool,
}

impl CorsPolicy {
    /// Dev origins, plus the deployment CDN when `DEPLOY_CDN` is set.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut origins: Vec<String> = DEV_ORIGINS.iter().map(|o| o.to_string()).collect();
        if let Some(cdn) = &config.deploy_cdn {
            let host = cdn
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/');
            origins.push(format!("https://{host}"));
        }
        Self {
            origins,
            allowed_headers: ALLOWED_HEADERS.to_string(),
            allow_credentials: true,
        }
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.origins.iter().any(|o| o.eq_ignore_ascii_case(origin))
    }

    /// Headers to attach to a response for `origin`, or `None` if the origin is refused.
    pub fn response_headers(&self, origin: &str) -> Option<Vec<(&'static str, String)>> {
        if !self.is_allowed(origin) {
            return None;
        }
        let mut headers = vec![
            ("Access-Control-Allow-Origin", origin.trim_end_matches('/').to_string()),
            ("Access-Control-Allow-Headers", self.allowed_headers.clone()),
            ("Vary", "Origin".to_string()),
        ];
        if self.allow_credentials {
            headers.push(("Access-Control-Allow-Credentials", "true".to_string()));
        }
        Some(headers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub add_redirect_params_to_query_string: bool,
    pub use_same_site_cookies: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            add_redirect_params_to_query_string: true,
            use_same_site_cookies: true,
        }
    }
}

pub struct AppHost {
    pub config: AppConfig,
    pub host: HostConfig,
    pub cors: CorsPolicy,
    pub db: Arc<Database>,
    pub uploads: UploadLocation,
    pub services: Services,
    generator: Option<Arc<dyn ImageGenerator>>,
}

impl AppHost {
    pub fn build(
        config: AppConfig,
        db: Arc<Database>,
        generator: Option<Arc<dyn ImageGenerator>>,
    ) -> AppResult<Self> {
        let store: Arc<dyn FileStore> = match &config.storage {
            StorageBackend::Local(dir) => Arc::new(LocalFileStore::new(dir.clone())),
            StorageBackend::Bucket => {
                if config.r2_access_key_id.is_none() {
                    return Err(AppError::config("bucket storage requires R2_ACCESS_KEY_ID"));
                }
                Arc::new(BucketFileStore::from_config(&config))
            }
        };
        let uploads = UploadLocation::new(
            UPLOAD_PREFIX,
            store,
            &config.assets_base_path,
            config.max_upload_bytes,
        )
        .with_read_access(ReadAccess::AllowAnon);
        let cors = CorsPolicy::from_config(&config);

        info!(
            store = uploads.store().name(),
            origins = cors.origins().len(),
            generator = generator.as_ref().map(|g| g.name()).unwrap_or("none"),
            "Host configured"
        );

        Ok(Self {
            services: Services::new(db.clone()),
            host: HostConfig::default(),
            cors,
            uploads,
            generator,
            db,
            config,
        })
    }

    pub fn generator(&self) -> Option<&Arc<dyn ImageGenerator>> {
        self.generator.as_ref()
    }

    pub fn pipeline(&self) -> AppResult<GenerationPipeline> {
        let generator = self
            .generator
            .clone()
            .ok_or_else(|| AppError::config("no image generation provider configured"))?;
        Ok(GenerationPipeline::new(
            self.db.clone(),
            self.uploads.clone(),
            generator,
        ))
    }
}
