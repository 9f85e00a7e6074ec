use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::storage::{normalize_path, FileStore};
use crate::utils::config::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// S3-compatible bucket reached over plain HTTP object URLs.
pub struct BucketFileStore {
    endpoint: String,
    bucket: String,
    bearer_token: Option<String>,
    client: Client,
}

impl BucketFileStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            bearer_token: None,
            client: Client::new(),
        }
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    /// The R2 bucket configured for this deployment.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.r2_service_url(), config.artifact_bucket.clone())
            .with_bearer_token(config.r2_secret_access_key.clone())
    }

    pub fn object_url(&self, key: &str) -> AppResult<String> {
        let key = normalize_path(key)?;
        Ok(format!("{}/{}/{}", self.endpoint, self.bucket, key))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

fn network(err: reqwest::Error) -> AppError {
    AppError::storage(err.to_string())
}

#[async_trait]
impl FileStore for BucketFileStore {
    fn name(&self) -> &'static str {
        "bucket"
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> AppResult<()> {
        let url = self.object_url(path)?;
        let resp = self
            .authorize(self.client.put(&url).body(bytes.to_vec()))
            .send()
            .await
            .map_err(network)?;
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "bucket put failed");
            return Err(AppError::storage(format!("bucket put failed: {}", resp.status())));
        }
        debug!(bytes = bytes.len(), %url, "uploaded object");
        Ok(())
    }

    async fn read(&self, path: &str) -> AppResult<Option<Vec<u8>>> {
        let url = self.object_url(path)?;
        let resp = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(network)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = resp.bytes().await.map_err(network)?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(AppError::storage(format!("bucket get failed: {status}"))),
        }
    }

    async fn delete(&self, path: &str) -> AppResult<bool> {
        let url = self.object_url(path)?;
        let resp = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .map_err(network)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(AppError::storage(format!("bucket delete failed: {status}"))),
        }
    }
}
