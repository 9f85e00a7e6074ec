//! Remote API surface as the client cache sees it.
//!
//! Calls never return `Err`; a failed call comes back as an [`ApiResult`]
//! carrying a [`ResponseStatus`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::database::{Query, QueryResponse};
use crate::models::{ArtifactLike, Creative, CreativeArtifact, UserProfile};
use crate::services::UpdateUserProfile;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    pub error_code: String,
    pub message: String,
    pub field_name: Option<String>,
}

impl ResponseStatus {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            field_name: None,
        }
    }
}

impl From<&AppError> for ResponseStatus {
    fn from(err: &AppError) -> Self {
        Self {
            error_code: err.error_code().to_string(),
            message: err.to_string(),
            field_name: err.field_name().map(str::to_string),
        }
    }
}

/// A response, a failure, or (for no-op calls) neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    pub response: Option<T>,
    pub error: Option<ResponseStatus>,
}

impl<T> ApiResult<T> {
    pub fn ok(response: T) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    pub fn fail(error: ResponseStatus) -> Self {
        Self {
            response: None,
            error: Some(error),
        }
    }

    /// Nothing was attempted.
    pub fn empty() -> Self {
        Self {
            response: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.response.is_some() && self.error.is_none()
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_response(self) -> Option<T> {
        self.response
    }
}

impl<T> From<AppResult<T>> for ApiResult<T> {
    fn from(result: AppResult<T>) -> Self {
        match result {
            Ok(response) => Self::ok(response),
            Err(err) => Self::fail(ResponseStatus::from(&err)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryCreatives {
    pub id: Option<i64>,
    pub ids: Vec<i64>,
    pub owner_id: Option<i64>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    pub order_by_desc: Option<String>,
}

impl QueryCreatives {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new().ids(self.id.into_iter().chain(self.ids.iter().copied()));
        if let Some(owner_id) = self.owner_id {
            query = query.filter("owner_id", owner_id);
        }
        if let Some(skip) = self.skip {
            query = query.skip(skip);
        }
        if let Some(take) = self.take {
            query = query.take(take);
        }
        if let Some(column) = &self.order_by_desc {
            query = query.order_by_desc(column);
        }
        query
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryArtifacts {
    pub id: Option<i64>,
    pub ids: Vec<i64>,
    pub creative_id: Option<i64>,
}

impl QueryArtifacts {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new().ids(self.id.into_iter().chain(self.ids.iter().copied()));
        if let Some(creative_id) = self.creative_id {
            query = query.filter("creative_id", creative_id);
        }
        query
    }
}

/// Likes are always the caller's own; only paging is selectable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryArtifactLikes {
    pub skip: Option<usize>,
    pub take: Option<usize>,
}

impl QueryArtifactLikes {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(skip) = self.skip {
            query = query.skip(skip);
        }
        if let Some(take) = self.take {
            query = query.take(take);
        }
        query
    }
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn query_creatives(&self, request: QueryCreatives) -> ApiResult<QueryResponse<Creative>>;

    async fn query_artifacts(
        &self,
        request: QueryArtifacts,
    ) -> ApiResult<QueryResponse<CreativeArtifact>>;

    async fn query_artifact_likes(
        &self,
        request: QueryArtifactLikes,
    ) -> ApiResult<QueryResponse<ArtifactLike>>;

    async fn create_artifact_like(&self, artifact_id: i64) -> ApiResult<ArtifactLike>;

    async fn delete_artifact_like(&self, artifact_id: i64) -> ApiResult<EmptyResponse>;

    async fn hard_delete_creative(&self, creative_id: i64) -> ApiResult<EmptyResponse>;

    async fn get_user_profile(&self) -> ApiResult<UserProfile>;

    async fn update_user_profile(&self, request: UpdateUserProfile) -> ApiResult<UserProfile>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_states() {
        let ok = ApiResult::ok(1);
        assert!(ok.succeeded() && !ok.failed());

        let empty = ApiResult::<i32>::empty();
        assert!(!empty.succeeded() && !empty.failed());

        let failed: ApiResult<i32> = Err(AppError::validation("handle", "bad")).into();
        assert!(failed.failed() && !failed.succeeded());
        let status = failed.error.unwrap();
        assert_eq!(status.error_code, "ValidationError");
        assert_eq!(status.field_name.as_deref(), Some("handle"));
    }

    #[test]
    fn test_query_creatives_to_query() {
        let query = QueryCreatives {
            owner_id: Some(42),
            take: Some(28),
            order_by_desc: Some("id".into()),
            ..Default::default()
        }
        .to_query();
        assert!(query.ids.is_empty());
        assert_eq!(query.take, Some(28));
        assert_eq!(query.filters.len(), 1);
        assert!(query.order_by.unwrap().descending);

        let query = QueryArtifacts {
            id: Some(3),
            ids: vec![4, 5],
            ..Default::default()
        }
        .to_query();
        assert_eq!(query.ids, vec![3, 4, 5]);
    }
}
