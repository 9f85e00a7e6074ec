use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::api::{
    ApiClient, ApiResult, EmptyResponse, QueryArtifactLikes, QueryArtifacts, QueryCreatives,
};
use crate::database::QueryResponse;
use crate::models::{ArtifactLike, Creative, CreativeArtifact, Session, UserProfile};
use crate::services::{Services, UpdateUserProfile};

/// In-process client: calls the service layer directly as the given session.
#[derive(Clone)]
pub struct LocalApiClient {
    services: Arc<Services>,
    session: Option<Session>,
}

impl LocalApiClient {
    pub fn new(services: Arc<Services>, session: Option<Session>) -> Self {
        Self { services, session }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

#[async_trait]
impl ApiClient for LocalApiClient {
    async fn query_creatives(&self, request: QueryCreatives) -> ApiResult<QueryResponse<Creative>> {
        debug!(?request, "query creatives");
        self.services.creatives.query_creatives(&request.to_query()).into()
    }

    async fn query_artifacts(
        &self,
        request: QueryArtifacts,
    ) -> ApiResult<QueryResponse<CreativeArtifact>> {
        debug!(?request, "query artifacts");
        self.services.creatives.query_artifacts(&request.to_query()).into()
    }

    async fn query_artifact_likes(
        &self,
        request: QueryArtifactLikes,
    ) -> ApiResult<QueryResponse<ArtifactLike>> {
        self.services
            .likes
            .query_likes(self.session(), &request.to_query())
            .into()
    }

    async fn create_artifact_like(&self, artifact_id: i64) -> ApiResult<ArtifactLike> {
        self.services.likes.create_like(self.session(), artifact_id).into()
    }

    async fn delete_artifact_like(&self, artifact_id: i64) -> ApiResult<EmptyResponse> {
        self.services
            .likes
            .delete_like(self.session(), artifact_id)
            .map(|_| EmptyResponse)
            .into()
    }

    async fn hard_delete_creative(&self, creative_id: i64) -> ApiResult<EmptyResponse> {
        self.services
            .creatives
            .hard_delete_creative(self.session(), creative_id)
            .map(|_| EmptyResponse)
            .into()
    }

    async fn get_user_profile(&self) -> ApiResult<UserProfile> {
        self.services.profile.get_profile(self.session()).into()
    }

    async fn update_user_profile(&self, request: UpdateUserProfile) -> ApiResult<UserProfile> {
        self.services.profile.update_profile(self.session(), request).into()
    }
}
