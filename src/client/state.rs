//! Per-session client cache over an [`ApiClient`].
//!
//! Gives UI code synchronous views of what has already been fetched (likes,
//! recent creatives, artifacts) and keeps them in step with the server through
//! read-through fetches and optimistic like/unlike.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::api::{
    ApiClient, ApiResult, EmptyResponse, QueryArtifactLikes, QueryArtifacts, QueryCreatives,
};
use crate::client::notify::{ChangeNotifier, ListenerId};
use crate::client::optimistic::{LikeMutation, Pending};
use crate::client::prefs::{AppPrefs, PrefsStorage, APP_PREFS_KEY};
use crate::models::{ArtifactLike, Creative, CreativeArtifact};
use crate::utils::error::AppResult;

/// Page size of the creative history fetched by [`UserState::load`].
pub const CREATIVE_HISTORY_TAKE: usize = 28;

pub struct UserState<C> {
    client: C,
    prefs_storage: Arc<dyn PrefsStorage>,
    app_prefs: AppPrefs,
    liked_artifact_ids: HashSet<i64>,
    creative_history: Vec<Arc<Creative>>,
    artifacts_map: HashMap<i64, Arc<CreativeArtifact>>,
    creatives_map: HashMap<i64, Arc<Creative>>,
    notifier: ChangeNotifier,
}

impl<C: ApiClient> UserState<C> {
    pub fn new(client: C, prefs_storage: Arc<dyn PrefsStorage>) -> Self {
        Self {
            client,
            prefs_storage,
            app_prefs: AppPrefs::default(),
            liked_artifact_ids: HashSet::new(),
            creative_history: Vec::new(),
            artifacts_map: HashMap::new(),
            creatives_map: HashMap::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn app_prefs(&self) -> &AppPrefs {
        &self.app_prefs
    }

    pub fn app_prefs_mut(&mut self) -> &mut AppPrefs {
        &mut self.app_prefs
    }

    pub fn liked_artifact_ids(&self) -> &HashSet<i64> {
        &self.liked_artifact_ids
    }

    /// Most recent first.
    pub fn creative_history(&self) -> &[Arc<Creative>] {
        &self.creative_history
    }

    pub fn subscribe(&mut self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn notify_state_changed(&self) {
        self.notifier.notify();
    }

    // Cache population

    pub fn load_creatives(&mut self, creatives: impl IntoIterator<Item = Creative>) {
        for creative in creatives {
            self.load_creative(Arc::new(creative));
        }
    }

    fn load_creative(&mut self, creative: Arc<Creative>) {
        for artifact in &creative.artifacts {
            self.artifacts_map
                .insert(artifact.id, Arc::new(artifact.clone()));
        }
        self.creatives_map.insert(creative.id, creative);
    }

    pub fn load_artifacts(&mut self, artifacts: impl IntoIterator<Item = CreativeArtifact>) {
        for artifact in artifacts {
            self.artifacts_map.insert(artifact.id, Arc::new(artifact));
        }
    }

    pub fn cached_artifact(&self, id: i64) -> Option<Arc<CreativeArtifact>> {
        self.artifacts_map.get(&id).cloned()
    }

    pub fn cached_creative(&self, id: i64) -> Option<Arc<Creative>> {
        self.creatives_map.get(&id).cloned()
    }

    pub fn has_liked(&self, artifact_id: i64) -> bool {
        self.liked_artifact_ids.contains(&artifact_id)
    }

    /// Liked artifacts that are cached, ordered by id.
    pub fn liked_artifacts(&self) -> Vec<Arc<CreativeArtifact>> {
        let mut liked: Vec<_> = self
            .liked_artifact_ids
            .iter()
            .filter_map(|id| self.artifacts_map.get(id).cloned())
            .collect();
        liked.sort_by_key(|a| a.id);
        liked
    }

    // Remote loads

    /// Fetch the user's recent creatives, then their likes. One notification in total.
    pub async fn load(&mut self, user_id: i64) {
        let history = self
            .client
            .query_creatives(QueryCreatives {
                owner_id: Some(user_id),
                take: Some(CREATIVE_HISTORY_TAKE),
                order_by_desc: Some("id".to_string()),
                ..Default::default()
            })
            .await;

        if history.succeeded() {
            let results = history.response.map(|r| r.results).unwrap_or_default();
            self.creative_history = results.into_iter().map(Arc::new).collect();
            for creative in self.creative_history.clone() {
                self.load_creative(creative);
            }
        } else if let Some(status) = &history.error {
            warn!(user_id, error = %status.message, "Failed to load creative history");
        }

        self.load_likes(user_id).await;
    }

    /// Always notifies, even if a fetch failed.
    pub async fn load_likes(&mut self, user_id: i64) {
        let likes = self
            .client
            .query_artifact_likes(QueryArtifactLikes::default())
            .await;
        if likes.succeeded() {
            self.liked_artifact_ids = likes
                .response
                .map(|r| r.results)
                .unwrap_or_default()
                .into_iter()
                .map(|like: ArtifactLike| like.artifact_id)
                .collect();
        } else if let Some(status) = &likes.error {
            warn!(user_id, error = %status.message, "Failed to load likes");
        }

        let mut missing: Vec<i64> = self
            .liked_artifact_ids
            .iter()
            .copied()
            .filter(|id| !self.artifacts_map.contains_key(id))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            debug!(user_id, count = missing.len(), "Fetching liked artifacts");
            let fetched = self
                .client
                .query_artifacts(QueryArtifacts {
                    ids: missing,
                    ..Default::default()
                })
                .await;
            if let Some(response) = fetched.response {
                self.load_artifacts(response.results);
            }
        }

        self.notify_state_changed();
    }

    /// Cache first, then the server. `None` if neither has it.
    pub async fn get_creative(&mut self, id: i64) -> Option<Arc<Creative>> {
        if let Some(creative) = self.cached_creative(id) {
            return Some(creative);
        }
        let api = self
            .client
            .query_creatives(QueryCreatives {
                id: Some(id),
                ..Default::default()
            })
            .await;
        if api.succeeded() {
            if let Some(response) = api.response {
                self.load_creatives(response.results);
            }
        }
        self.cached_creative(id)
    }

    pub async fn get_artifact(&mut self, id: i64) -> Option<Arc<CreativeArtifact>> {
        if let Some(artifact) = self.cached_artifact(id) {
            return Some(artifact);
        }
        let api = self
            .client
            .query_artifacts(QueryArtifacts {
                id: Some(id),
                ..Default::default()
            })
            .await;
        if api.succeeded() {
            if let Some(response) = api.response {
                self.load_artifacts(response.results);
            }
        }
        self.cached_artifact(id)
    }

    // Optimistic mutations

    pub async fn like_artifact(&mut self, artifact: Arc<CreativeArtifact>) -> ApiResult<ArtifactLike> {
        let id = artifact.id;
        self.artifacts_map.insert(id, artifact);
        let pending = Pending::apply(LikeMutation::Like(id), &mut self.liked_artifact_ids);

        let api = self.client.create_artifact_like(id).await;
        if !api.succeeded() {
            debug!(artifact_id = id, "Like rejected, rolling back");
        }
        pending.settle(&mut self.liked_artifact_ids, api.succeeded());
        self.notify_state_changed();
        api
    }

    pub async fn unlike_artifact(
        &mut self,
        artifact: Arc<CreativeArtifact>,
    ) -> ApiResult<EmptyResponse> {
        let id = artifact.id;
        self.artifacts_map.insert(id, artifact);
        let pending = Pending::apply(LikeMutation::Unlike(id), &mut self.liked_artifact_ids);

        let api = self.client.delete_artifact_like(id).await;
        if !api.succeeded() {
            debug!(artifact_id = id, "Unlike rejected, rolling back");
        }
        pending.settle(&mut self.liked_artifact_ids, api.succeeded());
        self.notify_state_changed();
        api
    }

    // Local eviction

    fn evict_artifact(&mut self, id: i64) {
        self.liked_artifact_ids.remove(&id);
        self.artifacts_map.remove(&id);
    }

    fn evict_creative(&mut self, creative: &Creative) {
        let mut artifact_ids: HashSet<i64> = creative.artifacts.iter().map(|a| a.id).collect();
        artifact_ids.extend(
            self.artifacts_map
                .values()
                .filter(|a| a.creative_id == creative.id)
                .map(|a| a.id),
        );
        for id in artifact_ids {
            self.evict_artifact(id);
        }
        self.creative_history.retain(|c| c.id != creative.id);
        self.creatives_map.remove(&creative.id);
    }

    /// Drop an artifact and its like from the cache. No remote call.
    pub fn remove_artifact(&mut self, artifact: &CreativeArtifact) {
        self.evict_artifact(artifact.id);
        self.notify_state_changed();
    }

    /// Drop a creative with its artifacts, their likes and its history entry. No remote call.
    pub fn remove_creative(&mut self, creative: &Creative) {
        self.evict_creative(creative);
        self.notify_state_changed();
    }

    /// Delete on the server; the cache is only touched once that succeeded.
    pub async fn hard_delete_creative(&mut self, creative: &Creative) -> ApiResult<EmptyResponse> {
        let api = self.client.hard_delete_creative(creative.id).await;
        if api.succeeded() {
            self.evict_creative(creative);
            self.notify_state_changed();
        } else if let Some(status) = &api.error {
            warn!(creative_id = creative.id, error = %status.message, "Hard delete failed");
        }
        api
    }

    /// A creative that is not cached is left alone and yields an empty result.
    pub async fn hard_delete_creative_by_id(&mut self, creative_id: i64) -> ApiResult<EmptyResponse> {
        match self.cached_creative(creative_id) {
            Some(creative) => self.hard_delete_creative(&creative).await,
            None => ApiResult::empty(),
        }
    }

    // Preferences

    pub async fn save_app_prefs(&self) -> AppResult<()> {
        let json = serde_json::to_string(&self.app_prefs)?;
        self.prefs_storage.set_item(APP_PREFS_KEY, &json).await
    }

    /// Falls back to defaults when nothing usable is stored.
    pub async fn load_app_prefs(&mut self) -> AppResult<()> {
        let stored = self.prefs_storage.get_item(APP_PREFS_KEY).await?;
        self.app_prefs = match stored {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!("Ignoring unreadable app prefs: {}", e);
                AppPrefs::default()
            }),
            None => AppPrefs::default(),
        };
        self.notify_state_changed();
        Ok(())
    }
}
