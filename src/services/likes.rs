use std::sync::Arc;

use rusqlite::types::Value;
use tracing::debug;

use crate::database::{Database, Fields, FieldsExt, Query, QueryResponse};
use crate::models::{ArtifactLike, Session};
use crate::services::require_session;
use crate::utils::error::AppResult;

/// Likes are private: every call is scoped to the caller's own rows.
#[derive(Clone)]
pub struct LikeService {
    db: Arc<Database>,
}

impl LikeService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn query_likes(
        &self,
        session: Option<&Session>,
        query: &Query,
    ) -> AppResult<QueryResponse<ArtifactLike>> {
        let session = require_session(session)?;
        let mut query = query.clone();
        query.filters.retain(|(column, _)| column != "app_user_id");
        query
            .filters
            .push(("app_user_id".to_string(), Value::Integer(session.user_id)));
        self.db.repo::<ArtifactLike>().query(&query)
    }

    fn find(&self, user_id: i64, artifact_id: i64) -> AppResult<Option<ArtifactLike>> {
        let existing = self.db.repo::<ArtifactLike>().query(
            &Query::new()
                .filter("app_user_id", user_id)
                .filter("artifact_id", artifact_id),
        )?;
        Ok(existing.results.into_iter().next())
    }

    /// Liking twice returns the existing like.
    pub fn create_like(&self, session: Option<&Session>, artifact_id: i64) -> AppResult<ArtifactLike> {
        let session = require_session(session)?;
        if let Some(existing) = self.find(session.user_id, artifact_id)? {
            return Ok(existing);
        }
        let mut fields = Fields::new();
        fields
            .set("app_user_id", session.user_id)
            .set("artifact_id", artifact_id);
        let like = self.db.repo::<ArtifactLike>().create(fields)?;
        debug!(user_id = session.user_id, artifact_id, "liked artifact");
        Ok(like)
    }

    /// Returns how many likes were removed (0 or 1).
    pub fn delete_like(&self, session: Option<&Session>, artifact_id: i64) -> AppResult<usize> {
        let session = require_session(session)?;
        let Some(like) = self.find(session.user_id, artifact_id)? else {
            return Ok(0);
        };
        let removed = self.db.repo::<ArtifactLike>().delete(&[like.id])?;
        debug!(user_id = session.user_id, artifact_id, "unliked artifact");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{insert_artifact, insert_creative, insert_user};
    use crate::utils::error::AppError;

    fn setup() -> (Arc<Database>, LikeService, i64) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        insert_user(&db, 1, None);
        insert_user(&db, 2, None);
        let creative = insert_creative(&db, 1, "a castle");
        let artifact = insert_artifact(&db, creative.id, "a.png");
        (db.clone(), LikeService::new(db), artifact.id)
    }

    #[test]
    fn test_like_is_idempotent_and_scoped() {
        let (_db, service, artifact_id) = setup();
        let first = service.create_like(Some(&Session::new(1)), artifact_id).unwrap();
        let again = service.create_like(Some(&Session::new(1)), artifact_id).unwrap();
        assert_eq!(first.id, again.id);
        service.create_like(Some(&Session::new(2)), artifact_id).unwrap();

        // Asking for someone else's likes still returns only your own.
        let mine = service
            .query_likes(Some(&Session::new(1)), &Query::new().filter("app_user_id", 2))
            .unwrap();
        assert_eq!(mine.total, 1);
        assert_eq!(mine.results[0].app_user_id, 1);
    }

    #[test]
    fn test_unlike() {
        let (_db, service, artifact_id) = setup();
        let session = Session::new(1);
        service.create_like(Some(&session), artifact_id).unwrap();
        assert_eq!(service.delete_like(Some(&session), artifact_id).unwrap(), 1);
        assert_eq!(service.delete_like(Some(&session), artifact_id).unwrap(), 0);
        assert!(matches!(
            service.delete_like(None, artifact_id),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_like_unknown_artifact_fails_validation() {
        let (_db, service, _) = setup();
        let err = service.create_like(Some(&Session::new(1)), 999).unwrap_err();
        assert_eq!(err.field_name(), Some("artifact_id"));
    }
}
