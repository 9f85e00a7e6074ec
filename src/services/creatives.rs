use std::sync::Arc;

use rusqlite::{params_from_iter, Connection};
use tracing::info;

use crate::database::{crud, Database, Entity, Fields, FieldsExt, IntoFields, Query, QueryResponse};
use crate::models::{
    Creative, CreativeArtifact, CreativeArtist, CreativeModifier, NewCreative, NewJoin, Session,
    UpdateCreative,
};
use crate::services::require_session;
use crate::utils::error::{AppError, AppResult};

/// Owners and moderators may change a creative; nobody else.
pub(crate) fn authorize_owner(session: &Session, creative: &Creative) -> AppResult<()> {
    if creative.owner_id == session.user_id || session.is_moderator() {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "creative {} belongs to another user",
            creative.id
        )))
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Remove a creative and everything hanging off it. Runs inside the caller's transaction.
pub(crate) fn purge_creative(conn: &Connection, creative_id: i64) -> AppResult<usize> {
    let artifact_ids: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM creative_artifacts WHERE creative_id = ?1")?;
        let ids = stmt.query_map([creative_id], |row| row.get(0))?;
        ids.collect::<Result<_, _>>()?
    };

    if !artifact_ids.is_empty() {
        let marks = placeholders(artifact_ids.len());
        conn.execute(
            &format!("DELETE FROM artifact_likes WHERE artifact_id IN ({marks})"),
            params_from_iter(artifact_ids.iter()),
        )?;
        conn.execute(
            &format!(
                "UPDATE creative_artifacts SET high_res_artifact_id = NULL WHERE high_res_artifact_id IN ({marks})"
            ),
            params_from_iter(artifact_ids.iter()),
        )?;
        conn.execute(
            &format!("UPDATE creatives SET primary_artifact_id = NULL WHERE primary_artifact_id IN ({marks})"),
            params_from_iter(artifact_ids.iter()),
        )?;
    }
    conn.execute("DELETE FROM creative_artists WHERE creative_id = ?1", [creative_id])?;
    conn.execute("DELETE FROM creative_modifiers WHERE creative_id = ?1", [creative_id])?;
    crud::delete::<CreativeArtifact>(conn, &artifact_ids)?;
    crud::delete::<Creative>(conn, &[creative_id])?;
    Ok(artifact_ids.len())
}

#[derive(Clone)]
pub struct CreativeService {
    db: Arc<Database>,
}

impl CreativeService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn load_creative(&self, id: i64) -> AppResult<Creative> {
        self.db
            .repo::<Creative>()
            .get(id)?
            .ok_or_else(|| AppError::not_found(format!("creative {id}")))
    }

    pub fn query_creatives(&self, query: &Query) -> AppResult<QueryResponse<Creative>> {
        self.db.repo::<Creative>().query(query)
    }

    /// The owner is always the caller, whatever the request says.
    pub fn create_creative(
        &self,
        session: Option<&Session>,
        request: NewCreative,
    ) -> AppResult<Creative> {
        let session = require_session(session)?;
        let request = NewCreative {
            owner_id: session.user_id,
            ..request
        };
        let creative = self.db.repo::<Creative>().create(request.into_fields())?;
        info!(creative_id = creative.id, owner_id = creative.owner_id, "created creative");
        Ok(creative)
    }

    pub fn update_creative(
        &self,
        session: Option<&Session>,
        id: i64,
        request: UpdateCreative,
    ) -> AppResult<Creative> {
        let session = require_session(session)?;
        let creative = self.load_creative(id)?;
        authorize_owner(session, &creative)?;
        if let Some(primary) = request.primary_artifact_id {
            if !creative.artifacts.iter().any(|a| a.id == primary) {
                return Err(AppError::validation(
                    "primary_artifact_id",
                    format!("artifact {primary} is not part of creative {id}"),
                ));
            }
        }
        self.db.repo::<Creative>().patch(id, request.into_fields())
    }

    /// Hide the creative from default queries; rows stay in place.
    pub fn soft_delete_creative(&self, session: Option<&Session>, id: i64) -> AppResult<()> {
        let session = require_session(session)?;
        let creative = self.load_creative(id)?;
        authorize_owner(session, &creative)?;
        if self.db.repo::<Creative>().soft_delete(id)? {
            info!(creative_id = id, user_id = session.user_id, "soft deleted creative");
        }
        Ok(())
    }

    pub fn hard_delete_creative(&self, session: Option<&Session>, id: i64) -> AppResult<()> {
        let session = require_session(session)?;
        let creative = self.load_creative(id)?;
        authorize_owner(session, &creative)?;
        let artifacts = self.db.transaction(|tx| purge_creative(tx, id))?;
        info!(
            creative_id = id,
            artifacts,
            user_id = session.user_id,
            "hard deleted creative"
        );
        Ok(())
    }

    pub fn query_artifacts(&self, query: &Query) -> AppResult<QueryResponse<CreativeArtifact>> {
        self.db.repo::<CreativeArtifact>().query(query)
    }

    /// Artifacts are immutable apart from the link to their high-res derivative.
    pub fn link_high_res_artifact(
        &self,
        session: Option<&Session>,
        artifact_id: i64,
        high_res_artifact_id: Option<i64>,
    ) -> AppResult<CreativeArtifact> {
        let session = require_session(session)?;
        let artifacts = self.db.repo::<CreativeArtifact>();
        let artifact = artifacts
            .get(artifact_id)?
            .ok_or_else(|| AppError::not_found(format!("artifact {artifact_id}")))?;
        authorize_owner(session, &self.load_creative(artifact.creative_id)?)?;
        if high_res_artifact_id == Some(artifact_id) {
            return Err(AppError::validation(
                "high_res_artifact_id",
                "an artifact cannot be its own derivative",
            ));
        }

        let mut fields = Fields::new();
        fields.set("high_res_artifact_id", high_res_artifact_id);
        artifacts.patch(artifact_id, fields)
    }

    pub fn query_creative_artists(&self, query: &Query) -> AppResult<QueryResponse<CreativeArtist>> {
        self.db.repo::<CreativeArtist>().query(query)
    }

    pub fn query_creative_modifiers(
        &self,
        query: &Query,
    ) -> AppResult<QueryResponse<CreativeModifier>> {
        self.db.repo::<CreativeModifier>().query(query)
    }

    pub fn add_creative_artist(
        &self,
        session: Option<&Session>,
        request: NewJoin,
    ) -> AppResult<CreativeArtist> {
        self.add_join::<CreativeArtist>(session, request, "artist_id")
    }

    pub fn add_creative_modifier(
        &self,
        session: Option<&Session>,
        request: NewJoin,
    ) -> AppResult<CreativeModifier> {
        self.add_join::<CreativeModifier>(session, request, "modifier_id")
    }

    pub fn remove_creative_artists(&self, session: Option<&Session>, ids: &[i64]) -> AppResult<usize> {
        let session = require_session(session)?;
        let joins = self.db.repo::<CreativeArtist>().query(&Query::new().ids(ids.iter().copied()))?;
        for join in &joins.results {
            authorize_owner(session, &self.load_creative(join.creative_id)?)?;
        }
        self.db.repo::<CreativeArtist>().delete(ids)
    }

    pub fn remove_creative_modifiers(
        &self,
        session: Option<&Session>,
        ids: &[i64],
    ) -> AppResult<usize> {
        let session = require_session(session)?;
        let joins = self.db.repo::<CreativeModifier>().query(&Query::new().ids(ids.iter().copied()))?;
        for join in &joins.results {
            authorize_owner(session, &self.load_creative(join.creative_id)?)?;
        }
        self.db.repo::<CreativeModifier>().delete(ids)
    }

    fn add_join<E: Entity>(
        &self,
        session: Option<&Session>,
        request: NewJoin,
        target_column: &str,
    ) -> AppResult<E> {
        let session = require_session(session)?;
        let fields = request.into_fields_for(target_column);
        // Missing or zero ids fall through to the `> 0` rule in create.
        if let Some(creative_id) = request.creative_id.filter(|id| *id > 0) {
            if let Some(creative) = self.db.repo::<Creative>().get(creative_id)? {
                authorize_owner(session, &creative)?;
            }
        }
        self.db.repo::<E>().create(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artist, ArtistFields, ArtifactLike, ROLE_MODERATOR};
    use crate::services::test_support::{insert_artifact, insert_creative, insert_user};

    fn setup() -> (Arc<Database>, CreativeService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        insert_user(&db, 1, None);
        insert_user(&db, 2, None);
        (db.clone(), CreativeService::new(db))
    }

    #[test]
    fn test_create_applies_defaults_and_forces_owner() {
        let (_db, service) = setup();
        let creative = service
            .create_creative(
                Some(&Session::new(1)),
                NewCreative {
                    owner_id: 2,
                    user_prompt: "a castle".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(creative.owner_id, 1);
        assert_eq!((creative.images, creative.width, creative.height, creative.steps), (4, 512, 512, 50));
        assert!(creative.artifacts.is_empty());
    }

    #[test]
    fn test_create_requires_prompt_and_session() {
        let (_db, service) = setup();
        assert!(matches!(
            service.create_creative(None, NewCreative::default()),
            Err(AppError::Unauthenticated)
        ));
        let err = service
            .create_creative(Some(&Session::new(1)), NewCreative::default())
            .unwrap_err();
        assert_eq!(err.field_name(), Some("user_prompt"));
    }

    #[test]
    fn test_query_filters_pages_and_orders() {
        let (db, service) = setup();
        for i in 0..5 {
            insert_creative(&db, 1, &format!("prompt {i}"));
        }
        insert_creative(&db, 2, "other");

        let page = service
            .query_creatives(&Query::new().filter("owner_id", 1).take(3).order_by_desc("id"))
            .unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<i64> = page.results.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);

        let err = service
            .query_creatives(&Query::new().order_by("1; DROP TABLE creatives"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_creatives_carry_their_references() {
        let (db, service) = setup();
        let creative = insert_creative(&db, 1, "a castle");
        insert_artifact(&db, creative.id, "a.png");
        insert_artifact(&db, creative.id, "b.png");
        let artist: Artist = db
            .repo::<Artist>()
            .create(
                ArtistFields {
                    last_name: Some("Turner".into()),
                    ..Default::default()
                }
                .into_fields(),
            )
            .unwrap();
        service
            .add_creative_artist(Some(&Session::new(1)), NewJoin::new(creative.id, artist.id))
            .unwrap();

        let loaded = service
            .query_creatives(&Query::new().id(creative.id))
            .unwrap()
            .results
            .remove(0);
        assert_eq!(loaded.artifacts.len(), 2);
        assert_eq!(loaded.artists.len(), 1);
        assert_eq!(loaded.artists[0].artist_id, artist.id);
    }

    #[test]
    fn test_join_rows_validate_ids() {
        let (db, service) = setup();
        let creative = insert_creative(&db, 1, "a castle");
        let err = service
            .add_creative_modifier(
                Some(&Session::new(1)),
                NewJoin {
                    creative_id: Some(creative.id),
                    target_id: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.field_name(), Some("modifier_id"));

        let err = service
            .add_creative_modifier(Some(&Session::new(1)), NewJoin::new(creative.id, 77))
            .unwrap_err();
        assert_eq!(err.field_name(), Some("modifier_id"));
    }

    #[test]
    fn test_only_owner_or_moderator_may_modify() {
        let (db, service) = setup();
        let creative = insert_creative(&db, 1, "mine");
        let update = UpdateCreative {
            prompt: Some("changed".into()),
            ..Default::default()
        };

        let err = service
            .update_creative(Some(&Session::new(2)), creative.id, update.clone())
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let moderator = Session::new(2).with_role(ROLE_MODERATOR);
        let updated = service
            .update_creative(Some(&moderator), creative.id, update)
            .unwrap();
        assert_eq!(updated.prompt, "changed");
        assert_eq!(updated.user_prompt, "mine");
    }

    #[test]
    fn test_primary_artifact_must_belong_to_creative() {
        let (db, service) = setup();
        let mine = insert_creative(&db, 1, "mine");
        let other = insert_creative(&db, 1, "other");
        let foreign = insert_artifact(&db, other.id, "x.png");
        let own = insert_artifact(&db, mine.id, "y.png");

        let err = service
            .update_creative(
                Some(&Session::new(1)),
                mine.id,
                UpdateCreative {
                    primary_artifact_id: Some(foreign.id),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.field_name(), Some("primary_artifact_id"));

        let updated = service
            .update_creative(
                Some(&Session::new(1)),
                mine.id,
                UpdateCreative {
                    primary_artifact_id: Some(own.id),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.primary_artifact().map(|a| a.id), Some(own.id));
    }

    #[test]
    fn test_soft_delete_hides_from_queries() {
        let (db, service) = setup();
        let creative = insert_creative(&db, 1, "mine");
        service
            .soft_delete_creative(Some(&Session::new(1)), creative.id)
            .unwrap();

        assert_eq!(service.query_creatives(&Query::new()).unwrap().total, 0);
        let all = service
            .query_creatives(&Query::new().include_deleted())
            .unwrap();
        assert!(all.results[0].deleted_at.is_some());
    }

    #[test]
    fn test_plain_delete_respects_foreign_keys() {
        let (db, _service) = setup();
        let creative = insert_creative(&db, 1, "mine");
        insert_artifact(&db, creative.id, "a.png");
        let err = db.repo::<Creative>().delete(&[creative.id]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_hard_delete_cascades() {
        let (db, service) = setup();
        let creative = insert_creative(&db, 1, "mine");
        let a1 = insert_artifact(&db, creative.id, "a.png");
        insert_artifact(&db, creative.id, "b.png");
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO artifact_likes (app_user_id, artifact_id) VALUES (2, ?1)",
                [a1.id],
            )?;
            Ok(())
        })
        .unwrap();

        let err = service
            .hard_delete_creative(Some(&Session::new(2)), creative.id)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        service
            .hard_delete_creative(Some(&Session::new(1)), creative.id)
            .unwrap();
        assert_eq!(service.query_artifacts(&Query::new()).unwrap().total, 0);
        assert_eq!(db.repo::<ArtifactLike>().query(&Query::new()).unwrap().total, 0);
        assert!(db.repo::<Creative>().get(creative.id).unwrap().is_none());
    }

    #[test]
    fn test_high_res_link() {
        let (db, service) = setup();
        let creative = insert_creative(&db, 1, "mine");
        let low = insert_artifact(&db, creative.id, "low.png");
        let high = insert_artifact(&db, creative.id, "high.png");

        let linked = service
            .link_high_res_artifact(Some(&Session::new(1)), low.id, Some(high.id))
            .unwrap();
        assert_eq!(linked.high_res_artifact_id, Some(high.id));

        let err = service
            .link_high_res_artifact(Some(&Session::new(1)), low.id, Some(low.id))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
