use std::sync::Arc;

use tracing::info;

use crate::database::{Database, Entity, IntoFields, Query, QueryResponse};
use crate::models::{Artist, ArtistFields, Modifier, ModifierFields, Session};
use crate::services::require_session;
use crate::utils::error::{AppError, AppResult};

fn require_admin(session: Option<&Session>) -> AppResult<&Session> {
    let session = require_session(session)?;
    if session.is_admin() {
        Ok(session)
    } else {
        Err(AppError::forbidden("admin role required"))
    }
}

/// Artists and modifiers: readable by anyone, curated by admins.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<Database>,
}

impl CatalogService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn query_artists(&self, query: &Query) -> AppResult<QueryResponse<Artist>> {
        self.db.repo::<Artist>().query(query)
    }

    pub fn create_artist(&self, session: Option<&Session>, request: ArtistFields) -> AppResult<Artist> {
        self.admin_create(session, request)
    }

    pub fn update_artist(
        &self,
        session: Option<&Session>,
        id: i64,
        request: ArtistFields,
    ) -> AppResult<Artist> {
        self.admin_patch(session, id, request)
    }

    pub fn delete_artists(&self, session: Option<&Session>, ids: &[i64]) -> AppResult<usize> {
        self.admin_delete::<Artist>(session, ids)
    }

    pub fn query_modifiers(&self, query: &Query) -> AppResult<QueryResponse<Modifier>> {
        self.db.repo::<Modifier>().query(query)
    }

    pub fn create_modifier(
        &self,
        session: Option<&Session>,
        request: ModifierFields,
    ) -> AppResult<Modifier> {
        self.admin_create(session, request)
    }

    pub fn update_modifier(
        &self,
        session: Option<&Session>,
        id: i64,
        request: ModifierFields,
    ) -> AppResult<Modifier> {
        self.admin_patch(session, id, request)
    }

    pub fn delete_modifiers(&self, session: Option<&Session>, ids: &[i64]) -> AppResult<usize> {
        self.admin_delete::<Modifier>(session, ids)
    }

    fn admin_create<E: Entity>(&self, session: Option<&Session>, request: impl IntoFields) -> AppResult<E> {
        let session = require_admin(session)?;
        let row = self.db.repo::<E>().create(request.into_fields())?;
        info!(table = E::SCHEMA.table, id = row.id(), user_id = session.user_id, "catalog entry created");
        Ok(row)
    }

    fn admin_patch<E: Entity>(
        &self,
        session: Option<&Session>,
        id: i64,
        request: impl IntoFields,
    ) -> AppResult<E> {
        require_admin(session)?;
        self.db.repo::<E>().patch(id, request.into_fields())
    }

    fn admin_delete<E: Entity>(&self, session: Option<&Session>, ids: &[i64]) -> AppResult<usize> {
        let session = require_admin(session)?;
        let removed = self.db.repo::<E>().delete(ids)?;
        info!(table = E::SCHEMA.table, removed, user_id = session.user_id, "catalog entries deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewJoin, ROLE_ADMIN};
    use crate::services::creatives::CreativeService;
    use crate::services::test_support::{insert_creative, insert_user};

    fn admin() -> Session {
        Session::new(1).with_role(ROLE_ADMIN)
    }

    #[test]
    fn test_only_admins_curate() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = CatalogService::new(db);
        let request = ModifierFields {
            name: Some("Cinematic".into()),
            category: Some("Style".into()),
            description: None,
        };

        assert!(matches!(
            service.create_modifier(None, request.clone()),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            service.create_modifier(Some(&Session::new(1)), request.clone()),
            Err(AppError::Forbidden(_))
        ));

        let created = service.create_modifier(Some(&admin()), request).unwrap();
        assert_eq!(created.category, "Style");
        assert_eq!(service.query_modifiers(&Query::new()).unwrap().total, 1);
    }

    #[test]
    fn test_patch_is_partial() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = CatalogService::new(db);
        let artist = service
            .create_artist(
                Some(&admin()),
                ArtistFields {
                    first_name: Some("Katsushika".into()),
                    last_name: Some("Hokusai".into()),
                    year_died: Some(1849),
                    kind: None,
                },
            )
            .unwrap();

        let patched = service
            .update_artist(
                Some(&admin()),
                artist.id,
                ArtistFields {
                    kind: Some(vec!["Ukiyo-e".into()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(patched.last_name, "Hokusai");
        assert_eq!(patched.year_died, Some(1849));
        assert_eq!(patched.kind, Some(vec!["Ukiyo-e".to_string()]));

        let err = service
            .update_artist(Some(&admin()), 999, ArtistFields::default())
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_delete_referenced_modifier_conflicts() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        insert_user(&db, 1, None);
        let service = CatalogService::new(db.clone());
        let modifier = service
            .create_modifier(
                Some(&admin()),
                ModifierFields {
                    name: Some("Moody".into()),
                    category: Some("Mood".into()),
                    description: None,
                },
            )
            .unwrap();
        let creative = insert_creative(&db, 1, "a lake");
        CreativeService::new(db)
            .add_creative_modifier(Some(&admin()), NewJoin::new(creative.id, modifier.id))
            .unwrap();

        let err = service
            .delete_modifiers(Some(&admin()), &[modifier.id])
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
