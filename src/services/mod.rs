//! Request handlers. Every handler takes the caller's session explicitly;
//! `None` means the auth provider found no valid session.

pub mod catalog;
pub mod creatives;
pub mod likes;
pub mod profile;

use std::sync::Arc;

use crate::database::Database;
use crate::models::Session;
use crate::utils::error::{AppError, AppResult};

pub use catalog::CatalogService;
pub use creatives::CreativeService;
pub use likes::LikeService;
pub use profile::{ProfileService, UpdateUserProfile};

pub(crate) fn require_session(session: Option<&Session>) -> AppResult<&Session> {
    session.ok_or(AppError::Unauthenticated)
}

/// All handlers over one store.
#[derive(Clone)]
pub struct Services {
    pub profile: ProfileService,
    pub creatives: CreativeService,
    pub catalog: CatalogService,
    pub likes: LikeService,
}

impl Services {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            profile: ProfileService::new(db.clone()),
            creatives: CreativeService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            likes: LikeService::new(db),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::params;

    use crate::database::{Database, IntoFields};
    use crate::models::{Creative, CreativeArtifact, NewArtifact, NewCreative};

    pub fn insert_user(db: &Database, id: i64, handle: Option<&str>) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO app_users (id, display_name, handle) VALUES (?1, ?2, ?3)",
                params![id, format!("User {id}"), handle],
            )?;
            Ok(())
        })
        .unwrap();
    }

    pub fn insert_creative(db: &Database, owner_id: i64, prompt: &str) -> Creative {
        db.repo::<Creative>()
            .create(
                NewCreative {
                    owner_id,
                    user_prompt: prompt.to_string(),
                    ..Default::default()
                }
                .into_fields(),
            )
            .unwrap()
    }

    pub fn insert_artifact(db: &Database, creative_id: i64, name: &str) -> CreativeArtifact {
        db.repo::<CreativeArtifact>()
            .create(
                NewArtifact {
                    creative_id,
                    file_name: name.to_string(),
                    file_path: format!("/artifacts/{name}"),
                    content_type: "image/png".to_string(),
                    content_length: 1024,
                    width: 512,
                    height: 512,
                    seed: 42,
                    prompt: "a prompt".to_string(),
                }
                .into_fields(),
            )
            .unwrap()
    }
}
