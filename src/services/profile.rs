use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::{Database, Fields, FieldsExt, Query};
use crate::models::{AppUser, Session, UserProfile};
use crate::services::require_session;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserProfile {
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub avatar: Option<String>,
}

/// A handle is a legal identifier: a letter or `_`, then letters, digits or `_`.
pub fn is_valid_handle(handle: &str) -> bool {
    let mut chars = handle.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<Database>,
}

impl ProfileService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn load_user(&self, user_id: i64) -> AppResult<AppUser> {
        self.db
            .repo::<AppUser>()
            .get(user_id)?
            .ok_or_else(|| AppError::not_found(format!("user {user_id}")))
    }

    pub fn get_profile(&self, session: Option<&Session>) -> AppResult<UserProfile> {
        let session = require_session(session)?;
        let user = self.load_user(session.user_id)?;
        Ok(UserProfile::from(&user))
    }

    /// Merge the supplied fields over the stored profile and persist what changed.
    ///
    /// The uniqueness check and the write are separate round trips. A handle
    /// claimed in between is caught by the UNIQUE index and reported as
    /// [`AppError::Conflict`] all the same.
    pub fn update_profile(
        &self,
        session: Option<&Session>,
        request: UpdateUserProfile,
    ) -> AppResult<UserProfile> {
        let session = require_session(session)?;
        let user_id = session.user_id;

        let handle = blank_to_none(request.handle);
        let avatar = blank_to_none(request.avatar);

        if let Some(handle) = &handle {
            if !is_valid_handle(handle) {
                return Err(AppError::validation("handle", "Invalid chars in Handle"));
            }
        }

        let users = self.db.repo::<AppUser>();
        let current = self.load_user(user_id)?;

        if let Some(handle) = &handle {
            if current.handle.as_ref() != Some(handle) {
                let holders = users.query(&Query::new().filter("handle", handle.clone()))?;
                if holders.results.iter().any(|u| u.id != user_id) {
                    debug!(user_id, handle, "handle already taken");
                    return Err(AppError::conflict("Handle already taken"));
                }
            }
        }

        let display_name = request.display_name.or_else(|| current.display_name.clone());
        let handle = handle.or_else(|| current.handle.clone());
        let avatar = avatar.or_else(|| current.avatar.clone());

        let mut changes = Fields::new();
        if display_name != current.display_name {
            changes.set_opt("display_name", display_name.clone());
        }
        if handle != current.handle {
            changes.set_opt("handle", handle.clone());
        }
        if avatar != current.avatar {
            changes.set_opt("avatar", avatar.clone());
        }

        if !changes.is_empty() {
            let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
            info!(user_id, ?fields, "updating profile");
            users.patch(user_id, changes)?;
        }

        Ok(UserProfile {
            display_name,
            handle,
            avatar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::insert_user;

    fn setup() -> (Arc<Database>, ProfileService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        insert_user(&db, 1, Some("alice"));
        insert_user(&db, 2, Some("bob"));
        let service = ProfileService::new(db.clone());
        (db, service)
    }

    #[test]
    fn test_handle_rules() {
        assert!(is_valid_handle("alice"));
        assert!(is_valid_handle("_a1"));
        assert!(!is_valid_handle("1alice"));
        assert!(!is_valid_handle("al ice"));
        assert!(!is_valid_handle("al-ice"));
        assert!(!is_valid_handle(""));
    }

    #[test]
    fn test_get_profile_requires_session() {
        let (_db, service) = setup();
        assert!(matches!(
            service.get_profile(None),
            Err(AppError::Unauthenticated)
        ));
        let profile = service.get_profile(Some(&Session::new(1))).unwrap();
        assert_eq!(profile.handle.as_deref(), Some("alice"));
        assert_eq!(profile.display_name.as_deref(), Some("User 1"));
    }

    #[test]
    fn test_update_merges_over_previous_values() {
        let (_db, service) = setup();
        let session = Session::new(1);
        service
            .update_profile(
                Some(&session),
                UpdateUserProfile {
                    avatar: Some("/avatars/a.png".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = service
            .update_profile(
                Some(&session),
                UpdateUserProfile {
                    display_name: Some("Alice".into()),
                    handle: Some("  ".into()),
                    avatar: None,
                },
            )
            .unwrap();
        assert_eq!(
            updated,
            UserProfile {
                display_name: Some("Alice".into()),
                handle: Some("alice".into()),
                avatar: Some("/avatars/a.png".into()),
            }
        );
        assert_eq!(service.get_profile(Some(&session)).unwrap(), updated);
    }

    #[test]
    fn test_new_unique_handle_is_persisted() {
        let (_db, service) = setup();
        let session = Session::new(1);
        let updated = service
            .update_profile(
                Some(&session),
                UpdateUserProfile {
                    handle: Some("alice_2".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.handle.as_deref(), Some("alice_2"));
        assert_eq!(updated.display_name.as_deref(), Some("User 1"));
        assert_eq!(
            service.get_profile(Some(&session)).unwrap().handle.as_deref(),
            Some("alice_2")
        );
    }

    #[test]
    fn test_taken_handle_conflicts_without_mutation() {
        let (_db, service) = setup();
        let session = Session::new(1);
        let before = service.get_profile(Some(&session)).unwrap();
        let err = service
            .update_profile(
                Some(&session),
                UpdateUserProfile {
                    display_name: Some("Changed".into()),
                    handle: Some("bob".into()),
                    avatar: Some("x.png".into()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(service.get_profile(Some(&session)).unwrap(), before);
    }

    #[test]
    fn test_keeping_own_handle_is_not_a_conflict() {
        let (_db, service) = setup();
        let updated = service
            .update_profile(
                Some(&Session::new(1)),
                UpdateUserProfile {
                    handle: Some("alice".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.handle.as_deref(), Some("alice"));
    }

    #[test]
    fn test_illegal_handle_fails_before_lookup() {
        let (db, service) = setup();
        // No such user: a lookup would report NotFound, validation must win.
        let err = service
            .update_profile(
                Some(&Session::new(99)),
                UpdateUserProfile {
                    handle: Some("9lives".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.field_name(), Some("handle"));

        let err = service
            .update_profile(
                Some(&Session::new(1)),
                UpdateUserProfile {
                    handle: Some("has space".into()),
                    display_name: Some("Changed".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        let user = db.repo::<AppUser>().get(1).unwrap().unwrap();
        assert_eq!(user.display_name.as_deref(), Some("User 1"));
    }
}
