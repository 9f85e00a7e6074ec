use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::database::entity::{json_column, Entity, EntitySchema, FieldSpec, Fields, FieldsExt, IntoFields};

pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_MODERATOR: &str = "Moderator";

/// An authenticated caller, as handed over by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Session {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.push(role.to_string());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }

    /// Admins moderate too.
    pub fn is_moderator(&self) -> bool {
        self.is_admin() || self.has_role(ROLE_MODERATOR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: i64,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub avatar: Option<String>,
    pub roles: Vec<String>,
}

impl Entity for AppUser {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "app_users",
        fields: &[
            FieldSpec::optional("email"),
            FieldSpec::optional("display_name"),
            FieldSpec::optional("handle"),
            FieldSpec::optional("avatar"),
            FieldSpec::optional("roles"),
        ],
        read_only: &[],
        soft_delete: false,
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            display_name: row.get("display_name")?,
            handle: row.get("handle")?,
            avatar: row.get("avatar")?,
            roles: json_column(row, "roles")?.unwrap_or_default(),
        })
    }
}

/// Registration data; normally written by the auth provider.
#[derive(Debug, Clone, Default)]
pub struct NewAppUser {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
}

impl IntoFields for NewAppUser {
    fn into_fields(self) -> Fields {
        let roles = serde_json::to_string(&self.roles).unwrap_or_else(|_| "[]".to_string());
        let mut fields = Fields::new();
        fields
            .set_opt("email", self.email)
            .set_opt("display_name", self.display_name)
            .set("roles", roles);
        fields
    }
}

/// The public projection of an [`AppUser`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub avatar: Option<String>,
}

impl From<&AppUser> for UserProfile {
    fn from(user: &AppUser) -> Self {
        Self {
            display_name: user.display_name.clone(),
            handle: user.handle.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// A user's favourite. Presence means liked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLike {
    pub id: i64,
    pub app_user_id: i64,
    pub artifact_id: i64,
    pub created_at: String,
}

impl Entity for ArtifactLike {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "artifact_likes",
        fields: &[
            FieldSpec::required("app_user_id").references("app_users"),
            FieldSpec::required("artifact_id").references("creative_artifacts"),
        ],
        read_only: &["created_at"],
        soft_delete: false,
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            app_user_id: row.get("app_user_id")?,
            artifact_id: row.get("artifact_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_moderator() {
        assert!(Session::new(1).with_role(ROLE_ADMIN).is_moderator());
        assert!(Session::new(1).with_role(ROLE_MODERATOR).is_moderator());
        assert!(!Session::new(1).with_role(ROLE_MODERATOR).is_admin());
        assert!(!Session::new(1).is_moderator());
    }
}
