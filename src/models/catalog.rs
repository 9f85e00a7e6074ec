//! Reusable style tags attached to creatives.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::database::entity::{json_column, Entity, EntitySchema, FieldRule, FieldSpec, Fields, FieldsExt, IntoFields};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: String,
    pub year_died: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<Vec<String>>,
}

impl Artist {
    pub fn full_name(&self) -> String {
        match &self.first_name {
            Some(first) if !first.trim().is_empty() => format!("{} {}", first.trim(), self.last_name),
            _ => self.last_name.clone(),
        }
    }
}

impl Entity for Artist {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "artists",
        fields: &[
            FieldSpec::optional("first_name"),
            FieldSpec::required("last_name").rule(FieldRule::NotEmpty),
            FieldSpec::optional("year_died"),
            FieldSpec::optional("type"),
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
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            year_died: row.get("year_died")?,
            kind: json_column(row, "type")?,
        })
    }
}

fn kind_to_sql(kind: Option<Vec<String>>) -> Option<String> {
    kind.and_then(|k| serde_json::to_string(&k).ok())
}

/// Create and patch share a shape: on patch, `None` leaves the column alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub year_died: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<Vec<String>>,
}

impl IntoFields for ArtistFields {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields
            .set_opt("first_name", self.first_name)
            .set_opt("last_name", self.last_name)
            .set_opt("year_died", self.year_died)
            .set_opt("type", kind_to_sql(self.kind));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
}

impl Entity for Modifier {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "modifiers",
        fields: &[
            FieldSpec::required("name").rule(FieldRule::NotEmpty),
            FieldSpec::required("category").rule(FieldRule::NotEmpty),
            FieldSpec::optional("description"),
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
            name: row.get("name")?,
            category: row.get("category")?,
            description: row.get("description")?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModifierFields {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl IntoFields for ModifierFields {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields
            .set_opt("name", self.name)
            .set_opt("category", self.category)
            .set_opt("description", self.description);
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn test_artist_round_trip_keeps_type_tags() {
        let db = Database::open_in_memory().unwrap();
        let created: Artist = db
            .repo::<Artist>()
            .create(
                ArtistFields {
                    first_name: Some("Claude".into()),
                    last_name: Some("Monet".into()),
                    year_died: Some(1926),
                    kind: Some(vec!["Impressionism".into()]),
                }
                .into_fields(),
            )
            .unwrap();
        assert_eq!(created.full_name(), "Claude Monet");
        assert_eq!(created.kind, Some(vec!["Impressionism".to_string()]));
    }

    #[test]
    fn test_modifier_requires_category() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .repo::<Modifier>()
            .create(
                ModifierFields {
                    name: Some("Vivid".into()),
                    ..Default::default()
                }
                .into_fields(),
            )
            .unwrap_err();
        assert_eq!(err.field_name(), Some("category"));
    }
}
