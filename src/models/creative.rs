use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::database::entity::{
    Entity, EntitySchema, FieldDefault, FieldRule, FieldSpec, Fields, FieldsExt, IntoFields,
};

pub const DEFAULT_IMAGES: u32 = 4;
pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_STEPS: u32 = 50;

/// One generation session and everything it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creative {
    pub id: i64,
    pub owner_id: i64,
    pub user_prompt: String,
    pub prompt: String,
    pub image_basis_path: Option<String>,
    pub images: u32,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub seed: Option<u64>,
    pub primary_artifact_id: Option<i64>,
    pub created_at: String,
    pub deleted_at: Option<String>,
    #[serde(default)]
    pub artists: Vec<CreativeArtist>,
    #[serde(default)]
    pub modifiers: Vec<CreativeModifier>,
    #[serde(default)]
    pub artifacts: Vec<CreativeArtifact>,
}

impl Creative {
    pub fn primary_artifact(&self) -> Option<&CreativeArtifact> {
        let primary = self.primary_artifact_id?;
        self.artifacts.iter().find(|a| a.id == primary)
    }
}

// Seeds are u64 but SQLite integers are i64; they are stored bit-for-bit.
fn seed_to_sql(seed: u64) -> i64 {
    seed as i64
}

fn seed_from_sql(seed: i64) -> u64 {
    seed as u64
}

fn select_children<T>(
    conn: &Connection,
    table: &str,
    creative_id: i64,
    decode: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT * FROM {table} WHERE creative_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![creative_id], decode)?;
    rows.collect()
}

impl Entity for Creative {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "creatives",
        fields: &[
            FieldSpec::required("owner_id").references("app_users"),
            FieldSpec::required("user_prompt").rule(FieldRule::NotEmpty),
            FieldSpec::optional("prompt").default_to(FieldDefault::Text("")),
            FieldSpec::optional("image_basis_path"),
            FieldSpec::optional("images")
                .default_to(FieldDefault::Int(DEFAULT_IMAGES as i64))
                .rule(FieldRule::GreaterThan(0)),
            FieldSpec::optional("width")
                .default_to(FieldDefault::Int(DEFAULT_WIDTH as i64))
                .rule(FieldRule::GreaterThan(0)),
            FieldSpec::optional("height")
                .default_to(FieldDefault::Int(DEFAULT_HEIGHT as i64))
                .rule(FieldRule::GreaterThan(0)),
            FieldSpec::optional("steps")
                .default_to(FieldDefault::Int(DEFAULT_STEPS as i64))
                .rule(FieldRule::GreaterThan(0)),
            FieldSpec::optional("seed"),
            FieldSpec::optional("primary_artifact_id").references("creative_artifacts"),
        ],
        read_only: &["created_at"],
        soft_delete: true,
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let seed: Option<i64> = row.get("seed")?;
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            user_prompt: row.get("user_prompt")?,
            prompt: row.get("prompt")?,
            image_basis_path: row.get("image_basis_path")?,
            images: row.get("images")?,
            width: row.get("width")?,
            height: row.get("height")?,
            steps: row.get("steps")?,
            seed: seed.map(seed_from_sql),
            primary_artifact_id: row.get("primary_artifact_id")?,
            created_at: row.get("created_at")?,
            deleted_at: row.get("deleted_at")?,
            artists: Vec::new(),
            modifiers: Vec::new(),
            artifacts: Vec::new(),
        })
    }

    fn load_references(conn: &Connection, rows: &mut [Self]) -> rusqlite::Result<()> {
        for creative in rows.iter_mut() {
            creative.artists =
                select_children(conn, "creative_artists", creative.id, CreativeArtist::from_row)?;
            creative.modifiers =
                select_children(conn, "creative_modifiers", creative.id, CreativeModifier::from_row)?;
            creative.artifacts =
                select_children(conn, "creative_artifacts", creative.id, CreativeArtifact::from_row)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCreative {
    pub owner_id: i64,
    pub user_prompt: String,
    pub prompt: Option<String>,
    pub image_basis_path: Option<String>,
    pub images: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub seed: Option<u64>,
}

impl IntoFields for NewCreative {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields
            .set("owner_id", self.owner_id)
            .set("user_prompt", self.user_prompt)
            .set_opt("prompt", self.prompt)
            .set_opt("image_basis_path", self.image_basis_path)
            .set_opt("images", self.images)
            .set_opt("width", self.width)
            .set_opt("height", self.height)
            .set_opt("steps", self.steps)
            .set_opt("seed", self.seed.map(seed_to_sql));
        fields
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCreative {
    pub user_prompt: Option<String>,
    pub prompt: Option<String>,
    pub image_basis_path: Option<String>,
    pub primary_artifact_id: Option<i64>,
}

impl IntoFields for UpdateCreative {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields
            .set_opt("user_prompt", self.user_prompt)
            .set_opt("prompt", self.prompt)
            .set_opt("image_basis_path", self.image_basis_path)
            .set_opt("primary_artifact_id", self.primary_artifact_id);
        fields
    }
}

/// One generated image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeArtifact {
    pub id: i64,
    pub creative_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
    pub content_length: u64,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub prompt: String,
    pub high_res_artifact_id: Option<i64>,
}

impl Entity for CreativeArtifact {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "creative_artifacts",
        fields: &[
            FieldSpec::required("creative_id").references("creatives"),
            FieldSpec::required("file_name").rule(FieldRule::NotEmpty),
            FieldSpec::required("file_path").rule(FieldRule::NotEmpty),
            FieldSpec::required("content_type"),
            FieldSpec::required("content_length"),
            FieldSpec::required("width").rule(FieldRule::GreaterThan(0)),
            FieldSpec::required("height").rule(FieldRule::GreaterThan(0)),
            FieldSpec::required("seed"),
            FieldSpec::optional("prompt").default_to(FieldDefault::Text("")),
            FieldSpec::optional("high_res_artifact_id").references("creative_artifacts"),
        ],
        read_only: &[],
        soft_delete: false,
    };

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let content_length: i64 = row.get("content_length")?;
        let seed: i64 = row.get("seed")?;
        Ok(Self {
            id: row.get("id")?,
            creative_id: row.get("creative_id")?,
            file_name: row.get("file_name")?,
            file_path: row.get("file_path")?,
            content_type: row.get("content_type")?,
            content_length: content_length.max(0) as u64,
            width: row.get("width")?,
            height: row.get("height")?,
            seed: seed_from_sql(seed),
            prompt: row.get("prompt")?,
            high_res_artifact_id: row.get("high_res_artifact_id")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArtifact {
    pub creative_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
    pub content_length: u64,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub prompt: String,
}

impl IntoFields for NewArtifact {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields
            .set("creative_id", self.creative_id)
            .set("file_name", self.file_name)
            .set("file_path", self.file_path)
            .set("content_type", self.content_type)
            .set("content_length", self.content_length as i64)
            .set("width", self.width)
            .set("height", self.height)
            .set("seed", seed_to_sql(self.seed))
            .set("prompt", self.prompt);
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeArtist {
    pub id: i64,
    pub creative_id: i64,
    pub artist_id: i64,
}

impl Entity for CreativeArtist {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "creative_artists",
        fields: &[
            FieldSpec::required("creative_id")
                .rule(FieldRule::GreaterThan(0))
                .references("creatives"),
            FieldSpec::required("artist_id")
                .rule(FieldRule::GreaterThan(0))
                .references("artists"),
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
            creative_id: row.get("creative_id")?,
            artist_id: row.get("artist_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeModifier {
    pub id: i64,
    pub creative_id: i64,
    pub modifier_id: i64,
}

impl Entity for CreativeModifier {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "creative_modifiers",
        fields: &[
            FieldSpec::required("creative_id")
                .rule(FieldRule::GreaterThan(0))
                .references("creatives"),
            FieldSpec::required("modifier_id")
                .rule(FieldRule::GreaterThan(0))
                .references("modifiers"),
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
            creative_id: row.get("creative_id")?,
            modifier_id: row.get("modifier_id")?,
        })
    }
}

/// Join-row create request. Both ids are optional so the `> 0` rule reports
/// a missing id the same way as a zero one.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NewJoin {
    pub creative_id: Option<i64>,
    pub target_id: Option<i64>,
}

impl NewJoin {
    pub fn new(creative_id: i64, target_id: i64) -> Self {
        Self {
            creative_id: Some(creative_id),
            target_id: Some(target_id),
        }
    }

    pub fn into_fields_for(self, target_column: &str) -> Fields {
        let mut fields = Fields::new();
        fields
            .set("creative_id", self.creative_id.unwrap_or(0))
            .set(target_column, self.target_id.unwrap_or(0));
        fields
    }
}
