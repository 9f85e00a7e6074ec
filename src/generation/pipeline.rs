//! Creative submission: resolve the prompt, render, store the files, record the rows.

use std::sync::Arc;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::database::entity::{validate_fields, WriteMode};
use crate::database::{crud, Database, Entity, Fields, FieldsExt, IntoFields, Query};
use crate::generation::provider::{GenerationRequest, ImageGenerator};
use crate::ingest::hasher::content_file_name;
use crate::media::mimetype::{detect_mimetype, extension_for, is_image, probe_dimensions};
use crate::models::{
    Artist, Creative, CreativeArtifact, CreativeArtist, CreativeModifier, Modifier, NewArtifact,
    NewCreative, NewJoin, Session,
};
use crate::services::require_session;
use crate::storage::{StoredFile, UploadLocation};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreativeSubmission {
    pub user_prompt: String,
    #[serde(default)]
    pub artist_ids: Vec<i64>,
    #[serde(default)]
    pub modifier_ids: Vec<i64>,
    pub image_basis_path: Option<String>,
    pub images: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub seed: Option<u64>,
}

/// User prompt, then modifier names, then the artists it is inspired by.
pub fn resolve_prompt(user_prompt: &str, modifiers: &[Modifier], artists: &[Artist]) -> String {
    let mut parts = vec![user_prompt.trim().to_string()];
    parts.extend(modifiers.iter().map(|m| m.name.clone()));
    parts.extend(artists.iter().map(|a| format!("inspired by {}", a.full_name())));
    parts.join(", ")
}

fn int_field(fields: &Fields, name: &str) -> u32 {
    match fields.get(name) {
        Some(Value::Integer(v)) => u32::try_from(*v).unwrap_or(0),
        _ => 0,
    }
}

struct StagedArtifact {
    file: StoredFile,
    /// False when identical content was already stored by an earlier submission.
    created: bool,
    content_type: String,
    width: u32,
    height: u32,
    seed: u64,
}

pub struct GenerationPipeline {
    db: Arc<Database>,
    uploads: UploadLocation,
    generator: Arc<dyn ImageGenerator>,
}

impl GenerationPipeline {
    pub fn new(db: Arc<Database>, uploads: UploadLocation, generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            db,
            uploads,
            generator,
        }
    }

    fn load_tags<E: Entity>(&self, ids: &[i64], field: &str) -> AppResult<Vec<E>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = self.db.repo::<E>().query(&Query::new().ids(ids.iter().copied()))?;
        if let Some(missing) = ids.iter().find(|id| !found.results.iter().any(|r| r.id() == **id)) {
            return Err(AppError::validation(
                field,
                format!("{} {missing} does not exist", E::SCHEMA.table),
            ));
        }
        Ok(found.results)
    }

    async fn discard(&self, staged: &[StagedArtifact]) {
        for artifact in staged.iter().filter(|a| a.created) {
            if let Err(e) = self.uploads.remove(&artifact.file.file_path).await {
                warn!("Failed to remove orphaned upload {}: {}", artifact.file.file_path, e);
            }
        }
    }

    /// Nothing is written to the store unless every image was rendered and uploaded.
    pub async fn submit(
        &self,
        session: Option<&Session>,
        request: CreativeSubmission,
    ) -> AppResult<Creative> {
        let session = require_session(session)?;
        let draft = NewCreative {
            owner_id: session.user_id,
            user_prompt: request.user_prompt.clone(),
            prompt: None,
            image_basis_path: request.image_basis_path.clone(),
            images: request.images,
            width: request.width,
            height: request.height,
            steps: request.steps,
            seed: request.seed,
        };
        let defaults = validate_fields(&Creative::SCHEMA, draft.clone().into_fields(), WriteMode::Create)?;

        let artists: Vec<Artist> = self.load_tags(&request.artist_ids, "artist_ids")?;
        let modifiers: Vec<Modifier> = self.load_tags(&request.modifier_ids, "modifier_ids")?;
        let prompt = resolve_prompt(&request.user_prompt, &modifiers, &artists);

        let generation = GenerationRequest {
            prompt: prompt.clone(),
            width: int_field(&defaults, "width"),
            height: int_field(&defaults, "height"),
            steps: int_field(&defaults, "steps"),
            images: int_field(&defaults, "images"),
            seed: request.seed,
        };
        info!(
            provider = self.generator.name(),
            user_id = session.user_id,
            images = generation.images,
            "Generating creative"
        );
        let images = self.generator.generate(&generation).await?;
        if images.is_empty() {
            return Err(AppError::provider("provider returned no images"));
        }

        let mut staged = Vec::with_capacity(images.len());
        for image in images {
            let content_type = detect_mimetype(&image.bytes);
            if !is_image(&content_type) {
                self.discard(&staged).await;
                return Err(AppError::provider(format!(
                    "provider returned {content_type} instead of an image"
                )));
            }
            let (width, height) = if image.width > 0 && image.height > 0 {
                (image.width, image.height)
            } else {
                probe_dimensions(&image.bytes).unwrap_or((generation.width, generation.height))
            };
            let file_name = content_file_name(&image.bytes, extension_for(&content_type));
            let existed = match self.uploads.exists(&file_name).await {
                Ok(existed) => existed,
                Err(e) => {
                    self.discard(&staged).await;
                    return Err(e);
                }
            };
            let file = match self.uploads.upload(&file_name, &image.bytes).await {
                Ok(file) => file,
                Err(e) => {
                    self.discard(&staged).await;
                    return Err(e);
                }
            };
            staged.push(StagedArtifact {
                file,
                created: !existed,
                content_type,
                width,
                height,
                seed: image.seed,
            });
        }

        let committed = self.db.transaction(|tx| {
            let mut fields = draft.into_fields();
            fields.set("prompt", prompt.clone());
            let creative = crud::create::<Creative>(tx, fields)?;

            for artist in &artists {
                crud::create::<CreativeArtist>(
                    tx,
                    NewJoin::new(creative.id, artist.id).into_fields_for("artist_id"),
                )?;
            }
            for modifier in &modifiers {
                crud::create::<CreativeModifier>(
                    tx,
                    NewJoin::new(creative.id, modifier.id).into_fields_for("modifier_id"),
                )?;
            }

            let mut primary = None;
            for artifact in &staged {
                let row = crud::create::<CreativeArtifact>(
                    tx,
                    NewArtifact {
                        creative_id: creative.id,
                        file_name: artifact.file.file_name.clone(),
                        file_path: artifact.file.file_path.clone(),
                        content_type: artifact.content_type.clone(),
                        content_length: artifact.file.content_length,
                        width: artifact.width,
                        height: artifact.height,
                        seed: artifact.seed,
                        prompt: prompt.clone(),
                    }
                    .into_fields(),
                )?;
                primary.get_or_insert(row.id);
            }

            let mut fields = Fields::new();
            fields.set("primary_artifact_id", primary);
            crud::patch::<Creative>(tx, creative.id, fields)
        });

        match committed {
            Ok(creative) => {
                info!(
                    creative_id = creative.id,
                    artifacts = creative.artifacts.len(),
                    "Creative stored"
                );
                Ok(creative)
            }
            Err(e) => {
                error!("Failed to record creative: {}", e);
                self.discard(&staged).await;
                Err(e)
            }
        }
    }
}
