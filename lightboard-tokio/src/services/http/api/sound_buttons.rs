//! Sound-button endpoints. Creation is a multipart upload: the audio bytes
//! plus a JSON metadata part, stored atomically.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use lightboard_common::api::MessageResponse;
use lightboard_common::buttons::{EffectRef, SoundButton, SoundButtonId, SoundButtonMetadata};
use tracing::error;

use super::super::errors::ResponseError;
use crate::catalog::Catalog;
use crate::services::audio::AudioStore;

#[allow(clippy::unused_async)]
pub(crate) async fn list(
    State(catalog): State<Arc<dyn Catalog>>,
) -> Json<Vec<SoundButton>> {
    Json(catalog.sound_buttons())
}

pub(crate) async fn create(
    State(catalog): State<Arc<dyn Catalog>>,
    State(audio): State<Arc<AudioStore>>,
    mut multipart: Multipart,
) -> Result<Json<SoundButton>, ResponseError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut metadata: Option<SoundButtonMetadata> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ResponseError::bad_request(format!("bad multipart body: {err}")))?
    {
        match field.name() {
            Some("audioFile") => {
                let filename = field.file_name().unwrap_or("audio.mp3").to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    ResponseError::bad_request(format!("failed to read audioFile: {err}"))
                })?;
                file = Some((filename, bytes));
            }
            Some("metadata") => {
                let text = field.text().await.map_err(|err| {
                    ResponseError::bad_request(format!("failed to read metadata: {err}"))
                })?;
                let parsed: SoundButtonMetadata = serde_json::from_str(&text).map_err(|err| {
                    ResponseError::Validation(vec![format!("invalid metadata: {err}")])
                })?;
                metadata = Some(parsed);
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ResponseError::Validation(vec!["audioFile part is required".into()]))?;
    let metadata =
        metadata.ok_or_else(|| ResponseError::Validation(vec!["metadata part is required".into()]))?;

    let mut problems = Vec::new();
    if metadata.name.trim().is_empty() {
        problems.push("name must not be empty".to_string());
    }
    if metadata.volume > 100 {
        problems.push("volume must be between 0 and 100".to_string());
    }
    if let EffectRef::Effect(effect_id) = metadata.light_effect {
        if catalog.light_effect(effect_id).is_none() {
            problems.push(format!("lightEffect {effect_id} does not exist"));
        }
    }
    if !problems.is_empty() {
        return Err(ResponseError::Validation(problems));
    }

    let name = audio.store(&filename, &bytes).await?;
    let button = catalog.add_sound_button(metadata, name);
    Ok(Json(button))
}

pub(crate) async fn remove(
    Path(id): Path<SoundButtonId>,
    State(catalog): State<Arc<dyn Catalog>>,
    State(audio): State<Arc<AudioStore>>,
) -> Result<Json<MessageResponse>, ResponseError> {
    let button = catalog.remove_sound_button(id)?;
    if let Err(err) = audio.remove(&button.audio_file).await {
        // The record is gone either way; an orphaned blob is only noise.
        error!("failed to delete blob `{}`: {err}", button.audio_file);
    }
    Ok(Json(MessageResponse::new("Sound button removed")))
}
