//! Lighting-effect endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use lightboard_common::api::MessageResponse;
use lightboard_common::devices::DeviceId;
use lightboard_common::effects::{EffectId, LightingEffect, LightingEffectPatch};
use serde::Deserialize;

use super::super::errors::ResponseError;
use crate::catalog::Catalog;
use crate::effects::{EffectRunner, Playback, PlaybackKey};

#[allow(clippy::unused_async)]
pub(crate) async fn list(
    State(catalog): State<Arc<dyn Catalog>>,
) -> Json<Vec<LightingEffect>> {
    Json(catalog.light_effects())
}

#[allow(clippy::unused_async)]
pub(crate) async fn create(
    State(catalog): State<Arc<dyn Catalog>>,
    Json(effect): Json<LightingEffect>,
) -> Result<Json<LightingEffect>, ResponseError> {
    let mut problems = Vec::new();
    if effect.name.trim().is_empty() {
        problems.push("name must not be empty".to_string());
    }
    if let Err(errors) = effect.script.validate() {
        problems.extend(errors);
    }
    if !problems.is_empty() {
        return Err(ResponseError::Validation(problems));
    }
    Ok(Json(catalog.add_light_effect(effect)))
}

#[allow(clippy::unused_async)]
pub(crate) async fn update(
    Path(id): Path<EffectId>,
    State(catalog): State<Arc<dyn Catalog>>,
    Json(patch): Json<LightingEffectPatch>,
) -> Result<Json<LightingEffect>, ResponseError> {
    if let Some(script) = &patch.script {
        script.validate().map_err(ResponseError::Validation)?;
    }
    Ok(Json(catalog.update_light_effect(id, patch)?))
}

#[allow(clippy::unused_async)]
pub(crate) async fn remove(
    Path(id): Path<EffectId>,
    State(catalog): State<Arc<dyn Catalog>>,
) -> Result<Json<MessageResponse>, ResponseError> {
    catalog.remove_light_effect(id)?;
    Ok(Json(MessageResponse::new("Light effect removed")))
}

/// The apply body: an optional loop override and an optional explicit
/// target list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApplyRequest {
    loop_count: Option<i64>,
    #[serde(default)]
    device_ids: Option<Vec<DeviceId>>,
}

#[allow(clippy::unused_async)]
pub(crate) async fn apply(
    Path(id): Path<EffectId>,
    State(catalog): State<Arc<dyn Catalog>>,
    State(runner): State<Arc<EffectRunner>>,
    body: Option<Json<ApplyRequest>>,
) -> Result<Json<MessageResponse>, ResponseError> {
    let effect = catalog
        .light_effect(id)
        .ok_or_else(|| ResponseError::not_found("light effect"))?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let targets = request.device_ids.unwrap_or_default();
    let devices = runner.start(&Playback::from_effect(&effect), &targets, request.loop_count)?;

    Ok(Json(MessageResponse::new(format!(
        "Effect `{}` started on {} devices",
        effect.name,
        devices.len()
    ))))
}

#[allow(clippy::unused_async)]
pub(crate) async fn stop(
    Path(id): Path<EffectId>,
    State(runner): State<Arc<EffectRunner>>,
) -> Json<MessageResponse> {
    runner.stop(PlaybackKey::Effect(id), None);
    Json(MessageResponse::new("Effect stopped"))
}
