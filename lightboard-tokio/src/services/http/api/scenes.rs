//! Scene endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use lightboard_common::api::MessageResponse;
use lightboard_common::scenes::{Scene, SceneId, ScenePatch};
use lightboard_common::websocket::{PushEvent, SceneApplied};

use super::super::errors::ResponseError;
use crate::catalog::Catalog;
use crate::effects::{EffectRunner, Playback};
use crate::pipes::stateless;

#[allow(clippy::unused_async)]
pub(crate) async fn list(State(catalog): State<Arc<dyn Catalog>>) -> Json<Vec<Scene>> {
    Json(catalog.scenes())
}

#[allow(clippy::unused_async)]
pub(crate) async fn create(
    State(catalog): State<Arc<dyn Catalog>>,
    Json(scene): Json<Scene>,
) -> Result<Json<Scene>, ResponseError> {
    validate(&scene)?;
    Ok(Json(catalog.add_scene(scene)))
}

#[allow(clippy::unused_async)]
pub(crate) async fn update(
    Path(id): Path<SceneId>,
    State(catalog): State<Arc<dyn Catalog>>,
    Json(patch): Json<ScenePatch>,
) -> Result<Json<Scene>, ResponseError> {
    if let Some(script) = &patch.script {
        script.validate().map_err(ResponseError::Validation)?;
    }
    Ok(Json(catalog.update_scene(id, patch)?))
}

#[allow(clippy::unused_async)]
pub(crate) async fn remove(
    Path(id): Path<SceneId>,
    State(catalog): State<Arc<dyn Catalog>>,
) -> Result<Json<MessageResponse>, ResponseError> {
    catalog.remove_scene(id)?;
    Ok(Json(MessageResponse::new("Scene removed")))
}

#[allow(clippy::unused_async)]
pub(crate) async fn apply(
    Path(id): Path<SceneId>,
    State(catalog): State<Arc<dyn Catalog>>,
    State(runner): State<Arc<EffectRunner>>,
    State(push): State<stateless::Sender<PushEvent>>,
) -> Result<Json<MessageResponse>, ResponseError> {
    let scene = catalog
        .scene(id)
        .ok_or_else(|| ResponseError::not_found("scene"))?;

    let playback = Playback::from_scene(&scene)?;
    let targets = scene.target_devices.unwrap_or_default();
    let devices = runner.start(&playback, &targets, None)?;

    push.try_send(PushEvent::SceneApplied(SceneApplied {
        scene_id: id,
        devices: devices.clone(),
    }));

    Ok(Json(MessageResponse::new(format!(
        "Scene `{}` applied to {} devices",
        scene.name,
        devices.len()
    ))))
}

fn validate(scene: &Scene) -> Result<(), ResponseError> {
    let mut problems = Vec::new();
    if scene.name.trim().is_empty() {
        problems.push("name must not be empty".to_string());
    }
    if let Some(script) = &scene.script {
        if let Err(errors) = script.validate() {
            problems.extend(errors);
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ResponseError::Validation(problems))
    }
}
