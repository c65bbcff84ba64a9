//! Serving stored audio bytes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use super::super::errors::ResponseError;
use crate::services::audio::AudioStore;

pub(crate) async fn fetch(
    Path(name): Path<String>,
    State(audio): State<Arc<AudioStore>>,
) -> Result<Response, ResponseError> {
    let bytes = audio.read(&name).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], bytes).into_response())
}
