//! The browser-facing HTTP server and websocket push channel.

mod api;
mod errors;
mod websocket;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{delete, get, post, put};
use axum::Router;
use lightboard_common::websocket::PushEvent;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::catalog::Catalog;
use crate::effects::EffectRunner;
use crate::lifx::discovery::DiscoveryHandle;
use crate::lifx::transport::Transport;
use crate::pipes::stateless;
use crate::registry::DeviceRegistry;
use crate::services::audio::AudioStore;
use crate::spawn;

use self::websocket::websocket_handler;

/// Cap on sound-button uploads.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// The configuration for the HTTP service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The listener address, e.g. `0.0.0.0:3000`.
    pub listen_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// An error running the HTTP service.
#[derive(Error, Debug)]
pub enum HttpError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the handlers need, cloned per request.
#[derive(Clone, FromRef)]
pub struct HttpState {
    /// The device registry.
    pub registry: Arc<DeviceRegistry>,

    /// The catalog of buttons, scenes and effects.
    pub catalog: Arc<dyn Catalog>,

    /// The effect runtime.
    pub runner: Arc<EffectRunner>,

    /// The audio blob store.
    pub audio: Arc<AudioStore>,

    /// The LIFX transport, for direct device commands.
    pub transport: Arc<Transport>,

    /// Trigger for user-initiated discovery.
    pub discovery: DiscoveryHandle,

    /// Where push events are produced.
    pub push_tx: stateless::Sender<PushEvent>,

    /// Where websocket clients subscribe to push events.
    pub push_rx: stateless::Receiver<PushEvent>,
}

/// Run the HTTP service.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run(state: HttpState, config: Config) -> Result<(), HttpError> {
    let listener = TcpListener::bind(&config.listen_address).await?;
    info!("http listening on {:?}", listener.local_addr());

    let app = router(state);
    spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|err| {
            tracing::error!("http server failed: {err}");
        });
    });

    Ok(())
}

/// Build the router. Separated from [`run`] so tests can drive it without
/// a listener.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/devices", get(api::devices::list))
        .route("/api/devices/discover", post(api::devices::discover))
        .route("/api/devices/{id}", put(api::devices::update).delete(api::devices::remove))
        .route("/api/devices/{id}/power", post(api::devices::set_power))
        .route("/api/devices/{id}/color", post(api::devices::set_color))
        .route(
            "/api/sound-buttons",
            get(api::sound_buttons::list).post(api::sound_buttons::create),
        )
        .route("/api/sound-buttons/{id}", delete(api::sound_buttons::remove))
        .route("/api/audio/{name}", get(api::audio::fetch))
        .route("/api/scenes", get(api::scenes::list).post(api::scenes::create))
        .route(
            "/api/scenes/{id}",
            put(api::scenes::update).delete(api::scenes::remove),
        )
        .route("/api/scenes/{id}/apply", post(api::scenes::apply))
        .route(
            "/api/light-effects",
            get(api::light_effects::list).post(api::light_effects::create),
        )
        .route(
            "/api/light-effects/{id}",
            put(api::light_effects::update).delete(api::light_effects::remove),
        )
        .route("/api/light-effects/{id}/apply", post(api::light_effects::apply))
        .route("/api/light-effects/{id}/stop", post(api::light_effects::stop))
        .route("/ws", get(websocket_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
