//! Main entry point for the lightboard server.

#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod config;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lightboard_common::websocket::PushEvent;
use lightboard_tokio::catalog::{Catalog, MemoryCatalog};
use lightboard_tokio::effects::{EffectRunner, LightSink};
use lightboard_tokio::lifx::discovery;
use lightboard_tokio::lifx::transport::Transport;
use lightboard_tokio::pipes::stateless;
use lightboard_tokio::registry::{DeviceRegistry, RegistryEvent};
use lightboard_tokio::services::audio::AudioStore;
use lightboard_tokio::services::http;
use lightboard_tokio::spawn;
use tracing::info;

/// How long shutdown waits for session restores.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    color_backtrace::install();

    let environment = config::Environment::load()?;
    let config = environment.config()?;
    logging::init(&config.logging);

    info!("starting lightboard server");

    let catalog: Arc<dyn Catalog> = Arc::new(MemoryCatalog::with_defaults());
    let (push_tx, push_rx) = stateless::create_pipe::<PushEvent>("push");

    let (transport, lifx_events) = Transport::connect(config.lifx.transport_config()).await?;

    let (registry, registry_rx) = DeviceRegistry::new();
    let registry = Arc::new(registry);
    bridge_registry_events(registry_rx, push_tx.clone());

    let sink: Arc<dyn LightSink> = transport.clone();
    let runner = EffectRunner::new(sink, registry.clone(), push_tx.clone());

    let discovery = discovery::run(
        transport.clone(),
        registry.clone(),
        runner.sessions(),
        lifx_events,
        config.lifx.discovery_config(),
    );

    let audio = Arc::new(AudioStore::open(config.audio.directory.clone()).await?);

    let state = http::HttpState {
        registry,
        catalog,
        runner: runner.clone(),
        audio,
        transport,
        discovery,
        push_tx,
        push_rx,
    };
    http::run(state, config.http).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down; draining sessions");
    runner.shutdown(SHUTDOWN_DRAIN).await;

    Ok(())
}

/// Forward registry changes into the push taxonomy.
fn bridge_registry_events(
    registry_rx: stateless::Receiver<RegistryEvent>,
    push_tx: stateless::Sender<PushEvent>,
) {
    let rx = registry_rx.map(|event| match event {
        RegistryEvent::Discovered(device) => PushEvent::DeviceDiscovered(device),
        RegistryEvent::Updated(device) => PushEvent::DeviceStatus(device),
    });

    spawn(async move {
        let mut sub = rx.subscribe();
        while let Ok(event) = sub.recv().await {
            push_tx.try_send(event);
        }
    });
}
