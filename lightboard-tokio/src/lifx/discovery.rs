//! Discovery, state polling and liveness sweeping.
//!
//! Discovery is broadcast-only: a `GetService` probe goes out periodically
//! (and on user request), devices answer with `StateService`, and a
//! `GetLabel` unicast introduces each one to the registry. No address-range
//! sweeps; broadcast is sufficient on any LAN that forwards them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::msg::Message;
use super::transport::Transport;
use super::{LifxEvent, LIFX_PORT};
use crate::effects::Sessions;
use crate::pipes::stateless;
use crate::registry::DeviceRegistry;
use crate::spawn;

/// Timing for the periodic jobs.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Time between `GetService` broadcasts.
    pub discovery_interval: Duration,

    /// Time between per-device state polls.
    pub poll_interval: Duration,

    /// Time between liveness sweeps.
    pub sweep_interval: Duration,

    /// How long a silent device stays online.
    pub offline_grace: Duration,

    /// The port devices answer discovery from.
    pub device_port: u16,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_interval: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(10),
            offline_grace: Duration::from_secs(60),
            device_port: LIFX_PORT,
        }
    }
}

/// Trigger for user-initiated discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryHandle {
    tx: mpsc::Sender<()>,
}

impl DiscoveryHandle {
    /// Ask for a discovery broadcast now. A trigger while one is already
    /// queued is a no-op.
    pub fn trigger(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Start the discovery, poll, sweep and dispatch jobs.
#[must_use]
pub fn run(
    transport: Arc<Transport>,
    registry: Arc<DeviceRegistry>,
    sessions: Arc<Sessions>,
    events: stateless::Receiver<LifxEvent>,
    config: DiscoveryConfig,
) -> DiscoveryHandle {
    let (trigger_tx, trigger_rx) = mpsc::channel(1);

    spawn(run_discovery(
        transport.clone(),
        trigger_rx,
        config.discovery_interval,
    ));
    spawn(run_poll(
        transport.clone(),
        registry.clone(),
        sessions,
        config.clone(),
    ));
    spawn(run_sweep(registry.clone(), config.clone()));
    spawn(run_dispatcher(transport, registry, events, config));

    DiscoveryHandle { tx: trigger_tx }
}

async fn run_discovery(
    transport: Arc<Transport>,
    mut trigger: mpsc::Receiver<()>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        select! {
            _ = ticker.tick() => {}
            Some(()) = trigger.recv() => {}
        }

        debug!("Sending GetService");
        transport
            .broadcast(Message::GetService)
            .await
            .unwrap_or_else(|err| {
                error!("Error sending GetService: {err:?}");
            });
    }
}

async fn run_poll(
    transport: Arc<Transport>,
    registry: Arc<DeviceRegistry>,
    sessions: Arc<Sessions>,
    config: DiscoveryConfig,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);

    loop {
        ticker.tick().await;

        for device in registry.list() {
            // A playing session owns the device; polling it would fight
            // the effect.
            if sessions.is_active(device.mac) {
                continue;
            }
            let Some(ip) = device.ip else { continue };
            let addr = SocketAddr::new(ip, config.device_port);

            for message in [Message::GetPower, Message::GetColor] {
                if let Err(err) = transport.send_to(message, device.mac, addr).await {
                    debug!("poll of {} failed: {err}", device.mac);
                }
            }
        }
    }
}

async fn run_sweep(registry: Arc<DeviceRegistry>, config: DiscoveryConfig) {
    let mut ticker = tokio::time::interval(config.sweep_interval);

    loop {
        ticker.tick().await;
        registry.sweep(config.offline_grace);
    }
}

/// Turn inbound messages into registry updates.
async fn run_dispatcher(
    transport: Arc<Transport>,
    registry: Arc<DeviceRegistry>,
    events: stateless::Receiver<LifxEvent>,
    config: DiscoveryConfig,
) {
    let mut sub = events.subscribe();

    while let Ok(event) = sub.recv().await {
        match event.message {
            Message::StateService { service, port } => {
                // Service 1 is UDP; anything else is not for us.
                if service == 1 && port == u32::from(config.device_port) {
                    debug!("StateService from {} at {}", event.mac, event.addr);
                    if let Err(err) = transport
                        .send_to(Message::GetLabel, event.mac, event.addr)
                        .await
                    {
                        debug!("GetLabel to {} failed: {err}", event.mac);
                    }
                }
            }
            Message::StateLabel { label } => {
                registry.observe_label(event.mac, event.addr.ip(), label.as_str());
            }
            Message::LightState { color, power, .. } => {
                registry.observe_state(event.mac, event.addr.ip(), Some(power > 0), Some(color));
            }
            Message::StatePower { level } => {
                registry.observe_state(event.mac, event.addr.ip(), Some(level > 0), None);
            }
            _ => {}
        }
    }
}
