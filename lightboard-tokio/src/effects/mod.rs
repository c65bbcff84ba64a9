//! The effect runtime: a per-device scheduler that plays scripted steps
//! against bulbs, with cancellation and state restore.
//!
//! Each playing device gets one [`session`] holding a generation counter,
//! a cancel token and a restore snapshot. At most one session is active per
//! device; starting a new one supersedes the old, inheriting its snapshot
//! so a chain of supersessions always restores to the state before the
//! first of the chain.

pub mod session;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lightboard_common::devices::{Device, DeviceId};
use lightboard_common::effects::{EffectId, LightingEffect, Script, Step};
use lightboard_common::lights::HSBK;
use lightboard_common::scenes::{DeviceOverride, Scene, SceneId};
use lightboard_common::websocket::{EffectTriggered, PushEvent};
use thiserror::Error;
use tracing::info;

use crate::lifx::transport::TransportError;
use crate::pipes::stateless;
use crate::registry::DeviceRegistry;

pub use session::Sessions;

/// How long a static scene's transition takes, in milliseconds.
const SCENE_TRANSITION_MS: u64 = 1000;

/// An error from the effect runtime.
#[derive(Debug, Error)]
pub enum EffectError {
    /// No adopted online device matched the requested targets.
    #[error("no target devices")]
    NoTargets,

    /// The script violates an invariant (step count, durations, colors).
    #[error("invalid script: {0:?}")]
    InvalidScript(Vec<String>),

    /// The playback source has nothing to play.
    #[error("nothing to play")]
    NothingToPlay,
}

/// An error emitting a frame to a device.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The send budget was exhausted; the device misses this step.
    #[error("rate limited")]
    RateLimited,

    /// The transport is down; sends fail until it reconnects.
    #[error("transport down")]
    TransportDown,

    /// The send failed for another reason.
    #[error("send failed: {0}")]
    Failed(String),
}

impl From<TransportError> for SinkError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RateLimited(_) => SinkError::RateLimited,
            TransportError::TransportDown => SinkError::TransportDown,
            err => SinkError::Failed(err.to_string()),
        }
    }
}

/// Where the runtime's frames go. The transport implements this; tests
/// substitute a recorder.
#[async_trait]
pub trait LightSink: Send + Sync {
    /// Drive the device to a color over a transition time.
    async fn set_color(&self, device: &Device, color: HSBK, duration_ms: u32)
        -> Result<(), SinkError>;

    /// Switch the device power over a transition time.
    async fn set_power(&self, device: &Device, on: bool, duration_ms: u32)
        -> Result<(), SinkError>;
}

/// Identity of a playback source; a session is keyed by (device, key).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PlaybackKey {
    /// A lighting effect from the catalog.
    Effect(EffectId),

    /// A scene from the catalog.
    Scene(SceneId),
}

/// When the pre-session snapshot is restored.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RestorePolicy {
    /// Restore on natural completion and on stop (lighting effects).
    Always,

    /// Restore only on stop; the natural end state is the point (scenes).
    OnCancel,
}

/// A resolved thing to play: the script plus its policies.
#[derive(Debug, Clone)]
pub struct Playback {
    /// Session identity.
    pub key: PlaybackKey,

    /// Name, for the push taxonomy.
    pub name: String,

    /// When to restore the snapshot.
    pub restore: RestorePolicy,

    /// Power on devices that are off before step 1.
    pub turn_on_if_off: bool,

    /// The script to play.
    pub script: Script,

    /// Per-device overrides (scenes only).
    pub overrides: Option<BTreeMap<DeviceId, DeviceOverride>>,
}

impl Playback {
    /// Playback of a lighting effect.
    #[must_use]
    pub fn from_effect(effect: &LightingEffect) -> Self {
        Self {
            key: PlaybackKey::Effect(effect.id),
            name: effect.name.clone(),
            restore: RestorePolicy::Always,
            turn_on_if_off: false,
            script: effect.script.clone(),
            overrides: None,
        }
    }

    /// Playback of a scene: its step script when it has one, otherwise a
    /// single step built from its static configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::NothingToPlay`] when the scene has neither a
    /// script nor a configuration.
    pub fn from_scene(scene: &Scene) -> Result<Self, EffectError> {
        let script = if let Some(script) = &scene.script {
            script.clone()
        } else if let Some(config) = &scene.configuration {
            Script {
                looped: false,
                loop_count: None,
                global_delay: 0,
                steps: vec![Step {
                    brightness: config.brightness.unwrap_or(100),
                    color: config.color.clone(),
                    temperature: config.color.is_none().then(|| config.temperature.unwrap_or(3500)),
                    duration: SCENE_TRANSITION_MS,
                    easing: Some(lightboard_common::effects::Easing {
                        kind: lightboard_common::effects::EasingKind::Linear,
                        duration: SCENE_TRANSITION_MS,
                    }),
                    device_ids: None,
                }],
            }
        } else {
            return Err(EffectError::NothingToPlay);
        };

        Ok(Self {
            key: PlaybackKey::Scene(scene.id),
            name: scene.name.clone(),
            restore: RestorePolicy::OnCancel,
            turn_on_if_off: scene.turn_on_if_off,
            script,
            overrides: scene.device_settings.clone(),
        })
    }

    /// The script one device will play: the shared script with this
    /// device's override applied to every step it participates in.
    fn script_for_device(&self, id: DeviceId) -> Script {
        let Some(over) = self.overrides.as_ref().and_then(|map| map.get(&id)) else {
            return self.script.clone();
        };

        let mut script = self.script.clone();
        for step in &mut script.steps {
            if !step.applies_to(id) {
                continue;
            }
            if let Some(color) = &over.color {
                step.color = Some(color.clone());
            }
            if let Some(brightness) = over.brightness {
                step.brightness = brightness;
            }
        }
        script
    }
}

/// The per-device scheduler.
pub struct EffectRunner {
    sink: Arc<dyn LightSink>,
    registry: Arc<DeviceRegistry>,
    sessions: Arc<Sessions>,
    push: stateless::Sender<PushEvent>,
}

impl EffectRunner {
    /// Wire up a runner.
    #[must_use]
    pub fn new(
        sink: Arc<dyn LightSink>,
        registry: Arc<DeviceRegistry>,
        push: stateless::Sender<PushEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sink,
            registry,
            sessions: Sessions::new(),
            push,
        })
    }

    /// The session table, for the poller's active-session suppression.
    #[must_use]
    pub fn sessions(&self) -> Arc<Sessions> {
        self.sessions.clone()
    }

    /// Start playback on the requested devices.
    ///
    /// Validates the script, resolves targets (an empty list means every
    /// adopted online device, an explicit list is intersected with that
    /// set), then spawns one session per target and returns immediately.
    /// Per-target failures after this point are isolated and logged.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::InvalidScript`] or [`EffectError::NoTargets`].
    pub fn start(
        &self,
        playback: &Playback,
        device_ids: &[DeviceId],
        loop_override: Option<i64>,
    ) -> Result<Vec<DeviceId>, EffectError> {
        playback
            .script
            .validate()
            .map_err(EffectError::InvalidScript)?;
        if loop_override.is_some_and(|n| n < 0) {
            return Err(EffectError::InvalidScript(vec![
                "loopCount must not be negative".to_string(),
            ]));
        }

        let targets: Vec<Device> = self
            .registry
            .list()
            .into_iter()
            .filter(|d| d.is_adopted && d.is_online)
            .filter(|d| device_ids.is_empty() || device_ids.contains(&d.id))
            .collect();
        if targets.is_empty() {
            return Err(EffectError::NoTargets);
        }

        let loops = playback.script.effective_loop_count(loop_override);
        info!(
            "starting `{}` on {} devices (loops: {loops})",
            playback.name,
            targets.len()
        );

        let mut started = Vec::with_capacity(targets.len());
        for device in targets {
            let id = device.id;
            let ctx = session::SessionCtx {
                sink: self.sink.clone(),
                registry: self.registry.clone(),
                sessions: self.sessions.clone(),
                device,
                key: playback.key,
                script: playback.script_for_device(id),
                loops,
                restore: playback.restore,
                turn_on_if_off: playback.turn_on_if_off,
            };
            // A raw spawn: a panicking session must not take the process
            // down, and the worker contains its own panics.
            tokio::spawn(session::run(ctx));

            // Scene starts are announced once by the caller instead.
            if matches!(playback.key, PlaybackKey::Effect(_)) {
                self.push
                    .try_send(PushEvent::LightEffectTriggered(EffectTriggered {
                        device_id: id,
                        effect: playback.name.clone(),
                    }));
            }
            started.push(id);
        }

        Ok(started)
    }

    /// Stop sessions for one playback source, optionally restricted to the
    /// given devices. Each stopped session restores its snapshot.
    pub fn stop(&self, key: PlaybackKey, device_ids: Option<&[DeviceId]>) {
        let macs = device_ids.map(|ids| self.macs_for(ids));
        self.sessions.cancel_matching(Some(key), macs.as_deref());
    }

    /// Stop every session, optionally restricted to the given devices.
    pub fn stop_all(&self, device_ids: Option<&[DeviceId]>) {
        let macs = device_ids.map(|ids| self.macs_for(ids));
        self.sessions.cancel_matching(None, macs.as_deref());
    }

    /// Cancel all sessions and wait for their restores, bounded by the
    /// drain deadline. Used at process shutdown.
    pub async fn shutdown(&self, drain: Duration) {
        self.sessions.shutdown(drain).await;
    }

    fn macs_for(&self, ids: &[DeviceId]) -> Vec<lightboard_common::devices::MacAddress> {
        ids.iter()
            .filter_map(|id| self.registry.get(*id))
            .map(|d| d.mac)
            .collect()
    }
}
