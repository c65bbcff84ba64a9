//! Playback sessions: one per playing device.
//!
//! A session moves through snapshot, play, restore. Stop is a first-class
//! cancel signal every wait in the worker races against; once it fires, no
//! further frames for the session are emitted and the restore runs. A
//! session superseded by a newer one on the same device skips its restore
//! and hands its snapshot to the successor instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lightboard_common::devices::{Device, MacAddress};
use lightboard_common::effects::Script;
use lightboard_common::lights::HSBK;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{LightSink, PlaybackKey, RestorePolicy};
use crate::registry::DeviceRegistry;

/// Pause between the restore's power and color frames, in milliseconds.
const RESTORE_POWER_SETTLE_MS: u64 = 100;

/// Transition time of the restore's color frame, in milliseconds.
const RESTORE_TRANSITION_MS: u32 = 500;

/// Device state captured before a session starts, used for restore.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Snapshot {
    /// Power before the session.
    pub power: bool,

    /// Color before the session.
    pub color: HSBK,
}

type SnapshotSlot = Arc<Mutex<Option<Snapshot>>>;

struct Active {
    key: PlaybackKey,
    generation: u64,
    cancel: CancellationToken,
    superseded: Arc<AtomicBool>,
    snapshot: SnapshotSlot,
    done: watch::Receiver<bool>,
}

/// The table of active sessions, keyed by device. Enforces at most one
/// session per device.
pub struct Sessions {
    inner: Mutex<HashMap<MacAddress, Active>>,
    next_generation: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Sessions {
    /// An empty session table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        })
    }

    /// Is a session active on this device? The poller suppresses state
    /// polls for active devices so they do not fight the effect.
    #[must_use]
    pub fn is_active(&self, mac: MacAddress) -> bool {
        lock(&self.inner).contains_key(&mac)
    }

    /// Cancel sessions matching the key (all keys when `None`) and device
    /// filter (all devices when `None`). Each cancelled worker runs its
    /// restore; a second stop for an ended session is a no-op.
    pub fn cancel_matching(&self, key: Option<PlaybackKey>, macs: Option<&[MacAddress]>) {
        let inner = lock(&self.inner);
        for (mac, active) in inner.iter() {
            if key.is_some_and(|k| k != active.key) {
                continue;
            }
            if macs.is_some_and(|macs| !macs.contains(mac)) {
                continue;
            }
            active.cancel.cancel();
        }
    }

    /// Cancel everything and wait for the workers to finish their restores,
    /// bounded by the drain deadline.
    pub async fn shutdown(&self, drain: Duration) {
        let watchers: Vec<watch::Receiver<bool>> = {
            let inner = lock(&self.inner);
            inner
                .values()
                .map(|active| {
                    active.cancel.cancel();
                    active.done.clone()
                })
                .collect()
        };

        let all_done = async {
            for mut done in watchers {
                while !*done.borrow() {
                    if done.changed().await.is_err() {
                        break;
                    }
                }
            }
        };
        if timeout(drain, all_done).await.is_err() {
            error!("session drain deadline hit; some restores were abandoned");
        }
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Install a new session for the device, returning the session it
    /// supersedes, if any.
    fn install(&self, mac: MacAddress, active: Active) -> Option<Active> {
        lock(&self.inner).insert(mac, active)
    }

    /// Remove the session if it is still the one with this generation.
    fn release(&self, mac: MacAddress, generation: u64) {
        let mut inner = lock(&self.inner);
        if inner.get(&mac).is_some_and(|a| a.generation == generation) {
            inner.remove(&mac);
        }
    }
}

/// Everything a session worker needs.
pub(super) struct SessionCtx {
    pub sink: Arc<dyn LightSink>,
    pub registry: Arc<DeviceRegistry>,
    pub sessions: Arc<Sessions>,
    pub device: Device,
    pub key: PlaybackKey,
    pub script: Script,
    pub loops: i64,
    pub restore: RestorePolicy,
    pub turn_on_if_off: bool,
}

/// The per-device session worker.
pub(super) async fn run(ctx: SessionCtx) {
    let mac = ctx.device.mac;
    let generation = ctx.sessions.next_generation();
    let cancel = CancellationToken::new();
    let superseded = Arc::new(AtomicBool::new(false));
    let snapshot_slot: SnapshotSlot = Arc::new(Mutex::new(None));
    let (done_tx, done_rx) = watch::channel(false);

    let prior = ctx.sessions.install(
        mac,
        Active {
            key: ctx.key,
            generation,
            cancel: cancel.clone(),
            superseded: superseded.clone(),
            snapshot: snapshot_slot.clone(),
            done: done_rx,
        },
    );

    // Supersede: cancel the prior session, wait for its worker to finish,
    // and take over its snapshot so a chain of supersessions restores to
    // the state before the first of the chain.
    let inherited = if let Some(prior) = prior {
        debug!("{mac}: superseding session {:?}", prior.key);
        prior.superseded.store(true, Ordering::SeqCst);
        prior.cancel.cancel();
        let mut done = prior.done.clone();
        while !*done.borrow() {
            if done.changed().await.is_err() {
                break;
            }
        }
        lock(&prior.snapshot).take()
    } else {
        None
    };

    let snapshot = match inherited {
        Some(snapshot) => snapshot,
        None => match ctx.registry.get_by_mac(mac) {
            Some(current) if current.is_online => Snapshot {
                power: current.power,
                color: current.color,
            },
            _ => {
                info!("{mac}: device offline, skipping this target");
                ctx.sessions.release(mac, generation);
                let _ = done_tx.send(true);
                return;
            }
        },
    };
    *lock(&snapshot_slot) = Some(snapshot);

    if ctx.turn_on_if_off && !snapshot.power {
        if let Err(err) = ctx.sink.set_power(&ctx.device, true, 0).await {
            debug!("{mac}: power-on before playback failed: {err}");
        }
    }

    // Play in an inner task so a panicking script cannot skip the restore.
    let play = {
        let sink = ctx.sink.clone();
        let cancel = cancel.clone();
        let device = ctx.device.clone();
        let script = ctx.script.clone();
        let loops = ctx.loops;
        tokio::spawn(async move { play_script(&*sink, &cancel, &device, &script, loops).await })
    };
    if let Err(err) = play.await {
        if err.is_panic() {
            error!("{mac}: effect worker panicked; running restore");
            cancel.cancel();
        }
    }

    if superseded.load(Ordering::SeqCst) {
        // A successor owns the device now; it inherits the snapshot left
        // in the slot. No restore.
        let _ = done_tx.send(true);
        return;
    }

    let should_restore = match ctx.restore {
        RestorePolicy::Always => true,
        RestorePolicy::OnCancel => cancel.is_cancelled(),
    };
    if should_restore {
        restore(&*ctx.sink, &ctx.registry, &ctx.device, snapshot).await;
    }

    *lock(&snapshot_slot) = None;
    ctx.sessions.release(mac, generation);
    let _ = done_tx.send(true);
}

/// Play the script until it completes or the cancel token fires.
async fn play_script(
    sink: &dyn LightSink,
    cancel: &CancellationToken,
    device: &Device,
    script: &Script,
    loops: i64,
) {
    if wait_or_cancel(cancel, Duration::from_millis(script.global_delay)).await {
        return;
    }

    let mut iteration: i64 = 0;
    loop {
        if loops != 0 && iteration >= loops {
            return;
        }

        for step in &script.steps {
            if !step.applies_to(device.id) {
                continue;
            }
            let Some(color) = step.resolve_color() else {
                continue;
            };
            if cancel.is_cancelled() {
                return;
            }
            if let Err(err) = sink.set_color(device, color, step.transition_ms()).await {
                // Dropped frames are not retried; the next step or the
                // next poll corrects divergence.
                debug!("{}: dropped SetColor: {err}", device.mac);
            }
            if wait_or_cancel(cancel, Duration::from_millis(step.duration)).await {
                return;
            }
        }

        iteration = iteration.saturating_add(1);
    }
}

/// Wait for the duration, returning true if the cancel token fired first.
async fn wait_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return cancel.is_cancelled();
    }
    select! {
        () = cancel.cancelled() => true,
        () = sleep(duration) => false,
    }
}

/// Put the device back the way the session found it. Best-effort: if the
/// device dropped offline the snapshot is dropped silently.
async fn restore(
    sink: &dyn LightSink,
    registry: &DeviceRegistry,
    device: &Device,
    snapshot: Snapshot,
) {
    if !registry
        .get_by_mac(device.mac)
        .is_some_and(|d| d.is_online)
    {
        debug!("{}: offline at restore time, snapshot dropped", device.mac);
        return;
    }

    if let Err(err) = sink.set_power(device, snapshot.power, 0).await {
        debug!("{}: restore SetPower dropped: {err}", device.mac);
    }
    sleep(Duration::from_millis(RESTORE_POWER_SETTLE_MS)).await;
    if let Err(err) = sink
        .set_color(device, snapshot.color, RESTORE_TRANSITION_MS)
        .await
    {
        debug!("{}: restore SetColor dropped: {err}", device.mac);
    }
}
