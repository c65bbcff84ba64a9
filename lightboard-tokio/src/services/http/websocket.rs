//! The push channel: every connected client receives every [`PushEvent`],
//! and may send a small set of commands back.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use lightboard_common::buttons::{EffectRef, SoundButtonId};
use lightboard_common::devices::DeviceId;
use lightboard_common::websocket::{PushEvent, SoundPlayed, WsCommand};
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::HttpState;
use crate::effects::Playback;

#[allow(clippy::unused_async)]
pub(super) async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<HttpState>,
) -> Response {
    debug!("Accessing websocket");
    ws.on_upgrade(|socket| websocket(socket, state))
}

async fn websocket(stream: WebSocket, state: HttpState) {
    // By splitting we can send and receive at the same time.
    let (mut sender, mut receiver) = stream.split();

    // We can't clone the sink, so a queue feeds it from the bridge task.
    let (tx, mut rx) = mpsc::unbounded_channel::<PushEvent>();

    // Fan push events into this client's queue. A slow client lags its
    // subscription; it never blocks the producers.
    let bridge_task = {
        let push_rx = state.push_rx.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut sub = push_rx.subscribe();
            loop {
                select! {
                    event = sub.recv() => {
                        let Ok(event) = event else { break };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    () = tx.closed() => break,
                }
            }
        })
    };

    let send_task = tokio::spawn(async move {
        debug!("send_task: starting");
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    error!("send_task: failed to serialize push event: {err}");
                    continue;
                }
            };
            if let Err(err) = sender.send(Message::Text(json.into())).await {
                debug!("send_task: client gone, stopping: {err}");
                break;
            }
        }
        debug!("send_task: stopping");
    });

    // Client commands. A disconnecting client never cancels in-flight
    // effects; sessions are fire-and-forget.
    let recv_task = {
        let state = state.clone();
        tokio::spawn(async move {
            debug!("recv_task: starting");
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => handle_command(&state, text.as_str()),
                    Ok(Message::Close(_)) => {
                        debug!("recv_task: received close message, stopping");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        debug!("recv_task: receive failed, stopping: {err}");
                        break;
                    }
                }
            }
            debug!("recv_task: stopping");
        })
    };

    let _rc = recv_task.await;
    send_task.abort();
    bridge_task.abort();
}

fn handle_command(state: &HttpState, text: &str) {
    match serde_json::from_str::<WsCommand>(text) {
        Ok(WsCommand::DiscoverDevices) => state.discovery.trigger(),
        Ok(WsCommand::PlaySound { button_id }) => play_sound(state, button_id),
        Ok(WsCommand::TriggerEffect {
            device_id,
            effect_type,
            duration: _,
        }) => trigger_effect(state, device_id, &effect_type),
        Err(err) => {
            // Unrecognized message types are ignored.
            debug!("ignoring websocket message: {err}");
        }
    }
}

/// Announce the sound to every client, then start the button's tied effect
/// on its target devices.
fn play_sound(state: &HttpState, button_id: SoundButtonId) {
    let Some(button) = state.catalog.sound_button(button_id) else {
        debug!("play_sound: unknown button {button_id}");
        return;
    };

    state.push_tx.try_send(PushEvent::SoundPlayed(SoundPlayed {
        button_id,
        timestamp: Utc::now().timestamp_millis(),
    }));

    if let EffectRef::Effect(effect_id) = button.light_effect {
        let Some(effect) = state.catalog.light_effect(effect_id) else {
            debug!("play_sound: button {button_id} references missing effect {effect_id}");
            return;
        };
        let targets = button.target_devices.unwrap_or_default();
        if let Err(err) = state
            .runner
            .start(&Playback::from_effect(&effect), &targets, None)
        {
            debug!("play_sound: effect start failed: {err}");
        }
    }
}

fn trigger_effect(state: &HttpState, device_id: DeviceId, effect_type: &str) {
    let Some(effect) = state.catalog.light_effect_by_name(effect_type) else {
        debug!("trigger_effect: unknown effect `{effect_type}`");
        return;
    };
    if let Err(err) = state
        .runner
        .start(&Playback::from_effect(&effect), &[device_id], None)
    {
        debug!("trigger_effect: start failed: {err}");
    }
}
