//! The push channel message taxonomy.

use serde::{Deserialize, Serialize};

use crate::buttons::SoundButtonId;
use crate::devices::{Device, DeviceId};
use crate::scenes::SceneId;

/// Payload of [`PushEvent::LightEffectTriggered`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectTriggered {
    /// The device the effect started on.
    pub device_id: DeviceId,

    /// Name of the effect.
    pub effect: String,
}

/// Payload of [`PushEvent::SoundPlayed`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundPlayed {
    /// The button whose sound plays.
    pub button_id: SoundButtonId,

    /// Unix time in milliseconds at which playback was requested.
    pub timestamp: i64,
}

/// Payload of [`PushEvent::SceneApplied`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneApplied {
    /// The applied scene.
    pub scene_id: SceneId,

    /// The devices the scene started on.
    pub devices: Vec<DeviceId>,
}

/// Server to client envelope, sent to every connected client as
/// `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PushEvent {
    /// A device was seen for the first time.
    DeviceDiscovered(Device),

    /// A known device changed state.
    DeviceStatus(Device),

    /// An effect session started on a device.
    LightEffectTriggered(EffectTriggered),

    /// A sound button was played.
    SoundPlayed(SoundPlayed),

    /// A scene was applied.
    SceneApplied(SceneApplied),
}

/// Client to server message. Unrecognized types fail to parse and are
/// ignored by the handler.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsCommand {
    /// Ask the server to broadcast a discovery probe.
    DiscoverDevices,

    /// Play a sound button (and its tied effect).
    #[serde(rename_all = "camelCase")]
    PlaySound {
        /// The button to play.
        button_id: SoundButtonId,
    },

    /// Start an effect on a single device.
    #[serde(rename_all = "camelCase")]
    TriggerEffect {
        /// The target device.
        device_id: DeviceId,

        /// Name of the effect to start.
        effect_type: String,

        /// Advisory duration from the dashboard; the script's own step
        /// durations govern playback.
        #[serde(default)]
        duration: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_push_event_envelope_shape() {
        let event = PushEvent::SoundPlayed(SoundPlayed {
            button_id: 4,
            timestamp: 1_700_000_000_000,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"sound_played","payload":{"buttonId":4,"timestamp":1700000000000}}"#
        );
    }

    #[test]
    fn test_scene_applied_envelope() {
        let event = PushEvent::SceneApplied(SceneApplied {
            scene_id: 2,
            devices: vec![1, 3],
        });
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"scene_applied","payload":{"sceneId":2,"devices":[1,3]}}"#
        );
    }

    #[test]
    fn test_ws_command_parses() {
        let cmd: WsCommand = serde_json::from_str(r#"{"type":"discover_devices"}"#).unwrap();
        assert_eq!(cmd, WsCommand::DiscoverDevices);

        let cmd: WsCommand =
            serde_json::from_str(r#"{"type":"play_sound","buttonId":7}"#).unwrap();
        assert_eq!(cmd, WsCommand::PlaySound { button_id: 7 });

        let cmd: WsCommand = serde_json::from_str(
            r#"{"type":"trigger_effect","deviceId":1,"effectType":"Flash","duration":300}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            WsCommand::TriggerEffect {
                device_id: 1,
                effect_type: "Flash".to_string(),
                duration: Some(300),
            }
        );
    }

    #[test]
    fn test_unknown_ws_command_fails_to_parse() {
        assert!(serde_json::from_str::<WsCommand>(r#"{"type":"reboot"}"#).is_err());
    }
}
