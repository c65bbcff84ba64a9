//! Scenes: named looks applied across devices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::devices::DeviceId;
use crate::effects::Script;

/// Identifier of a [`Scene`] in the catalog.
pub type SceneId = u32;

/// The static look a scene drives devices to.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneConfiguration {
    /// Default brightness percent, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,

    /// Default white point in kelvin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<u16>,

    /// Default `#RRGGBB` color. Wins over `temperature` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A per-device override of a scene's configuration.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceOverride {
    /// Override color for this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Override brightness percent for this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
}

/// A named look applied across selected devices.
///
/// Exactly one of `configuration` or `script` is authoritative for
/// playback; when both are present the step script wins and the
/// configuration is advisory (thumbnails, dashboard summary).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Catalog id. Assigned by the server; zero on create.
    #[serde(default)]
    pub id: SceneId,

    /// Display name.
    pub name: String,

    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The static look. Advisory when `script` is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SceneConfiguration>,

    /// Colors for the dashboard thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,

    /// Icon tag for the dashboard.
    #[serde(default)]
    pub icon: String,

    /// Devices this scene applies to. Absent means all adopted devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_devices: Option<Vec<DeviceId>>,

    /// Optional step script, same shape as a lighting effect's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,

    /// Power on devices that are off before applying.
    #[serde(default)]
    pub turn_on_if_off: bool,

    /// Per-device overrides of the configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_settings: Option<BTreeMap<DeviceId, DeviceOverride>>,
}

/// A partial update of a scene.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePatch {
    /// New name, if any.
    pub name: Option<String>,

    /// New description, if any.
    pub description: Option<String>,

    /// New static configuration, if any.
    pub configuration: Option<SceneConfiguration>,

    /// New thumbnail colors, if any.
    pub colors: Option<Vec<String>>,

    /// New icon, if any.
    pub icon: Option<String>,

    /// New target devices, if any.
    pub target_devices: Option<Vec<DeviceId>>,

    /// New step script, if any.
    pub script: Option<Script>,

    /// New power-on behavior, if any.
    pub turn_on_if_off: Option<bool>,

    /// New per-device overrides, if any.
    pub device_settings: Option<BTreeMap<DeviceId, DeviceOverride>>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn movie_night() -> Scene {
        Scene {
            id: 1,
            name: "Movie Night".to_string(),
            description: Some("Dim warm light".to_string()),
            configuration: Some(SceneConfiguration {
                brightness: Some(20),
                temperature: Some(2700),
                color: None,
            }),
            colors: None,
            icon: "film".to_string(),
            target_devices: None,
            script: None,
            turn_on_if_off: true,
            device_settings: Some(BTreeMap::from([(
                3,
                DeviceOverride {
                    color: None,
                    brightness: Some(5),
                },
            )])),
        }
    }

    #[test]
    fn test_scene_json_round_trip_is_stable() {
        // Save, reload and save again must produce identical bytes.
        let first = serde_json::to_string(&movie_night()).unwrap();
        let reloaded: Scene = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&reloaded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scene_defaults_on_deserialize() {
        let scene: Scene = serde_json::from_str(r#"{"id":9,"name":"Bare"}"#).unwrap();
        assert!(!scene.turn_on_if_off);
        assert!(scene.configuration.is_none());
        assert!(scene.script.is_none());
        assert_eq!(scene.icon, "");
    }
}
