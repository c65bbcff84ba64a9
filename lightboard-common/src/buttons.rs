//! Sound buttons: the board's audio tiles, optionally tied to a light effect.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::devices::DeviceId;
use crate::effects::EffectId;

/// Identifier of a [`SoundButton`] in the catalog.
pub type SoundButtonId = u32;

/// Reference from a sound button to a lighting effect.
///
/// The browser sends either a numeric effect id or the sentinel string
/// `"none"`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum EffectRef {
    /// No effect plays with this button.
    #[default]
    None,

    /// The referenced effect plays when the button's sound plays.
    Effect(EffectId),
}

impl Serialize for EffectRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            EffectRef::None => serializer.serialize_str("none"),
            EffectRef::Effect(id) => serializer.serialize_u32(*id),
        }
    }
}

impl<'de> Deserialize<'de> for EffectRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(EffectId),
            Tag(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(EffectRef::Effect(id)),
            Raw::Tag(tag) if tag == "none" => Ok(EffectRef::None),
            Raw::Tag(tag) => tag
                .parse()
                .map(EffectRef::Effect)
                .map_err(|_| D::Error::custom(format!("invalid effect reference: `{tag}`"))),
        }
    }
}

/// An audio tile on the board.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundButton {
    /// Catalog id.
    pub id: SoundButtonId,

    /// Display name.
    pub name: String,

    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Name of the stored audio blob. Must resolve in the audio store.
    pub audio_file: String,

    /// Effect to play alongside the sound.
    #[serde(default)]
    pub light_effect: EffectRef,

    /// Display color tag for the tile.
    #[serde(default)]
    pub color: String,

    /// Icon tag for the tile.
    #[serde(default)]
    pub icon: String,

    /// Position of the tile on the board.
    #[serde(default)]
    pub sort_order: i32,

    /// Playback volume percent, 0 to 100.
    pub volume: u8,

    /// Devices the tied effect targets. Absent means all adopted devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_devices: Option<Vec<DeviceId>>,
}

/// The `metadata` part of a sound-button multipart upload: everything the
/// user supplies, before the server assigns the id and blob name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundButtonMetadata {
    /// Display name.
    pub name: String,

    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,

    /// Effect to play alongside the sound.
    #[serde(default)]
    pub light_effect: EffectRef,

    /// Display color tag for the tile.
    #[serde(default)]
    pub color: String,

    /// Icon tag for the tile.
    #[serde(default)]
    pub icon: String,

    /// Position of the tile on the board.
    #[serde(default)]
    pub sort_order: i32,

    /// Playback volume percent, 0 to 100.
    #[serde(default = "default_volume")]
    pub volume: u8,

    /// Devices the tied effect targets.
    #[serde(default)]
    pub target_devices: Option<Vec<DeviceId>>,
}

const fn default_volume() -> u8 {
    100
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_effect_ref_accepts_number_and_sentinel() {
        assert_eq!(
            serde_json::from_str::<EffectRef>("3").unwrap(),
            EffectRef::Effect(3)
        );
        assert_eq!(
            serde_json::from_str::<EffectRef>("\"none\"").unwrap(),
            EffectRef::None
        );
        assert_eq!(
            serde_json::from_str::<EffectRef>("\"7\"").unwrap(),
            EffectRef::Effect(7)
        );
        assert!(serde_json::from_str::<EffectRef>("\"bogus\"").is_err());
    }

    #[test]
    fn test_effect_ref_serializes_sentinel() {
        assert_eq!(serde_json::to_string(&EffectRef::None).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&EffectRef::Effect(4)).unwrap(), "4");
    }

    #[test]
    fn test_metadata_defaults() {
        let meta: SoundButtonMetadata =
            serde_json::from_str(r#"{"name":"Horn"}"#).unwrap();
        assert_eq!(meta.volume, 100);
        assert_eq!(meta.light_effect, EffectRef::None);
        assert!(meta.target_devices.is_none());
    }
}
