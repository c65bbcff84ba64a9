//! The catalog of sound buttons, scenes and lighting effects.
//!
//! [`Catalog`] is the seam a persistent store would implement; the board
//! runs on [`MemoryCatalog`], which loses everything on restart and
//! re-seeds the defaults on each startup.

pub mod defaults;

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use lightboard_common::buttons::{SoundButton, SoundButtonId, SoundButtonMetadata};
use lightboard_common::effects::{EffectId, LightingEffect, LightingEffectPatch};
use lightboard_common::scenes::{Scene, SceneId, ScenePatch};
use thiserror::Error;

/// An error from a catalog operation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum CatalogError {
    /// No record with that id.
    #[error("not found")]
    NotFound,
}

/// CRUD over the board's persistable records.
pub trait Catalog: Send + Sync {
    /// All sound buttons, in id order.
    fn sound_buttons(&self) -> Vec<SoundButton>;

    /// One sound button.
    fn sound_button(&self, id: SoundButtonId) -> Option<SoundButton>;

    /// Create a sound button around an already-stored audio blob.
    fn add_sound_button(&self, meta: SoundButtonMetadata, audio_file: String) -> SoundButton;

    /// Delete a sound button, returning it so the caller can also delete
    /// its blob.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for an unknown id.
    fn remove_sound_button(&self, id: SoundButtonId) -> Result<SoundButton, CatalogError>;

    /// All scenes, in id order.
    fn scenes(&self) -> Vec<Scene>;

    /// One scene.
    fn scene(&self, id: SceneId) -> Option<Scene>;

    /// Create a scene. The server assigns the id.
    fn add_scene(&self, scene: Scene) -> Scene;

    /// Apply a partial update to a scene.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for an unknown id.
    fn update_scene(&self, id: SceneId, patch: ScenePatch) -> Result<Scene, CatalogError>;

    /// Delete a scene.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for an unknown id.
    fn remove_scene(&self, id: SceneId) -> Result<Scene, CatalogError>;

    /// All lighting effects, in id order.
    fn light_effects(&self) -> Vec<LightingEffect>;

    /// One lighting effect.
    fn light_effect(&self, id: EffectId) -> Option<LightingEffect>;

    /// Find a lighting effect by name, case-insensitively.
    fn light_effect_by_name(&self, name: &str) -> Option<LightingEffect>;

    /// Create a lighting effect. The server assigns the id.
    fn add_light_effect(&self, effect: LightingEffect) -> LightingEffect;

    /// Apply a partial update to a lighting effect.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for an unknown id.
    fn update_light_effect(
        &self,
        id: EffectId,
        patch: LightingEffectPatch,
    ) -> Result<LightingEffect, CatalogError>;

    /// Delete a lighting effect.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] for an unknown id.
    fn remove_light_effect(&self, id: EffectId) -> Result<LightingEffect, CatalogError>;
}

#[derive(Default)]
struct Inner {
    buttons: BTreeMap<SoundButtonId, SoundButton>,
    scenes: BTreeMap<SceneId, Scene>,
    effects: BTreeMap<EffectId, LightingEffect>,
    next_button: SoundButtonId,
    next_scene: SceneId,
    next_effect: EffectId,
}

/// The in-memory catalog. State is lost on restart.
pub struct MemoryCatalog {
    inner: RwLock<Inner>,
}

impl MemoryCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_button: 1,
                next_scene: 1,
                next_effect: 1,
                ..Inner::default()
            }),
        }
    }

    /// A catalog seeded with the default effects and scenes.
    #[must_use]
    pub fn with_defaults() -> Self {
        let catalog = Self::new();
        for effect in defaults::light_effects() {
            catalog.add_light_effect(effect);
        }
        for scene in defaults::scenes() {
            catalog.add_scene(scene);
        }
        catalog
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog for MemoryCatalog {
    fn sound_buttons(&self) -> Vec<SoundButton> {
        self.read().buttons.values().cloned().collect()
    }

    fn sound_button(&self, id: SoundButtonId) -> Option<SoundButton> {
        self.read().buttons.get(&id).cloned()
    }

    fn add_sound_button(&self, meta: SoundButtonMetadata, audio_file: String) -> SoundButton {
        let mut inner = self.write();
        let id = inner.next_button;
        inner.next_button += 1;

        let button = SoundButton {
            id,
            name: meta.name,
            description: meta.description,
            audio_file,
            light_effect: meta.light_effect,
            color: meta.color,
            icon: meta.icon,
            sort_order: meta.sort_order,
            volume: meta.volume,
            target_devices: meta.target_devices,
        };
        inner.buttons.insert(id, button.clone());
        button
    }

    fn remove_sound_button(&self, id: SoundButtonId) -> Result<SoundButton, CatalogError> {
        self.write().buttons.remove(&id).ok_or(CatalogError::NotFound)
    }

    fn scenes(&self) -> Vec<Scene> {
        self.read().scenes.values().cloned().collect()
    }

    fn scene(&self, id: SceneId) -> Option<Scene> {
        self.read().scenes.get(&id).cloned()
    }

    fn add_scene(&self, mut scene: Scene) -> Scene {
        let mut inner = self.write();
        scene.id = inner.next_scene;
        inner.next_scene += 1;
        inner.scenes.insert(scene.id, scene.clone());
        scene
    }

    fn update_scene(&self, id: SceneId, patch: ScenePatch) -> Result<Scene, CatalogError> {
        let mut inner = self.write();
        let scene = inner.scenes.get_mut(&id).ok_or(CatalogError::NotFound)?;

        if let Some(name) = patch.name {
            scene.name = name;
        }
        if let Some(description) = patch.description {
            scene.description = Some(description);
        }
        if let Some(configuration) = patch.configuration {
            scene.configuration = Some(configuration);
        }
        if let Some(colors) = patch.colors {
            scene.colors = Some(colors);
        }
        if let Some(icon) = patch.icon {
            scene.icon = icon;
        }
        if let Some(target_devices) = patch.target_devices {
            scene.target_devices = Some(target_devices);
        }
        if let Some(script) = patch.script {
            scene.script = Some(script);
        }
        if let Some(turn_on_if_off) = patch.turn_on_if_off {
            scene.turn_on_if_off = turn_on_if_off;
        }
        if let Some(device_settings) = patch.device_settings {
            scene.device_settings = Some(device_settings);
        }

        Ok(scene.clone())
    }

    fn remove_scene(&self, id: SceneId) -> Result<Scene, CatalogError> {
        self.write().scenes.remove(&id).ok_or(CatalogError::NotFound)
    }

    fn light_effects(&self) -> Vec<LightingEffect> {
        self.read().effects.values().cloned().collect()
    }

    fn light_effect(&self, id: EffectId) -> Option<LightingEffect> {
        self.read().effects.get(&id).cloned()
    }

    fn light_effect_by_name(&self, name: &str) -> Option<LightingEffect> {
        self.read()
            .effects
            .values()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn add_light_effect(&self, mut effect: LightingEffect) -> LightingEffect {
        let mut inner = self.write();
        effect.id = inner.next_effect;
        inner.next_effect += 1;
        inner.effects.insert(effect.id, effect.clone());
        effect
    }

    fn update_light_effect(
        &self,
        id: EffectId,
        patch: LightingEffectPatch,
    ) -> Result<LightingEffect, CatalogError> {
        let mut inner = self.write();
        let effect = inner.effects.get_mut(&id).ok_or(CatalogError::NotFound)?;

        if let Some(name) = patch.name {
            effect.name = name;
        }
        if let Some(kind) = patch.kind {
            effect.kind = kind;
        }
        if let Some(duration) = patch.duration {
            effect.duration = duration;
        }
        if let Some(icon) = patch.icon {
            effect.icon = icon;
        }
        if let Some(hidden) = patch.hidden_from_dashboard {
            effect.hidden_from_dashboard = hidden;
        }
        if let Some(script) = patch.script {
            effect.script = script;
        }

        Ok(effect.clone())
    }

    fn remove_light_effect(&self, id: EffectId) -> Result<LightingEffect, CatalogError> {
        self.write().effects.remove(&id).ok_or(CatalogError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use lightboard_common::buttons::EffectRef;

    fn metadata(name: &str) -> SoundButtonMetadata {
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
    }

    #[test]
    fn test_defaults_are_seeded() {
        let catalog = MemoryCatalog::with_defaults();

        let names: Vec<String> = catalog.light_effects().iter().map(|e| e.name.clone()).collect();
        assert_eq!(
            names,
            vec!["Flash", "Strobe", "Fade", "Color Cycle", "Breathe"]
        );

        let scenes: Vec<String> = catalog.scenes().iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            scenes,
            vec!["Movie Night", "Focus Mode", "Party Time", "Relax"]
        );
    }

    #[test]
    fn test_default_scripts_are_valid() {
        let catalog = MemoryCatalog::with_defaults();
        for effect in catalog.light_effects() {
            assert!(
                effect.script.validate().is_ok(),
                "default effect {} has an invalid script",
                effect.name
            );
        }
    }

    #[test]
    fn test_sound_button_crud() {
        let catalog = MemoryCatalog::new();
        let button = catalog.add_sound_button(metadata("Horn"), "horn-1700.mp3".to_string());
        assert_eq!(button.id, 1);
        assert_eq!(button.audio_file, "horn-1700.mp3");
        assert_eq!(button.light_effect, EffectRef::None);

        assert_eq!(catalog.sound_buttons().len(), 1);
        let removed = catalog.remove_sound_button(1).unwrap();
        assert_eq!(removed.audio_file, "horn-1700.mp3");
        assert_eq!(
            catalog.remove_sound_button(1),
            Err(CatalogError::NotFound)
        );
    }

    #[test]
    fn test_scene_update_merges() {
        let catalog = MemoryCatalog::with_defaults();
        let scene = catalog
            .update_scene(
                1,
                ScenePatch {
                    name: Some("Cinema".to_string()),
                    ..ScenePatch::default()
                },
            )
            .unwrap();
        assert_eq!(scene.name, "Cinema");
        // Everything else is untouched.
        assert!(scene.turn_on_if_off);
        assert_eq!(
            catalog.update_scene(99, ScenePatch::default()),
            Err(CatalogError::NotFound)
        );
    }

    #[test]
    fn test_effect_lookup_by_name() {
        let catalog = MemoryCatalog::with_defaults();
        assert!(catalog.light_effect_by_name("flash").is_some());
        assert!(catalog.light_effect_by_name("FLASH").is_some());
        assert!(catalog.light_effect_by_name("nope").is_none());
    }
}
