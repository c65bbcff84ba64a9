//! Lighting effects and their step scripts.

use serde::{Deserialize, Serialize};

use crate::devices::DeviceId;
use crate::lights::{percent_to_u16, HSBK, KELVIN_MAX, KELVIN_MIN};

/// Identifier of a [`LightingEffect`] in the catalog.
pub type EffectId = u32;

/// Shortest step a script may contain, in milliseconds.
pub const MIN_STEP_MS: u64 = 100;

/// Whether an effect ships with the board or was authored by the user.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    /// Shipped with the board.
    Preset,

    /// Authored by the user.
    Custom,
}

/// Easing curve applied to a color transition.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EasingKind {
    /// Constant-rate transition.
    Linear,

    /// Slow start.
    EaseIn,

    /// Slow finish.
    EaseOut,

    /// Slow start and finish.
    EaseInOut,
}

/// A transition into a step.
///
/// The bulb performs the fade itself; `duration` becomes the `SetColor`
/// transition time.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Easing {
    /// Curve shape. Advisory: the wire protocol only fades linearly.
    #[serde(rename = "type")]
    pub kind: EasingKind,

    /// Transition time in milliseconds.
    pub duration: u64,
}

/// One step of a script.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Brightness percent, 0 to 100.
    pub brightness: u8,

    /// `#RRGGBB` color. Wins over `temperature` when both are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// White point in kelvin, used when no color is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<u16>,

    /// How long to hold this step before the next, in milliseconds.
    pub duration: u64,

    /// Optional fade into this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,

    /// Restrict this step to the listed devices. Empty or absent means the
    /// step applies to every target of the effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_ids: Option<Vec<DeviceId>>,
}

impl Step {
    /// The color this step drives the bulb to.
    ///
    /// The hex color supplies hue and saturation; the step's own brightness
    /// always wins so the dashboard slider behaves the same for colors and
    /// whites. Returns `None` when the step carries neither a color nor a
    /// temperature.
    #[must_use]
    pub fn resolve_color(&self) -> Option<HSBK> {
        let brightness = percent_to_u16(self.brightness);
        if let Some(hex) = &self.color {
            return HSBK::from_hex(hex).ok().map(|c| HSBK { brightness, ..c });
        }
        self.temperature.map(|kelvin| HSBK {
            hue: 0,
            saturation: 0,
            brightness,
            kelvin,
        })
    }

    /// Does this step apply to the given device?
    #[must_use]
    pub fn applies_to(&self, id: DeviceId) -> bool {
        match &self.device_ids {
            Some(ids) if !ids.is_empty() => ids.contains(&id),
            _ => true,
        }
    }

    /// The `SetColor` transition time for this step, in milliseconds.
    #[must_use]
    pub fn transition_ms(&self) -> u32 {
        self.easing
            .as_ref()
            .map_or(0, |e| u32::try_from(e.duration).unwrap_or(u32::MAX))
    }
}

/// An ordered list of steps with looping control.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Whether the dashboard shows this script as looping.
    #[serde(rename = "loop", default)]
    pub looped: bool,

    /// Number of repeats: 0 means run until stopped, absent means once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<i64>,

    /// Delay before the first step, in milliseconds. Not repeated per loop.
    #[serde(default)]
    pub global_delay: u64,

    /// The steps, played in order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Check the invariants a playable script must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the full list of problems found, for the 400 error list.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.steps.is_empty() {
            errors.push("script must contain at least one step".to_string());
        }
        if self.loop_count.is_some_and(|n| n < 0) {
            errors.push("loopCount must not be negative".to_string());
        }

        for (i, step) in self.steps.iter().enumerate() {
            let n = i + 1;
            if step.duration < MIN_STEP_MS {
                errors.push(format!("step {n}: duration must be at least {MIN_STEP_MS} ms"));
            }
            match (&step.color, step.temperature) {
                (Some(hex), _) => {
                    if HSBK::from_hex(hex).is_err() {
                        errors.push(format!("step {n}: invalid hex color `{hex}`"));
                    }
                }
                (None, Some(kelvin)) => {
                    if !(KELVIN_MIN..=KELVIN_MAX).contains(&kelvin) {
                        errors.push(format!(
                            "step {n}: temperature must be between {KELVIN_MIN} and {KELVIN_MAX}"
                        ));
                    }
                }
                (None, None) => {
                    errors.push(format!("step {n}: either color or temperature is required"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The number of repeats to play: an explicit override wins, then the
    /// script's own `loop_count`, then once. Zero means run until stopped.
    #[must_use]
    pub fn effective_loop_count(&self, loop_override: Option<i64>) -> i64 {
        loop_override.or(self.loop_count).unwrap_or(1)
    }
}

/// A named, persistable lighting effect.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingEffect {
    /// Catalog id. Assigned by the server; zero on create.
    #[serde(default)]
    pub id: EffectId,

    /// Display name.
    pub name: String,

    /// Preset or user-authored.
    #[serde(rename = "type")]
    pub kind: EffectKind,

    /// Total duration of one pass in milliseconds. The dashboard derives
    /// progress from this; the scheduler uses the step durations.
    pub duration: u64,

    /// Icon tag for the dashboard.
    #[serde(default)]
    pub icon: String,

    /// Hide this effect from the main dashboard grid.
    #[serde(default)]
    pub hidden_from_dashboard: bool,

    /// The step script.
    pub script: Script,
}

/// A partial update of a lighting effect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingEffectPatch {
    /// New name, if any.
    pub name: Option<String>,

    /// New kind, if any.
    #[serde(rename = "type")]
    pub kind: Option<EffectKind>,

    /// New dashboard duration, if any.
    pub duration: Option<u64>,

    /// New icon, if any.
    pub icon: Option<String>,

    /// New dashboard visibility, if any.
    pub hidden_from_dashboard: Option<bool>,

    /// New script, if any.
    pub script: Option<Script>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rstest::rstest;

    fn step(duration: u64) -> Step {
        Step {
            brightness: 100,
            color: None,
            temperature: Some(3500),
            duration,
            easing: None,
            device_ids: None,
        }
    }

    fn script(steps: Vec<Step>) -> Script {
        Script {
            looped: false,
            loop_count: None,
            global_delay: 0,
            steps,
        }
    }

    #[test]
    fn test_valid_script() {
        assert!(script(vec![step(100)]).validate().is_ok());
    }

    #[rstest]
    #[case(99)]
    #[case(0)]
    fn test_short_step_rejected(#[case] duration: u64) {
        let errors = script(vec![step(duration)]).validate().unwrap_err();
        assert!(errors[0].contains("at least 100 ms"), "{errors:?}");
    }

    #[test]
    fn test_empty_script_rejected() {
        assert!(script(vec![]).validate().is_err());
    }

    #[test]
    fn test_negative_loop_count_rejected() {
        let mut s = script(vec![step(100)]);
        s.loop_count = Some(-1);
        let errors = s.validate().unwrap_err();
        assert!(errors[0].contains("loopCount"), "{errors:?}");
    }

    #[rstest]
    #[case("#12345")]
    #[case("123456")]
    #[case("#GG0000")]
    fn test_bad_hex_rejected(#[case] hex: &str) {
        let mut s = script(vec![step(100)]);
        s.steps[0].color = Some(hex.to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_step_without_color_or_temperature_rejected() {
        let mut s = script(vec![step(100)]);
        s.steps[0].temperature = None;
        let errors = s.validate().unwrap_err();
        assert!(errors[0].contains("color or temperature"), "{errors:?}");
    }

    #[test]
    fn test_effective_loop_count() {
        let mut s = script(vec![step(100)]);
        assert_eq!(s.effective_loop_count(None), 1);
        s.loop_count = Some(4);
        assert_eq!(s.effective_loop_count(None), 4);
        assert_eq!(s.effective_loop_count(Some(2)), 2);
        assert_eq!(s.effective_loop_count(Some(0)), 0);
    }

    #[test]
    fn test_hex_wins_over_temperature() {
        let mut s = step(100);
        s.color = Some("#FF0000".to_string());
        s.brightness = 50;
        let color = s.resolve_color().unwrap();
        assert_eq!(color.kelvin, 0);
        assert_eq!(color.saturation, 65535);
        assert_eq!(color.brightness, 32768);
    }

    #[test]
    fn test_step_device_filter() {
        let mut s = step(100);
        assert!(s.applies_to(1));
        s.device_ids = Some(vec![]);
        assert!(s.applies_to(1));
        s.device_ids = Some(vec![2, 3]);
        assert!(!s.applies_to(1));
        assert!(s.applies_to(2));
    }
}
