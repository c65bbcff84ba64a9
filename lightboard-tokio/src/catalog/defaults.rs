//! The effects and scenes seeded on every startup.

use lightboard_common::effects::{
    Easing, EasingKind, EffectKind, LightingEffect, Script, Step,
};
use lightboard_common::scenes::{Scene, SceneConfiguration};

fn white_step(brightness: u8, temperature: u16, duration: u64) -> Step {
    Step {
        brightness,
        color: None,
        temperature: Some(temperature),
        duration,
        easing: None,
        device_ids: None,
    }
}

fn color_step(brightness: u8, hex: &str, duration: u64, ease_ms: u64) -> Step {
    Step {
        brightness,
        color: Some(hex.to_string()),
        temperature: None,
        duration,
        easing: Some(Easing {
            kind: EasingKind::Linear,
            duration: ease_ms,
        }),
        device_ids: None,
    }
}

fn eased(mut step: Step, kind: EasingKind, ease_ms: u64) -> Step {
    step.easing = Some(Easing {
        kind,
        duration: ease_ms,
    });
    step
}

fn effect(name: &str, icon: &str, duration: u64, script: Script) -> LightingEffect {
    LightingEffect {
        id: 0,
        name: name.to_string(),
        kind: EffectKind::Preset,
        duration,
        icon: icon.to_string(),
        hidden_from_dashboard: false,
        script,
    }
}

/// The five preset lighting effects.
#[must_use]
pub fn light_effects() -> Vec<LightingEffect> {
    vec![
        effect(
            "Flash",
            "zap",
            300,
            Script {
                looped: false,
                loop_count: None,
                global_delay: 0,
                steps: vec![
                    white_step(100, 6500, 100),
                    eased(white_step(50, 3500, 100), EasingKind::Linear, 500),
                    white_step(100, 6500, 100),
                ],
            },
        ),
        effect(
            "Strobe",
            "flashlight",
            200,
            Script {
                looped: true,
                loop_count: Some(0),
                global_delay: 0,
                steps: vec![white_step(100, 6500, 100), white_step(0, 6500, 100)],
            },
        ),
        effect(
            "Fade",
            "sunset",
            4000,
            Script {
                looped: true,
                loop_count: Some(0),
                global_delay: 0,
                steps: vec![
                    eased(white_step(100, 2700, 2000), EasingKind::Linear, 2000),
                    eased(white_step(5, 2700, 2000), EasingKind::Linear, 2000),
                ],
            },
        ),
        effect(
            "Color Cycle",
            "palette",
            6000,
            Script {
                looped: true,
                loop_count: Some(0),
                global_delay: 0,
                steps: vec![
                    color_step(100, "#FF0000", 1000, 1000),
                    color_step(100, "#FFFF00", 1000, 1000),
                    color_step(100, "#00FF00", 1000, 1000),
                    color_step(100, "#00FFFF", 1000, 1000),
                    color_step(100, "#0000FF", 1000, 1000),
                    color_step(100, "#FF00FF", 1000, 1000),
                ],
            },
        ),
        effect(
            "Breathe",
            "wind",
            3000,
            Script {
                looped: true,
                loop_count: Some(0),
                global_delay: 0,
                steps: vec![
                    eased(white_step(80, 3500, 1500), EasingKind::EaseInOut, 1500),
                    eased(white_step(20, 3500, 1500), EasingKind::EaseInOut, 1500),
                ],
            },
        ),
    ]
}

fn static_scene(
    name: &str,
    description: &str,
    icon: &str,
    brightness: u8,
    temperature: u16,
    turn_on_if_off: bool,
) -> Scene {
    Scene {
        id: 0,
        name: name.to_string(),
        description: Some(description.to_string()),
        configuration: Some(SceneConfiguration {
            brightness: Some(brightness),
            temperature: Some(temperature),
            color: None,
        }),
        colors: None,
        icon: icon.to_string(),
        target_devices: None,
        script: None,
        turn_on_if_off,
        device_settings: None,
    }
}

/// The four preset scenes.
#[must_use]
pub fn scenes() -> Vec<Scene> {
    let party = Scene {
        id: 0,
        name: "Party Time".to_string(),
        description: Some("Fast color rotation".to_string()),
        configuration: None,
        colors: Some(vec![
            "#FF0000".to_string(),
            "#00FF00".to_string(),
            "#0000FF".to_string(),
            "#FF00FF".to_string(),
        ]),
        icon: "party-popper".to_string(),
        target_devices: None,
        script: Some(Script {
            looped: true,
            loop_count: Some(0),
            global_delay: 0,
            steps: vec![
                color_step(100, "#FF0000", 500, 250),
                color_step(100, "#00FF00", 500, 250),
                color_step(100, "#0000FF", 500, 250),
                color_step(100, "#FF00FF", 500, 250),
            ],
        }),
        turn_on_if_off: true,
        device_settings: None,
    };

    vec![
        static_scene("Movie Night", "Dim warm light", "film", 20, 2700, true),
        static_scene("Focus Mode", "Bright neutral white", "target", 100, 4500, true),
        party,
        static_scene("Relax", "Soft warm glow", "lamp", 40, 2700, false),
    ]
}
