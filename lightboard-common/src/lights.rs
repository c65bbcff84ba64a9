//! Color types for LIFX lights.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest white point a bulb will accept.
pub const KELVIN_MIN: u16 = 2500;

/// Highest white point a bulb will accept.
pub const KELVIN_MAX: u16 = 9000;

/// An error converting between color representations.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ColorError {
    /// The supplied string is not a strict `#RRGGBB` color.
    #[error("invalid hex color: `{0}`")]
    InvalidHex(String),
}

/// A bulb color (Hue-Saturation-Brightness-Kelvin).
///
/// All channels are 16-bit unsigned, matching the wire protocol. When a
/// light is displaying whites, saturation is zero and kelvin carries the
/// white point (2500 warm to 9000 cool). When a light is displaying colors,
/// kelvin is zero and is ignored by the bulb.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HSBK {
    /// Hue, scaled so 65535 is a full circle.
    pub hue: u16,

    /// Saturation, 0 (white) to 65535 (pure color).
    pub saturation: u16,

    /// Brightness, 0 to 65535.
    pub brightness: u16,

    /// White point in kelvin, or 0 for "color, not white".
    pub kelvin: u16,
}

impl HSBK {
    /// A white color at the given brightness percent and kelvin.
    #[must_use]
    pub fn white(brightness_pct: u8, kelvin: u16) -> Self {
        Self {
            hue: 0,
            saturation: 0,
            brightness: percent_to_u16(brightness_pct),
            kelvin,
        }
    }

    /// Parse a strict `#RRGGBB` hex color.
    ///
    /// The result carries the hue/saturation/brightness of the color scaled
    /// to 16 bits, with `kelvin` zero to mark it as a color rather than a
    /// white.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError::InvalidHex`] unless the input is exactly a `#`
    /// followed by six hex digits.
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| ColorError::InvalidHex(hex.to_string()))?;

        let channel = |i: usize| -> f32 {
            // The format was checked above, so the slice is valid hex.
            u8::from_str_radix(&digits[i..i + 2], 16).map_or(0.0, |v| f32::from(v) / 255.0)
        };
        let r = channel(0);
        let g = channel(2);
        let b = channel(4);

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta <= f32::EPSILON {
            0.0
        } else if (max - r).abs() <= f32::EPSILON {
            60.0 * (((g - b) / delta).rem_euclid(6.0))
        } else if (max - g).abs() <= f32::EPSILON {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };

        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        Ok(Self {
            hue: (hue / 360.0 * 65535.0).round() as u16,
            saturation: (saturation * 65535.0).round() as u16,
            brightness: (max * 65535.0).round() as u16,
            kelvin: 0,
        })
    }

    /// The color as 8-bit RGB channels.
    ///
    /// A saturation-zero color with a nonzero kelvin is rendered through a
    /// fixed warm-to-cool tint table, scaled by brightness.
    #[must_use]
    pub fn to_rgb(self) -> (u8, u8, u8) {
        let v = f32::from(self.brightness) / 65535.0;

        if self.saturation == 0 {
            let (r, g, b) = if self.kelvin > 0 {
                kelvin_tint(self.kelvin)
            } else {
                (255, 255, 255)
            };
            return (scale(f32::from(r) / 255.0 * v), scale(f32::from(g) / 255.0 * v), scale(f32::from(b) / 255.0 * v));
        }

        let h = f32::from(self.hue) / 65535.0 * 360.0;
        let s = f32::from(self.saturation) / 65535.0;
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = v - c;

        let (r, g, b) = match h {
            h if h < 60.0 => (c, x, 0.0),
            h if h < 120.0 => (x, c, 0.0),
            h if h < 180.0 => (0.0, c, x),
            h if h < 240.0 => (0.0, x, c),
            h if h < 300.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        (scale(r + m), scale(g + m), scale(b + m))
    }

    /// The color as an uppercase `#RRGGBB` string.
    #[must_use]
    pub fn to_hex(self) -> String {
        let (r, g, b) = self.to_rgb();
        format!("#{r:02X}{g:02X}{b:02X}")
    }

    /// Brightness as a whole percent, 0 to 100.
    #[must_use]
    pub fn brightness_percent(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        {
            (f32::from(self.brightness) / 65535.0 * 100.0).round() as u8
        }
    }
}

/// Scale a 0-100 percentage to the 16-bit wire range.
#[must_use]
pub fn percent_to_u16(pct: u8) -> u16 {
    let pct = pct.min(100);
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    {
        (f32::from(pct) * 65535.0 / 100.0).round() as u16
    }
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn scale(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Approximate RGB tint for a white point, warm to cool.
const fn kelvin_tint(kelvin: u16) -> (u8, u8, u8) {
    match kelvin {
        0..=2700 => (255, 169, 87),
        2701..=3500 => (255, 197, 143),
        3501..=4500 => (255, 223, 194),
        4501..=6000 => (255, 244, 242),
        _ => (214, 230, 255),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_from_hex_primaries() {
        let red = HSBK::from_hex("#FF0000").unwrap();
        assert_eq!(red.hue, 0);
        assert_eq!(red.saturation, 65535);
        assert_eq!(red.brightness, 65535);
        assert_eq!(red.kelvin, 0);

        let green = HSBK::from_hex("#00FF00").unwrap();
        assert_eq!(green.hue, 21845);

        let blue = HSBK::from_hex("#0000FF").unwrap();
        assert_eq!(blue.hue, 43690);
    }

    #[test]
    fn test_from_hex_grey_has_no_saturation() {
        let grey = HSBK::from_hex("#808080").unwrap();
        assert_eq!(grey.saturation, 0);
        assert_eq!(grey.brightness_percent(), 50);
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        for bad in ["FF0000", "#FF000", "#FF00000", "#GG0000", "", "#"] {
            assert!(HSBK::from_hex(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_hex_round_trip() {
        // Worst-case round trip error is one step in any channel.
        for hex in [
            "#FF0000", "#00FF00", "#0000FF", "#FFFFFF", "#000000", "#123456", "#ABCDEF", "#F0E68C",
            "#708090", "#012345",
        ] {
            let parsed = HSBK::from_hex(hex).unwrap();
            let (r, g, b) = parsed.to_rgb();
            let (er, eg, eb) = (
                u8::from_str_radix(&hex[1..3], 16).unwrap(),
                u8::from_str_radix(&hex[3..5], 16).unwrap(),
                u8::from_str_radix(&hex[5..7], 16).unwrap(),
            );
            assert!(r.abs_diff(er) <= 1, "{hex}: red {r} vs {er}");
            assert!(g.abs_diff(eg) <= 1, "{hex}: green {g} vs {eg}");
            assert!(b.abs_diff(eb) <= 1, "{hex}: blue {b} vs {eb}");
        }
    }

    #[test]
    fn test_round_trip_exact_for_quantizing_colors() {
        for hex in ["#FF0000", "#000000", "#FFFFFF"] {
            assert_eq!(HSBK::from_hex(hex).unwrap().to_hex(), hex);
        }
    }

    #[test]
    fn test_white_tint_table() {
        let warm = HSBK::white(100, 2700).to_rgb();
        let cool = HSBK::white(100, 9000).to_rgb();
        assert!(warm.2 < cool.2, "warm white should carry less blue");
        assert_eq!(HSBK::white(0, 3500).to_rgb(), (0, 0, 0));
    }

    #[test]
    fn test_percent_scaling() {
        assert_eq!(percent_to_u16(0), 0);
        assert_eq!(percent_to_u16(50), 32768);
        assert_eq!(percent_to_u16(100), 65535);
        assert_eq!(percent_to_u16(200), 65535);
    }
}
