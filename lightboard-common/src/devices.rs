//! Devices known to the control plane.

use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lights::HSBK;

/// The numeric surrogate id assigned to a device at first sight.
pub type DeviceId = u32;

/// An error parsing a [`MacAddress`].
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("invalid mac address: `{0}`")]
pub struct MacParseError(String);

/// A 48-bit LIFX hardware address.
///
/// The canonical text form is twelve lowercase hex digits in transmission
/// order, e.g. `d073d500aa11`. This is the stable key for a device.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Construct from raw octets in transmission order.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The raw octets in transmission order.
    #[must_use]
    pub const fn octets(self) -> [u8; 6] {
        self.0
    }

    /// The wire `target` field: the octets packed little-endian into the low
    /// 48 bits of a u64, high bytes zero.
    #[must_use]
    pub const fn to_target(self) -> u64 {
        let o = self.0;
        u64::from_le_bytes([o[0], o[1], o[2], o[3], o[4], o[5], 0, 0])
    }

    /// Recover the address from a wire `target` field.
    #[must_use]
    pub const fn from_target(target: u64) -> Self {
        let b = target.to_le_bytes();
        Self([b[0], b[1], b[2], b[3], b[4], b[5]])
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for octet in self.0 {
            write!(f, "{octet:02x}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MacParseError(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| MacParseError(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A bulb known to the registry.
///
/// When `is_online` is false the state fields are last known, not current.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Surrogate id assigned at first sight.
    pub id: DeviceId,

    /// Stable hardware key.
    pub mac: MacAddress,

    /// Human label reported by the bulb (or set by the user).
    pub label: String,

    /// Last known address of the bulb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,

    /// Device type tag, currently always `light`.
    pub device_type: String,

    /// Whether the bulb has replied within the grace period.
    pub is_online: bool,

    /// When the bulb was last heard from. Monotone non-decreasing.
    pub last_seen: DateTime<Utc>,

    /// User flag: "I want this one in my board".
    pub is_adopted: bool,

    /// Last known power state.
    pub power: bool,

    /// Last known color.
    pub color: HSBK,

    /// Derived brightness percent, 0 to 100.
    pub brightness: u8,

    /// Derived white point in kelvin (zero when showing a color).
    pub temperature: u16,
}

impl Device {
    /// Recompute the derived `brightness`/`temperature` fields from `color`.
    pub fn refresh_derived(&mut self) {
        self.brightness = self.color.brightness_percent();
        self.temperature = self.color.kelvin;
    }
}

/// A user-driven partial update of a device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePatch {
    /// New label, if any.
    pub label: Option<String>,

    /// New adoption flag, if any.
    pub is_adopted: Option<bool>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_mac_text_round_trip() {
        let mac: MacAddress = "d073d500aa11".parse().unwrap();
        assert_eq!(mac.octets(), [0xd0, 0x73, 0xd5, 0x00, 0xaa, 0x11]);
        assert_eq!(mac.to_string(), "d073d500aa11");
    }

    #[test]
    fn test_mac_target_round_trip() {
        let mac: MacAddress = "d073d500aa11".parse().unwrap();
        assert_eq!(mac.to_target(), 0x0000_11aa_00d5_73d0);
        assert_eq!(MacAddress::from_target(mac.to_target()), mac);
    }

    #[test]
    fn test_mac_rejects_bad_input() {
        assert!("d073d500aa1".parse::<MacAddress>().is_err());
        assert!("d073d500aa111".parse::<MacAddress>().is_err());
        assert!("d073d500aa1g".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_serde_is_lowercase_hex() {
        let mac: MacAddress = "D073D500AA11".parse().unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"d073d500aa11\"");
    }
}
