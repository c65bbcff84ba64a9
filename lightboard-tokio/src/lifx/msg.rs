//! The message kinds this control plane speaks.
//!
//! Only the subset of the LIFX protocol the board needs is decoded here;
//! anything else unpacks to [`WireError::UnknownType`] and is skipped by
//! the receive loop.

use std::io::Cursor;

use lightboard_common::lights::HSBK;

use super::codec::{Label, WireReader, WireWriter};
use super::wire::{RawFrame, WireError};

/// A decoded LIFX message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// GetService - 2
    ///
    /// Broadcast by a client to find devices on the local network. Devices
    /// answer with [`Message::StateService`].
    GetService,

    /// StateService - 3
    ///
    /// Response to [`Message::GetService`].
    StateService {
        /// Service kind; 1 is UDP.
        service: u8,

        /// Port the service listens on. Zero when temporarily unavailable.
        port: u32,
    },

    /// GetPower - 20
    ///
    /// Asks for a [`Message::StatePower`] reply. No payload.
    GetPower,

    /// SetPower - 21
    ///
    /// Set the device power level.
    SetPower {
        /// Only 0 and 65535 are supported.
        level: u16,
    },

    /// StatePower - 22
    ///
    /// Response to [`Message::GetPower`].
    StatePower {
        /// Zero is standby, anything else is on.
        level: u16,
    },

    /// GetLabel - 23
    ///
    /// Asks for a [`Message::StateLabel`] reply. No payload.
    GetLabel,

    /// StateLabel - 25
    ///
    /// Response to [`Message::GetLabel`].
    StateLabel {
        /// The device label.
        label: Label,
    },

    /// GetColor - 101
    ///
    /// Asks for a [`Message::LightState`] reply. No payload.
    GetColor,

    /// SetColor - 102
    ///
    /// Drive the light to a color over a transition time.
    SetColor {
        /// Reserved, zero.
        reserved: u8,

        /// The color to show.
        color: HSBK,

        /// Transition time in milliseconds.
        duration: u32,
    },

    /// LightState - 107
    ///
    /// The light's current color, power and label.
    LightState {
        /// Current color.
        color: HSBK,

        /// Reserved.
        reserved: i16,

        /// Current power level.
        power: u16,

        /// The device label.
        label: Label,

        /// Reserved.
        reserved2: u64,
    },

    /// SetLightPower - 119
    ///
    /// Fade the light's power level over a transition time.
    SetLightPower {
        /// Only 0 and 65535 are supported.
        level: u16,

        /// Transition time in milliseconds.
        duration: u32,
    },
}

impl Message {
    /// The wire type code for this message.
    #[must_use]
    pub const fn get_num(&self) -> u16 {
        match self {
            Message::GetService => 2,
            Message::StateService { .. } => 3,
            Message::GetPower => 20,
            Message::SetPower { .. } => 21,
            Message::StatePower { .. } => 22,
            Message::GetLabel => 23,
            Message::StateLabel { .. } => 25,
            Message::GetColor => 101,
            Message::SetColor { .. } => 102,
            Message::LightState { .. } => 107,
            Message::SetLightPower { .. } => 119,
        }
    }

    /// Serialize the payload section of this message.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload field cannot be written.
    pub fn pack_payload(&self) -> Result<Vec<u8>, WireError> {
        let mut v = Vec::new();
        match self.clone() {
            Message::GetService | Message::GetPower | Message::GetLabel | Message::GetColor => {
                // these types have no payload
            }
            Message::StateService { service, port } => {
                v.write_val(service)?;
                v.write_val(port)?;
            }
            Message::SetPower { level } | Message::StatePower { level } => {
                v.write_val(level)?;
            }
            Message::StateLabel { label } => {
                v.write_val(label)?;
            }
            Message::SetColor {
                reserved,
                color,
                duration,
            } => {
                v.write_val(reserved)?;
                v.write_val(color)?;
                v.write_val(duration)?;
            }
            Message::LightState {
                color,
                reserved,
                power,
                label,
                reserved2,
            } => {
                v.write_val(color)?;
                v.write_val(reserved)?;
                v.write_val(power)?;
                v.write_val(label)?;
                v.write_val(reserved2)?;
            }
            Message::SetLightPower { level, duration } => {
                v.write_val(if level > 0 { 65535u16 } else { 0u16 })?;
                v.write_val(duration)?;
            }
        }
        Ok(v)
    }

    /// Parse the payload of a [`RawFrame`] based on its type code.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownType`] for type codes outside the subset
    /// this board speaks, or an I/O error for truncated payloads.
    pub fn from_raw(raw: &RawFrame) -> Result<Self, WireError> {
        let mut c = Cursor::new(&raw.payload);
        match raw.protocol_header.typ {
            2 => Ok(Message::GetService),
            3 => Ok(Message::StateService {
                service: c.read_val()?,
                port: c.read_val()?,
            }),
            20 => Ok(Message::GetPower),
            21 => Ok(Message::SetPower {
                level: c.read_val()?,
            }),
            22 => Ok(Message::StatePower {
                level: c.read_val()?,
            }),
            23 => Ok(Message::GetLabel),
            25 => Ok(Message::StateLabel {
                label: c.read_val()?,
            }),
            101 => Ok(Message::GetColor),
            102 => Ok(Message::SetColor {
                reserved: c.read_val()?,
                color: c.read_val()?,
                duration: c.read_val()?,
            }),
            107 => Ok(Message::LightState {
                color: c.read_val()?,
                reserved: c.read_val()?,
                power: c.read_val()?,
                label: c.read_val()?,
                reserved2: c.read_val()?,
            }),
            119 => Ok(Message::SetLightPower {
                level: c.read_val()?,
                duration: c.read_val()?,
            }),
            typ => Err(WireError::UnknownType(typ)),
        }
    }
}
