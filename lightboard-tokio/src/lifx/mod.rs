//! The LIFX LAN protocol: binary frame codec, UDP transport, discovery and
//! state polling.
//!
//! Frames are 36 bytes of header plus payload, little-endian throughout.
//! Discovery works by broadcasting [`msg::Message::GetService`] to the LAN;
//! every bulb answers with a `StateService` naming its UDP port, after which
//! all traffic is unicast. More info: <https://lan.developer.lifx.com/>

pub mod codec;
pub mod discovery;
pub mod msg;
pub mod transport;
pub mod wire;

use std::net::SocketAddr;

use lightboard_common::devices::MacAddress;

use self::msg::Message;

/// The UDP port LIFX bulbs listen on.
pub const LIFX_PORT: u16 = 56700;

/// A decoded message received from the network.
#[derive(Debug, Clone)]
pub struct LifxEvent {
    /// The sender's hardware address, from the frame target field.
    pub mac: MacAddress,

    /// The address the frame arrived from.
    pub addr: SocketAddr,

    /// The decoded message.
    pub message: Message,
}
