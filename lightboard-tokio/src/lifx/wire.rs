//! The three header sections of a LIFX frame, and whole-frame packing.

use std::io::Cursor;

use byteorder::WriteBytesExt;
use thiserror::Error;

use super::codec::{WireReader, WireWriter};
use super::msg::Message;

/// Every frame starts with this many header bytes.
pub const HEADER_SIZE: usize = 36;

/// The protocol number carried by every LIFX frame.
pub const PROTOCOL: u16 = 1024;

/// An error encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum WireError {
    /// The buffer is shorter than the 36-byte header.
    #[error("short frame: {0} bytes")]
    ShortFrame(usize),

    /// The protocol field was not 1024.
    #[error("bad protocol: {0}")]
    BadProtocol(u16),

    /// The message type is not known to this codec.
    ///
    /// Bulbs send undocumented internal messages, so this is expected
    /// traffic; callers log and skip it.
    #[error("unknown message type: {0}")]
    UnknownType(u16),

    /// An underlying I/O error while packing or unpacking.
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

/// The Frame section: size, protocol and addressing mode.
///
/// `tagged` indicates whether the target field addresses an individual
/// device or all devices; a broadcast frame is tagged with an all-zero
/// target.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Frame {
    /// Size of the entire message in bytes, including the header.
    pub size: u16,

    /// Message origin indicator, two bits, zero.
    pub origin: u8,

    /// True when the frame addresses all devices.
    pub tagged: bool,

    /// Must be one.
    pub addressable: bool,

    /// Must be [`PROTOCOL`].
    pub protocol: u16,

    /// Process-unique client identifier, echoed in replies.
    pub source: u32,
}

impl Frame {
    pub(crate) const fn packed_size() -> usize {
        8
    }

    pub(crate) fn pack(&self) -> Result<Vec<u8>, WireError> {
        let mut v = Vec::with_capacity(Self::packed_size());
        v.write_val(self.size)?;

        // origin + tagged + addressable + protocol packed into one u16
        let mut d = u16::from(self.origin & 0b11) << 14;
        d |= u16::from(self.tagged) << 13;
        d |= u16::from(self.addressable) << 12;
        d |= self.protocol & 0b1111_1111_1111;
        v.write_val(d)?;

        v.write_val(self.source)?;
        Ok(v)
    }

    pub(crate) fn unpack(v: &[u8]) -> Result<Self, WireError> {
        let mut c = Cursor::new(v);

        let size = c.read_val()?;
        let d: u16 = c.read_val()?;

        #[allow(clippy::cast_possible_truncation)]
        let origin = ((d & 0b1100_0000_0000_0000) >> 14) as u8;
        let tagged = d & 0b0010_0000_0000_0000 > 0;
        let addressable = d & 0b0001_0000_0000_0000 > 0;
        let protocol = d & 0b0000_1111_1111_1111;

        if protocol != PROTOCOL {
            return Err(WireError::BadProtocol(protocol));
        }

        let source = c.read_val()?;

        Ok(Self {
            size,
            origin,
            tagged,
            addressable,
            protocol,
            source,
        })
    }
}

/// The Frame Address section: target device, reply flags and sequence.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FrameAddress {
    /// 6-byte device address packed into the low bits, or zero for all
    /// devices.
    pub target: u64,

    /// Must all be zero.
    pub reserved: [u8; 6],

    /// Reserved, six bits.
    pub reserved2: u8,

    /// Ask the device for an Acknowledgement message.
    pub ack_required: bool,

    /// Ask the device for a State reply.
    pub res_required: bool,

    /// Wrap-around message sequence number.
    pub sequence: u8,
}

impl FrameAddress {
    pub(crate) const fn packed_size() -> usize {
        16
    }

    pub(crate) fn pack(&self) -> Result<Vec<u8>, WireError> {
        let mut v = Vec::with_capacity(Self::packed_size());
        v.write_val(self.target)?;
        for b in self.reserved {
            v.write_u8(b)?;
        }
        let flags =
            (self.reserved2 << 2) | (u8::from(self.ack_required) << 1) | u8::from(self.res_required);
        v.write_u8(flags)?;
        v.write_u8(self.sequence)?;
        Ok(v)
    }

    pub(crate) fn unpack(v: &[u8]) -> Result<Self, WireError> {
        let mut c = Cursor::new(v);

        let target = c.read_val()?;

        let mut reserved = [0u8; 6];
        for slot in &mut reserved {
            *slot = c.read_val()?;
        }

        let flags: u8 = c.read_val()?;
        let reserved2 = (flags & 0b1111_1100) >> 2;
        let ack_required = flags & 0b10 > 0;
        let res_required = flags & 0b01 > 0;

        let sequence = c.read_val()?;

        Ok(Self {
            target,
            reserved,
            reserved2,
            ack_required,
            res_required,
            sequence,
        })
    }
}

/// The Protocol Header section: the message type.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ProtocolHeader {
    /// Reserved, zero.
    pub reserved: u64,

    /// Message type, determines the payload layout.
    pub typ: u16,

    /// Reserved, zero.
    pub reserved2: u16,
}

impl ProtocolHeader {
    pub(crate) const fn packed_size() -> usize {
        12
    }

    pub(crate) fn pack(&self) -> Result<Vec<u8>, WireError> {
        let mut v = Vec::with_capacity(Self::packed_size());
        v.write_val(self.reserved)?;
        v.write_val(self.typ)?;
        v.write_val(self.reserved2)?;
        Ok(v)
    }

    pub(crate) fn unpack(v: &[u8]) -> Result<Self, WireError> {
        let mut c = Cursor::new(v);
        Ok(Self {
            reserved: c.read_val()?,
            typ: c.read_val()?,
            reserved2: c.read_val()?,
        })
    }
}

/// Options used to build a [`RawFrame`] for sending.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// The device to address; `None` broadcasts to all devices.
    pub target: Option<u64>,

    /// Ask for an Acknowledgement message.
    pub ack_required: bool,

    /// Ask for a State reply.
    pub res_required: bool,

    /// Wrap-around sequence number distinguishing replies.
    pub sequence: u8,

    /// Process-unique client identifier; must be nonzero for unicast
    /// replies to come back to this socket.
    pub source: u32,
}

/// A complete frame: the three header sections plus the raw payload.
///
/// This is what is sent and received via UDP. Use [`Message::from_raw`] to
/// parse the payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawFrame {
    /// The Frame section.
    pub frame: Frame,

    /// The Frame Address section.
    pub frame_addr: FrameAddress,

    /// The Protocol Header section.
    pub protocol_header: ProtocolHeader,

    /// The message payload.
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// Build a frame ready for the network from a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn build(options: &BuildOptions, message: Message) -> Result<Self, WireError> {
        let frame = Frame {
            size: 0,
            origin: 0,
            tagged: options.target.is_none(),
            addressable: true,
            protocol: PROTOCOL,
            source: options.source,
        };
        let frame_addr = FrameAddress {
            target: options.target.unwrap_or(0),
            reserved: [0; 6],
            reserved2: 0,
            ack_required: options.ack_required,
            res_required: options.res_required,
            sequence: options.sequence,
        };
        let protocol_header = ProtocolHeader {
            reserved: 0,
            typ: message.get_num(),
            reserved2: 0,
        };

        let mut raw = Self {
            frame,
            frame_addr,
            protocol_header,
            payload: message.pack_payload()?,
        };
        raw.frame.size = u16::try_from(raw.packed_size()).unwrap_or(u16::MAX);
        Ok(raw)
    }

    /// The total size in bytes of the packed frame.
    #[must_use]
    pub fn packed_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Pack the frame into bytes for the network.
    ///
    /// # Errors
    ///
    /// Returns an error if a header section cannot be serialized.
    pub fn pack(&self) -> Result<Vec<u8>, WireError> {
        let mut v = Vec::with_capacity(self.packed_size());
        v.extend(self.frame.pack()?);
        v.extend(self.frame_addr.pack()?);
        v.extend(self.protocol_header.pack()?);
        v.extend(&self.payload);
        Ok(v)
    }

    /// Unpack bytes read from the network.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::ShortFrame`] for anything below the 36-byte
    /// header and [`WireError::BadProtocol`] when the protocol field is not
    /// 1024.
    pub fn unpack(v: &[u8]) -> Result<Self, WireError> {
        if v.len() < HEADER_SIZE {
            return Err(WireError::ShortFrame(v.len()));
        }

        let frame = Frame::unpack(v)?;
        let mut start = Frame::packed_size();
        let frame_addr = FrameAddress::unpack(&v[start..])?;
        start += FrameAddress::packed_size();
        let protocol_header = ProtocolHeader::unpack(&v[start..])?;
        start += ProtocolHeader::packed_size();

        let end = (frame.size as usize).clamp(start, v.len());
        let payload = Vec::from(&v[start..end]);

        Ok(Self {
            frame,
            frame_addr,
            protocol_header,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use lightboard_common::lights::HSBK;

    #[test]
    fn test_frame_pack_unpack() {
        let frame = Frame {
            size: 0x1122,
            origin: 0,
            tagged: true,
            addressable: true,
            protocol: PROTOCOL,
            source: 1_234_567,
        };

        let v = frame.pack().unwrap();
        assert_eq!(v[0], 0x22);
        assert_eq!(v[1], 0x11);
        assert_eq!(v.len(), Frame::packed_size());

        let unpacked = Frame::unpack(&v).unwrap();
        assert_eq!(frame, unpacked);
    }

    #[test]
    fn test_frame_rejects_bad_protocol() {
        let mut v = Frame {
            size: 36,
            origin: 0,
            tagged: false,
            addressable: true,
            protocol: PROTOCOL,
            source: 1,
        }
        .pack()
        .unwrap();
        // Clobber the protocol bits.
        v[2] = 0xff;
        assert!(matches!(
            Frame::unpack(&v),
            Err(WireError::BadProtocol(_))
        ));
    }

    #[test]
    fn test_frame_address_pack_unpack() {
        let addr = FrameAddress {
            target: 0x1122_4488,
            reserved: [0; 6],
            reserved2: 0,
            ack_required: true,
            res_required: false,
            sequence: 248,
        };

        let v = addr.pack().unwrap();
        assert_eq!(v.len(), FrameAddress::packed_size());

        let unpacked = FrameAddress::unpack(&v).unwrap();
        assert_eq!(addr, unpacked);
    }

    #[test]
    fn test_short_frame_rejected() {
        let err = RawFrame::unpack(&[0u8; 35]).unwrap_err();
        assert!(matches!(err, WireError::ShortFrame(35)));
    }

    #[test]
    fn test_get_service_broadcast_is_36_bytes() {
        let raw = RawFrame::build(
            &BuildOptions {
                target: None,
                ack_required: false,
                res_required: false,
                sequence: 0,
                source: 0x1234_5678,
            },
            Message::GetService,
        )
        .unwrap();

        let bytes = raw.pack().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        // size field
        assert_eq!(bytes[0], 36);
        // tagged bit set for broadcast
        assert_eq!(bytes[3] & 0x20, 0x20);
        // all-zero target
        assert!(bytes[8..16].iter().all(|&b| b == 0));
        // type = 2
        assert_eq!(bytes[32], 2);
        assert_eq!(bytes[33], 0);
    }

    #[test]
    fn test_set_color_packet_golden_bytes() {
        // Packet layout from https://lan.developer.lifx.com/docs/building-a-lifx-packet
        let raw = RawFrame::build(
            &BuildOptions {
                target: None,
                ack_required: false,
                res_required: false,
                sequence: 0,
                source: 0,
            },
            Message::SetColor {
                reserved: 0,
                color: HSBK {
                    hue: 21845,
                    saturation: 0xffff,
                    brightness: 0xffff,
                    kelvin: 3500,
                },
                duration: 1024,
            },
        )
        .unwrap();

        let bytes = raw.pack().unwrap();
        assert_eq!(bytes.len(), 49);
        assert_eq!(
            bytes,
            vec![
                0x31, 0x00, 0x00, 0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x66, 0x00, 0x00, 0x00, 0x00, 0x55, 0x55,
                0xFF, 0xFF, 0xFF, 0xFF, 0xAC, 0x0D, 0x00, 0x04, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_full_round_trip() {
        let raw = RawFrame::build(
            &BuildOptions {
                target: Some(0x0000_11aa_00d5_73d0),
                ack_required: false,
                res_required: true,
                sequence: 7,
                source: 99,
            },
            Message::SetLightPower {
                level: 65535,
                duration: 250,
            },
        )
        .unwrap();

        let bytes = raw.pack().unwrap();
        let unpacked = RawFrame::unpack(&bytes).unwrap();
        assert_eq!(raw, unpacked);
        assert!(!unpacked.frame.tagged);
        assert_eq!(unpacked.frame_addr.sequence, 7);
    }
}
