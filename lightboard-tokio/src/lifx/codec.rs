//! Little-endian readers and writers for the wire types.

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use lightboard_common::lights::HSBK;

/// Read a value in LIFX wire order.
pub trait WireReader<T> {
    /// Read one value from the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read_val(&mut self) -> Result<T, io::Error>;
}

/// Write a value in LIFX wire order.
pub trait WireWriter<T>: WriteBytesExt {
    /// Append one value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn write_val(&mut self, v: T) -> Result<(), io::Error>;
}

impl<R: ReadBytesExt> WireReader<u8> for R {
    fn read_val(&mut self) -> Result<u8, io::Error> {
        self.read_u8()
    }
}

impl<T: WriteBytesExt> WireWriter<u8> for T {
    fn write_val(&mut self, v: u8) -> Result<(), io::Error> {
        self.write_u8(v)
    }
}

macro_rules! derive_reader {
    { $( $m:ident: $t:ty ),* } => {
        $(
            impl<R: ReadBytesExt> WireReader<$t> for R {
                fn read_val(&mut self) -> Result<$t, io::Error> {
                    self.$m::<LittleEndian>()
                }
            }
        )*
    }
}

derive_reader! { read_u16: u16, read_i16: i16, read_u32: u32, read_u64: u64 }

macro_rules! derive_writer {
    { $( $m:ident: $t:ty ),* } => {
        $(
            impl<T: WriteBytesExt> WireWriter<$t> for T {
                fn write_val(&mut self, v: $t) -> Result<(), io::Error> {
                    self.$m::<LittleEndian>(v)
                }
            }
        )*
    }
}

derive_writer! { write_u16: u16, write_i16: i16, write_u32: u32, write_u64: u64 }

impl<R: ReadBytesExt> WireReader<HSBK> for R {
    fn read_val(&mut self) -> Result<HSBK, io::Error> {
        Ok(HSBK {
            hue: self.read_val()?,
            saturation: self.read_val()?,
            brightness: self.read_val()?,
            kelvin: self.read_val()?,
        })
    }
}

impl<T: WriteBytesExt> WireWriter<HSBK> for T {
    fn write_val(&mut self, v: HSBK) -> Result<(), io::Error> {
        self.write_val(v.hue)?;
        self.write_val(v.saturation)?;
        self.write_val(v.brightness)?;
        self.write_val(v.kelvin)?;
        Ok(())
    }
}

/// A device label: at most 32 bytes of UTF-8, NUL-padded on the wire.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Label(String);

impl Label {
    /// Construct a label, truncating to 32 bytes on a character boundary.
    #[must_use]
    pub fn new(s: &str) -> Self {
        let mut end = s.len().min(32);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        Self(s[..end].to_string())
    }

    /// The label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::cmp::PartialEq<str> for Label {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl<R: ReadBytesExt> WireReader<Label> for R {
    fn read_val(&mut self) -> Result<Label, io::Error> {
        let mut buf = [0u8; 32];
        self.read_exact(&mut buf)?;
        let len = buf.iter().position(|&b| b == 0).unwrap_or(32);
        Ok(Label(String::from_utf8_lossy(&buf[..len]).into_owned()))
    }
}

impl<T: WriteBytesExt> WireWriter<Label> for T {
    fn write_val(&mut self, v: Label) -> Result<(), io::Error> {
        let bytes = v.0.as_bytes();
        for i in 0..32 {
            self.write_u8(bytes.get(i).copied().unwrap_or(0))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_label_round_trip() {
        let mut v = Vec::new();
        v.write_val(Label::new("Kitchen")).unwrap();
        assert_eq!(v.len(), 32);
        assert_eq!(&v[..7], b"Kitchen");
        assert!(v[7..].iter().all(|&b| b == 0));

        let label: Label = Cursor::new(&v).read_val().unwrap();
        assert_eq!(label, *"Kitchen");
    }

    #[test]
    fn test_label_truncates_on_char_boundary() {
        let long = "é".repeat(20);
        let label = Label::new(&long);
        assert!(label.as_str().len() <= 32);
        assert!(label.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_hsbk_wire_order() {
        let color = HSBK {
            hue: 0x1122,
            saturation: 0x3344,
            brightness: 0x5566,
            kelvin: 0x7788,
        };
        let mut v = Vec::new();
        v.write_val(color).unwrap();
        assert_eq!(v, vec![0x22, 0x11, 0x44, 0x33, 0x66, 0x55, 0x88, 0x77]);

        let back: HSBK = Cursor::new(&v).read_val().unwrap();
        assert_eq!(back, color);
    }
}
