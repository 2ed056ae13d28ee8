// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable writer and bounds-checked reader for blob bytes.
//!
//! All integers are little-endian. Skippable slices are prefixed with an
//! unsigned LEB128 length so a reader can step over them without parsing.

use super::WireResult;
use crate::error::WireError;
use crate::leaf::LeafWidth;

/// Generate little-endian write methods for primitive types
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
    };
}

/// Generate little-endian read methods for primitive types
///
/// Each generated method checks bounds (`WireError::Truncated`), reads the
/// bytes and advances the offset.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> WireResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Append-only byte writer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_u16, u16);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_u64, u64);

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write the low `width` bytes of `bits`.
    pub fn write_leaf(&mut self, width: LeafWidth, bits: u64) {
        self.buffer
            .extend_from_slice(&bits.to_le_bytes()[..width.bytes()]);
    }

    /// Unsigned LEB128.
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buffer.push(byte);
                return;
            }
            self.buffer.push(byte | 0x80);
        }
    }

    /// Length-prefixed slice.
    pub fn write_skippable(&mut self, data: &[u8]) {
        self.write_varint(data.len() as u64);
        self.write_bytes(data);
    }

    /// Pad with zeros until the offset is a multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) {
        if alignment <= 1 {
            return;
        }
        let mask = alignment - 1;
        let aligned = (self.buffer.len() + mask) & !mask;
        self.buffer.resize(aligned, 0);
    }

    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Bounds-checked reader over a borrowed blob.
///
/// Offsets in errors are absolute within the outermost blob, even for
/// readers created over a sub-slice with [`ByteReader::sub`].
#[derive(Debug, Clone)]
pub struct ByteReader<'b> {
    buffer: &'b [u8],
    offset: usize,
    base: usize,
}

impl<'b> ByteReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            base: 0,
        }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_u64, u64, 8);

    pub fn read_bytes(&mut self, len: usize) -> WireResult<&'b [u8]> {
        if len > self.remaining() {
            return Err(WireError::Truncated {
                offset: self.position(),
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_leaf(&mut self, width: LeafWidth) -> WireResult<u64> {
        let mut bytes = [0u8; 8];
        bytes[..width.bytes()].copy_from_slice(self.read_bytes(width.bytes())?);
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn read_varint(&mut self) -> WireResult<u64> {
        let start = self.position();
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.read_u8()?;
            let chunk = u64::from(byte & 0x7F);
            if shift == 63 && chunk > 1 {
                return Err(WireError::InvalidVarInt { offset: start });
            }
            value |= chunk << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(WireError::InvalidVarInt { offset: start })
    }

    /// Read a length-prefixed slice.
    pub fn read_skippable(&mut self) -> WireResult<&'b [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| WireError::Truncated {
            offset: self.position(),
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.read_bytes(len)
    }

    /// Reader over a slice previously returned by this reader.
    pub fn sub(&self, slice: &'b [u8]) -> ByteReader<'b> {
        let start = slice.as_ptr() as usize - self.buffer.as_ptr() as usize;
        ByteReader {
            buffer: slice,
            offset: 0,
            base: self.base + start,
        }
    }

    /// Fail with `BadMagic` unless the next word equals `expected`.
    pub fn expect_magic(&mut self, expected: u32) -> WireResult<()> {
        let offset = self.position();
        let found = self.read_u32()?;
        if found != expected {
            return Err(WireError::BadMagic {
                offset,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Skip padding up to a multiple of `alignment`, relative to the outermost blob.
    pub fn align(&mut self, alignment: usize) -> WireResult<()> {
        if alignment <= 1 {
            return Ok(());
        }
        let mask = alignment - 1;
        let pos = self.position();
        let pad = ((pos + mask) & !mask) - pos;
        self.read_bytes(pad).map(|_| ())
    }

    /// Absolute offset in the outermost blob.
    pub fn position(&self) -> usize {
        self.base + self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    /// Fail with `TrailingBytes` unless the reader is exhausted.
    pub fn finish(&self) -> WireResult<()> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes {
                offset: self.position(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_roundtrip() {
        let mut w = ByteWriter::new();
        w.write_u8(0xAB);
        w.write_u16(0xCDEF);
        w.write_u32(0x1234_5678);
        w.write_u64(0x1122_3344_5566_7788);
        let bytes = w.into_inner();
        assert_eq!(&bytes[1..3], &[0xEF, 0xCD]);

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().expect("u8"), 0xAB);
        assert_eq!(r.read_u16().expect("u16"), 0xCDEF);
        assert_eq!(r.read_u32().expect("u32"), 0x1234_5678);
        assert_eq!(r.read_u64().expect("u64"), 0x1122_3344_5566_7788);
        assert!(r.is_eof());
    }

    #[test]
    fn test_varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u64::from(u32::MAX), u64::MAX] {
            let mut w = ByteWriter::new();
            w.write_varint(value);
            let bytes = w.into_inner();
            let mut r = ByteReader::new(&bytes);
            assert_eq!(r.read_varint().expect("varint"), value);
            r.finish().expect("fully consumed");
        }
        let mut w = ByteWriter::new();
        w.write_varint(127);
        assert_eq!(w.as_bytes(), &[0x7F]);
    }

    #[test]
    fn test_overlong_varint_rejected() {
        let bytes = [0xFFu8; 11];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_varint(), Err(WireError::InvalidVarInt { offset: 0 }));
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let bytes = [1u8, 2, 3];
        let mut r = ByteReader::new(&bytes);
        r.read_u8().expect("u8");
        assert_eq!(
            r.read_u32(),
            Err(WireError::Truncated {
                offset: 1,
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_skippable_and_sub_offsets() {
        let mut w = ByteWriter::new();
        w.write_u8(9);
        w.write_skippable(&[1, 2, 3]);
        let bytes = w.into_inner();

        let mut r = ByteReader::new(&bytes);
        r.read_u8().expect("u8");
        let slice = r.read_skippable().expect("slice");
        assert_eq!(slice, &[1, 2, 3]);
        let mut sub = r.sub(slice);
        sub.read_u16().expect("u16");
        assert_eq!(sub.position(), 4);
        assert!(sub.read_u16().is_err());
    }

    #[test]
    fn test_align_and_magic() {
        let mut w = ByteWriter::new();
        w.write_u8(1);
        w.align(4);
        w.write_u32(0xABCD_1234);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 8);

        let mut r = ByteReader::new(&bytes);
        r.read_u8().expect("u8");
        r.align(4).expect("pad");
        r.expect_magic(0xABCD_1234).expect("magic");

        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.expect_magic(0xABCD_1234),
            Err(WireError::BadMagic { offset: 0, .. })
        ));
    }

    #[test]
    fn test_leaf_widths() {
        let mut w = ByteWriter::new();
        w.write_leaf(LeafWidth::B16, 0xFFFF_1234);
        w.write_leaf(LeafWidth::B8, 0x1FF);
        let bytes = w.into_inner();
        assert_eq!(bytes, vec![0x34, 0x12, 0xFF]);
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_leaf(LeafWidth::B16).expect("b16"), 0x1234);
        assert_eq!(r.read_leaf(LeafWidth::B8).expect("b8"), 0xFF);
    }
}
