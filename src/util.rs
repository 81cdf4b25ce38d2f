//! Small helpers for binary field content.
//!
//! This module provides:
//! - Little-endian reads and writes on unaligned byte slices (via byteorder)
//! - NUL terminator search (via memchr)
//! - Hex digit decoding and hex dump formatting

use std::fmt::Write as _;

use byteorder::{ByteOrder, LittleEndian};

// =============================================================================
// Unaligned Little-Endian Access
// =============================================================================

/// Reads a little-endian u16 from a byte slice at the given offset.
///
/// Returns `None` if the slice is too short.
#[inline]
pub fn read_u16_le_at(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset.checked_add(2)?)
        .map(LittleEndian::read_u16)
}

/// Reads a little-endian u32 from a byte slice at the given offset.
///
/// Returns `None` if the slice is too short.
#[inline]
pub fn read_u32_le_at(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset.checked_add(4)?)
        .map(LittleEndian::read_u32)
}

/// Encodes a u32 as four little-endian bytes.
#[inline(always)]
pub fn u32_le_bytes(value: u32) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    LittleEndian::write_u32(&mut bytes, value);
    bytes
}

// =============================================================================
// Byte Search
// =============================================================================

/// Finds the position of the first null byte in a slice.
///
/// Returns `data.len()` if there is none.
#[inline(always)]
pub fn memchr_null(data: &[u8]) -> usize {
    memchr::memchr(0, data).unwrap_or(data.len())
}

// =============================================================================
// Hex Helpers
// =============================================================================

/// Decodes a single ASCII hex digit.
#[inline(always)]
pub const fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Formats bytes as a hex dump with 16 bytes per row and a column header.
pub fn hex_dump(data: &[u8]) -> String {
    const ROW_LENGTH: usize = 0x10;

    let mut out = String::with_capacity(8 + ROW_LENGTH * 3 + data.len() * 3 + data.len() / 2);
    out.push('\t');
    for column in 0..ROW_LENGTH {
        let _ = write!(out, " {:2X}", column);
    }
    for (offset, byte) in data.iter().enumerate() {
        if offset % ROW_LENGTH == 0 {
            let _ = write!(out, "\n\t0x{:02x}:\t", offset);
        }
        let _ = write!(out, " {:02X}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_le_at() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(read_u16_le_at(&data, 0), Some(0x0201));
        assert_eq!(read_u32_le_at(&data, 1), Some(0x05040302));
        assert_eq!(read_u32_le_at(&data, 2), None);
        assert_eq!(read_u16_le_at(&data, usize::MAX), None);
    }

    #[test]
    fn test_u32_le_bytes() {
        assert_eq!(u32_le_bytes(0x2144DF1C), [0x1C, 0xDF, 0x44, 0x21]);
    }

    #[test]
    fn test_memchr_null() {
        assert_eq!(memchr_null(b"hello\0world"), 5);
        assert_eq!(memchr_null(b"\0"), 0);
        assert_eq!(memchr_null(b"hello"), 5);
    }

    #[test]
    fn test_hex_digit() {
        assert_eq!(hex_digit(b'0'), Some(0));
        assert_eq!(hex_digit(b'a'), Some(10));
        assert_eq!(hex_digit(b'F'), Some(15));
        assert_eq!(hex_digit(b'g'), None);
        assert_eq!(hex_digit(b' '), None);
    }

    #[test]
    fn test_hex_dump_rows() {
        let dump = hex_dump(&[0xAB; 17]);
        assert!(dump.contains("0x00:"));
        assert!(dump.contains("0x10:"));
        assert_eq!(dump.matches("AB").count(), 17);
    }
}
