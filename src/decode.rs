//! Total transformations over raw query payloads.
//!
//! Everything in this module is a pure function of the bytes the
//! transaction engine returned: no blocking, no retries, no bus access.
//! Engine failures never reach these functions; decode failures are
//! limited to structurally short payloads.
//!
//! # String Trust Policies
//!
//! Strings on the wire are single-byte-per-character text in a
//! fixed-width field, terminated by a NUL. Two call sites apply two
//! different policies to the same split:
//!
//! - a bare string query decodes the *full* field when no NUL is present
//!   (the text may simply fill the field exactly),
//! - the info-struct name and the firmware fields treat a missing NUL as
//!   a transport truncation and report the field as absent.

use crate::error::{IndexerError, Result};
use crate::io::WordOrder;

/// Fixed number of bytes preceding the name tail in an info struct.
pub const INFO_STRUCT_FIXED_SIZE: usize = 20;

/// Decodes single-byte-per-character text (latin-1: every byte maps to
/// the code point of the same value).
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Splits a payload at the first NUL byte.
///
/// Returns `Some(prefix)` when a terminator was found inside the payload,
/// `None` when the field was transferred without one.
pub fn split_terminated(payload: &[u8]) -> Option<&[u8]> {
    payload
        .iter()
        .position(|&b| b == 0)
        .map(|pos| &payload[..pos])
}

/// Decodes a string field leniently: text up to the first NUL, or the
/// whole field when no NUL is present.
pub fn string_lenient(payload: &[u8]) -> String {
    decode_latin1(split_terminated(payload).unwrap_or(payload))
}

/// Decodes a string field strictly: `None` unless the terminating NUL
/// was found inside the field (a missing terminator means the text was
/// truncated by the transfer window).
pub fn string_strict(payload: &[u8]) -> Option<String> {
    split_terminated(payload).map(decode_latin1)
}

/// Expands a bitmap payload into the sorted list of set bit positions.
///
/// For every byte at position `g` and every bit `b` set within it, the
/// position `g * 8 + b` is emitted, in ascending order.
pub fn decode_bitmap(payload: &[u8]) -> Vec<u16> {
    let mut positions = Vec::new();
    for (group, &byte) in payload.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                positions.push(group as u16 * 8 + bit);
            }
        }
    }
    positions
}

/// Raw fields of the composite info struct, before unit and float
/// translation.
///
/// Wire layout (little-endian):
///
/// | Offset | Field | Type |
/// |--------|-------|------|
/// | 0 | typecode | u16 |
/// | 2 | size | u16 |
/// | 4 | address | u16 |
/// | 6 | unit code | u8 |
/// | 7 | unit exponent | i8 |
/// | 8 | flags | u32 |
/// | 12 | absolute minimum | u32 (raw binary32) |
/// | 16 | absolute maximum | u32 (raw binary32) |
/// | 20 | name | remaining bytes |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInfoStruct {
    /// Device type code.
    pub typecode: u16,
    /// Device size in bytes.
    pub size: u16,
    /// Device byte address.
    pub address: u16,
    /// Unit code of the main value.
    pub unit_code: u8,
    /// Power-of-ten scale exponent of the unit.
    pub unit_exp: i8,
    /// Flag dword; the low byte doubles as the device count hint on the
    /// indexer's own struct.
    pub flags: u32,
    /// Absolute minimum of the main value, raw register representation.
    pub absmin_raw: u32,
    /// Absolute maximum of the main value, raw register representation.
    pub absmax_raw: u32,
    /// Name field bytes, NUL-terminated when the name fit the window.
    pub name: Vec<u8>,
}

impl RawInfoStruct {
    /// Parses an info-struct payload.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ShortPayload` if fewer than the 20 fixed
    /// bytes were transferred.
    pub fn from_bytes(payload: &[u8]) -> Result<Self> {
        if payload.len() < INFO_STRUCT_FIXED_SIZE {
            return Err(IndexerError::short_payload(
                INFO_STRUCT_FIXED_SIZE,
                payload.len(),
            ));
        }

        Ok(Self {
            typecode: u16::from_le_bytes([payload[0], payload[1]]),
            size: u16::from_le_bytes([payload[2], payload[3]]),
            address: u16::from_le_bytes([payload[4], payload[5]]),
            unit_code: payload[6],
            unit_exp: payload[7] as i8,
            flags: u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]),
            absmin_raw: u32::from_le_bytes([payload[12], payload[13], payload[14], payload[15]]),
            absmax_raw: u32::from_le_bytes([payload[16], payload[17], payload[18], payload[19]]),
            name: payload[INFO_STRUCT_FIXED_SIZE..].to_vec(),
        })
    }

    /// Decodes the absolute minimum with the given word order.
    pub fn absmin(&self, order: WordOrder) -> f32 {
        order.decode_f32(self.absmin_raw)
    }

    /// Decodes the absolute maximum with the given word order.
    pub fn absmax(&self, order: WordOrder) -> f32 {
        order.decode_f32(self.absmax_raw)
    }

    /// Decodes the name field with the strict trust policy.
    pub fn name_string(&self) -> Option<String> {
        string_strict(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_struct_payload(name: &[u8]) -> Vec<u8> {
        let mut payload = vec![
            0x34, 0x12, // typecode 0x1234
            0x22, 0x00, // size 34
            0x40, 0x00, // address 64
            0x01, 0xFD, // unit code 1, exponent -3
            0x05, 0x00, 0x00, 0x80, // flags 0x8000_0005
        ];
        payload.extend_from_slice(&1.5f32.to_bits().to_le_bytes());
        payload.extend_from_slice(&100.0f32.to_bits().to_le_bytes());
        payload.extend_from_slice(name);
        payload
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_latin1(b"motor"), "motor");
        assert_eq!(decode_latin1(&[0x54, 0xE4, 0x6E, 0x6B]), "T\u{e4}nk");
        assert_eq!(decode_latin1(b""), "");
    }

    #[test]
    fn test_split_terminated() {
        assert_eq!(split_terminated(b"ABC\0XYZ"), Some(&b"ABC"[..]));
        assert_eq!(split_terminated(b"\0XYZ"), Some(&b""[..]));
        assert_eq!(split_terminated(b"ABCXYZ"), None);
    }

    #[test]
    fn test_string_lenient() {
        assert_eq!(string_lenient(b"ABC\0XYZ"), "ABC");
        // no terminator: the full field is decoded
        assert_eq!(string_lenient(b"ABCXYZ"), "ABCXYZ");
    }

    #[test]
    fn test_string_strict() {
        assert_eq!(string_strict(b"ABC\0XYZ"), Some("ABC".to_string()));
        // no terminator: the field counts as truncated
        assert_eq!(string_strict(b"ABCXYZ"), None);
        assert_eq!(string_strict(b"\0"), Some(String::new()));
    }

    #[test]
    fn test_decode_bitmap() {
        assert_eq!(decode_bitmap(&[0b0000_0101, 0b0000_0010]), vec![0, 2, 9]);
        assert_eq!(decode_bitmap(&[0, 0, 0x80]), vec![23]);
        assert_eq!(decode_bitmap(&[]), Vec::<u16>::new());
        assert_eq!(decode_bitmap(&[0xFF]), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_info_struct_from_bytes() {
        let payload = make_struct_payload(b"chopper\0\0\0\0\0");
        let info = RawInfoStruct::from_bytes(&payload).unwrap();

        assert_eq!(info.typecode, 0x1234);
        assert_eq!(info.size, 34);
        assert_eq!(info.address, 64);
        assert_eq!(info.unit_code, 1);
        assert_eq!(info.unit_exp, -3);
        assert_eq!(info.flags, 0x8000_0005);
        assert_eq!(info.absmin(WordOrder::Standard), 1.5);
        assert_eq!(info.absmax(WordOrder::Standard), 100.0);
        assert_eq!(info.name_string(), Some("chopper".to_string()));
    }

    #[test]
    fn test_info_struct_name_without_terminator() {
        // name fills the window exactly: cannot tell whether it was
        // truncated, so it must be reported absent
        let payload = make_struct_payload(b"verylongname");
        let info = RawInfoStruct::from_bytes(&payload).unwrap();
        assert_eq!(info.name_string(), None);
    }

    #[test]
    fn test_info_struct_swapped_floats() {
        let mut payload = make_struct_payload(b"x\0");
        let swapped = 1.5f32.to_bits().rotate_left(16).to_le_bytes();
        payload[12..16].copy_from_slice(&swapped);
        let info = RawInfoStruct::from_bytes(&payload).unwrap();
        assert_eq!(info.absmin(WordOrder::Swapped), 1.5);
    }

    #[test]
    fn test_info_struct_too_short() {
        let err = RawInfoStruct::from_bytes(&[0u8; 12]).unwrap_err();
        match err {
            IndexerError::ShortPayload { expected, actual } => {
                assert_eq!(expected, 20);
                assert_eq!(actual, 12);
            }
            other => panic!("expected ShortPayload, got {other:?}"),
        }
    }
}
