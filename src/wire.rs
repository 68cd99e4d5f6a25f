//! The scalar wire primitives underlying everything else: varints, zig-zag,
//! tags and the fixed-width types.
//!
//! All parsing functions are total on length. Running off the end of a
//! slice mid-value is [`Error::Underrun`]; a length prefix declaring more
//! bytes than the slice holds is [`Error::Overflow`].

use byteorder::{ByteOrder, LittleEndian};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;

use crate::Error;

/// Maximum encoded length of a varint, in bytes.
pub const MAX_VARINT_LEN: usize = 10;

/// How a field's payload is delimited on the wire.
///
/// The deprecated group types (3 and 4) and the reserved values 6 and 7 are
/// rejected during tag decoding.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Primitive)]
pub enum WireType {
    /// Base-128 variable-length integer.
    Varint = 0,
    /// Eight bytes, little endian.
    Fixed64 = 1,
    /// Varint length prefix followed by that many payload bytes.
    Length = 2,
    /// Four bytes, little endian.
    Fixed32 = 5,
}

/// Returns the number of bytes `value` occupies as a varint (1 to 10).
pub fn varint_size(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Appends `value` to `out` as a varint.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Encodes `value` as a varint into a fresh buffer.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_size(value));
    write_varint(&mut out, value);
    out
}

/// Decodes a varint from the start of `buf`, returning the value and the
/// number of bytes consumed.
///
/// A tenth byte with the continuation bit still set is [`Error::Varint`];
/// a slice ending mid-varint is [`Error::Underrun`].
pub fn read_varint(buf: &[u8]) -> Result<(u64, usize), Error> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if buf.len() < MAX_VARINT_LEN {
        Err(Error::Underrun)
    } else {
        Err(Error::Varint)
    }
}

/// Maps a signed 32-bit integer onto an unsigned one so that small
/// negatives encode as small varints.
pub fn zigzag32(value: i32) -> u32 {
    ((value as u32) << 1) ^ ((value >> 31) as u32)
}

/// Inverse of [`zigzag32`].
pub fn unzigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Maps a signed 64-bit integer onto an unsigned one so that small
/// negatives encode as small varints.
pub fn zigzag64(value: i64) -> u64 {
    ((value as u64) << 1) ^ ((value >> 63) as u64)
}

/// Inverse of [`zigzag64`].
pub fn unzigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Packs a field number and wire type into a tag value.
pub fn pack_tag(field: u32, wiretype: WireType) -> u64 {
    (u64::from(field) << 3) | wiretype as u64
}

/// Splits a raw tag value into its field number and wire type.
///
/// Unknown wire types are [`Error::Wiretype`]; the illegal field number
/// zero is [`Error::Descriptor`].
pub fn unpack_tag(raw: u64) -> Result<(u32, WireType), Error> {
    let wiretype = WireType::from_u64(raw & 7).ok_or(Error::Wiretype(raw & 7))?;
    let field = u32::try_from(raw >> 3).map_err(|_| Error::Varint)?;
    if field == 0 {
        return Err(Error::Descriptor);
    }

    Ok((field, wiretype))
}

/// Decodes one tag from the start of `buf`, returning the field number,
/// wire type and bytes consumed.
pub fn read_tag(buf: &[u8]) -> Result<(u32, WireType, usize), Error> {
    let (raw, consumed) = read_varint(buf)?;
    let (field, wiretype) = unpack_tag(raw)?;
    Ok((field, wiretype, consumed))
}

/// Reads a little-endian 32-bit value from the start of `buf`.
pub fn read_fixed32(buf: &[u8]) -> Result<u32, Error> {
    if buf.len() < 4 {
        return Err(Error::Underrun);
    }
    Ok(LittleEndian::read_u32(buf))
}

/// Reads a little-endian 64-bit value from the start of `buf`.
pub fn read_fixed64(buf: &[u8]) -> Result<u64, Error> {
    if buf.len() < 8 {
        return Err(Error::Underrun);
    }
    Ok(LittleEndian::read_u64(buf))
}

/// Appends `value` to `out` as four little-endian bytes.
pub fn write_fixed32(out: &mut Vec<u8>, value: u32) {
    let mut bytes = [0; 4];
    LittleEndian::write_u32(&mut bytes, value);
    out.extend_from_slice(&bytes);
}

/// Appends `value` to `out` as eight little-endian bytes.
pub fn write_fixed64(out: &mut Vec<u8>, value: u64) {
    let mut bytes = [0; 8];
    LittleEndian::write_u64(&mut bytes, value);
    out.extend_from_slice(&bytes);
}

/// Returns the total length of one payload of `wiretype` at the start of
/// `buf`, including the length prefix for [`WireType::Length`].
///
/// This is what drives skipping unknown fields.
pub fn payload_len(wiretype: WireType, buf: &[u8]) -> Result<usize, Error> {
    match wiretype {
        WireType::Varint => {
            let (_, consumed) = read_varint(buf)?;
            Ok(consumed)
        }
        WireType::Fixed64 => {
            if buf.len() < 8 {
                Err(Error::Underrun)
            } else {
                Ok(8)
            }
        }
        WireType::Length => {
            let (len, consumed) = read_varint(buf)?;
            let len = usize::try_from(len).map_err(|_| Error::Overflow)?;
            let total = consumed.checked_add(len).ok_or(Error::Overflow)?;
            if total > buf.len() {
                Err(Error::Overflow)
            } else {
                Ok(total)
            }
        }
        WireType::Fixed32 => {
            if buf.len() < 4 {
                Err(Error::Underrun)
            } else {
                Ok(4)
            }
        }
    }
}
