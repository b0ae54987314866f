//! # Field Values & Order-Preserving Tuple Encoding
//!
//! Purpose: Provide the typed value model shared by keys and columns, plus a
//! canonical, self-delimiting byte encoding for a single value that sorts
//! lexicographically the same way the value sorts logically. This is the
//! primitive the key codec (§4.5) builds on; it never itself knows about
//! tables, comparators, or data models.
//!
//! ## Design Principles
//!
//! 1. **Self-Delimiting**: Every encoded component carries its own length (or
//!    is escaped to a terminator), so a sequence of components can be
//!    decoded without an external length table.
//! 2. **Order-Preserving**: `encode_component(a) < encode_component(b)` as
//!    byte strings iff `a < b` as values of the same variant. This is the
//!    FoundationDB tuple-layer encoding (type tag + sign/exponent-flipped
//!    fixed-width numbers, NUL-escaped variable-length strings).
//! 3. **Closed Set**: Five variants only. Adding a sixth means updating the
//!    tag table below, not inferring a tag from `std::mem::discriminant`.

use std::cmp::Ordering;

/// A single application-level value: a key field or a column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
}

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_BYTES: u8 = 0x04;
const TAG_TEXT: u8 = 0x05;

/// Maps an `i64` to a `u64` whose unsigned ordering matches the signed
/// ordering of the original value (flip the sign bit).
fn order_preserving_int(value: i64) -> u64 {
    (value as u64) ^ 0x8000_0000_0000_0000
}

fn order_preserving_int_inverse(bits: u64) -> i64 {
    (bits ^ 0x8000_0000_0000_0000) as i64
}

/// Maps an `f64` to a `u64` whose unsigned ordering matches the IEEE-754
/// total order of non-NaN values (flip the sign bit for positives, invert
/// all bits for negatives).
fn order_preserving_float(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    }
}

fn order_preserving_float_inverse(bits: u64) -> f64 {
    let restored = if bits & 0x8000_0000_0000_0000 != 0 {
        bits & 0x7FFF_FFFF_FFFF_FFFF
    } else {
        !bits
    };
    f64::from_bits(restored)
}

/// Appends the NUL-escaped, terminator-delimited encoding of `data` to
/// `out`: every literal `0x00` byte becomes `0x00 0xFF`, and the whole
/// component ends with a single `0x00`. A shorter string always sorts
/// before a longer string sharing its prefix because the terminator byte
/// (`0x00`) is the lowest possible byte value.
fn push_escaped(out: &mut Vec<u8>, data: &[u8]) {
    for &byte in data {
        if byte == 0x00 {
            out.push(0x00);
            out.push(0xFF);
        } else {
            out.push(byte);
        }
    }
    out.push(0x00);
}

/// Reads one NUL-escaped component starting at `pos`, returning the
/// unescaped bytes and the position just past the terminator.
fn read_escaped(bytes: &[u8], mut pos: usize) -> Result<(Vec<u8>, usize), &'static str> {
    let mut out = Vec::new();
    loop {
        match bytes.get(pos) {
            None => return Err("truncated_component"),
            Some(0x00) => match bytes.get(pos + 1) {
                Some(0xFF) => {
                    out.push(0x00);
                    pos += 2;
                }
                _ => return Ok((out, pos + 1)),
            },
            Some(&b) => {
                out.push(b);
                pos += 1;
            }
        }
    }
}

/// Encodes a single value as a self-delimiting, order-preserving byte
/// string and appends it to `out`.
pub fn encode_component(value: &FieldValue, out: &mut Vec<u8>) {
    match value {
        FieldValue::Null => out.push(TAG_NULL),
        FieldValue::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*b));
        }
        FieldValue::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&order_preserving_int(*i).to_be_bytes());
        }
        FieldValue::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&order_preserving_float(*f).to_be_bytes());
        }
        FieldValue::Bytes(data) => {
            out.push(TAG_BYTES);
            push_escaped(out, data);
        }
        FieldValue::Text(text) => {
            out.push(TAG_TEXT);
            push_escaped(out, text.as_bytes());
        }
    }
}

/// Decodes one value starting at `pos`, returning the value and the
/// position just past it.
pub fn decode_component(bytes: &[u8], pos: usize) -> Result<(FieldValue, usize), &'static str> {
    let tag = *bytes.get(pos).ok_or("truncated_component")?;
    let pos = pos + 1;
    match tag {
        TAG_NULL => Ok((FieldValue::Null, pos)),
        TAG_BOOL => {
            let b = *bytes.get(pos).ok_or("truncated_component")?;
            Ok((FieldValue::Bool(b != 0), pos + 1))
        }
        TAG_INT => {
            let end = pos + 8;
            let chunk: [u8; 8] = bytes
                .get(pos..end)
                .ok_or("truncated_component")?
                .try_into()
                .map_err(|_| "truncated_component")?;
            let bits = u64::from_be_bytes(chunk);
            Ok((FieldValue::Int(order_preserving_int_inverse(bits)), end))
        }
        TAG_FLOAT => {
            let end = pos + 8;
            let chunk: [u8; 8] = bytes
                .get(pos..end)
                .ok_or("truncated_component")?
                .try_into()
                .map_err(|_| "truncated_component")?;
            let bits = u64::from_be_bytes(chunk);
            Ok((
                FieldValue::Float(order_preserving_float_inverse(bits)),
                end,
            ))
        }
        TAG_BYTES => {
            let (data, end) = read_escaped(bytes, pos)?;
            Ok((FieldValue::Bytes(data), end))
        }
        TAG_TEXT => {
            let (data, end) = read_escaped(bytes, pos)?;
            let text = String::from_utf8(data).map_err(|_| "invalid_utf8")?;
            Ok((FieldValue::Text(text), end))
        }
        _ => Err("unknown_tag"),
    }
}

/// Total ordering of two values of the same variant, matching what
/// `encode_component` produces byte-for-byte.
impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let mut a = Vec::new();
        let mut b = Vec::new();
        encode_component(self, &mut a);
        encode_component(other, &mut b);
        Some(a.cmp(&b))
    }
}
