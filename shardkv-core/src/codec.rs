//! # Codec (C5)
//!
//! Purpose: Turn application-level keys and values into backend byte
//! strings and back, under the three data models (§4.5). Built entirely on
//! `shardkv_common::field`'s order-preserving component encoding — this
//! module's job is assembling/disassembling components in the right order
//! for a given `key_def`/`columns_def`, not inventing a new byte format.

use shardkv_common::field::{decode_component, encode_component};
use shardkv_common::{FieldValue, ShardKvError, ShardKvResult};

use crate::descriptor::{DataModel, Fields};

/// Encodes `fields` into a single backend key, in the exact order of
/// `key_def` (§4.5). `fields` must name exactly the fields in `key_def`, in
/// any order; duplicate field names in either is a caller bug, not handled
/// here.
pub fn encode_key(key_def: &[String], fields: &Fields) -> ShardKvResult<Vec<u8>> {
    if fields.len() != key_def.len() {
        return Err(key_mismatch(key_def, fields));
    }
    let mut out = Vec::new();
    for name in key_def {
        let value = fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| key_mismatch(key_def, fields))?;
        encode_component(value, &mut out);
    }
    Ok(out)
}

/// Decodes a backend key produced by `encode_key` back into named fields, in
/// `key_def` order.
pub fn decode_key(key_def: &[String], bytes: &[u8]) -> ShardKvResult<Fields> {
    let mut pos = 0;
    let mut out = Vec::with_capacity(key_def.len());
    for name in key_def {
        let (value, next) = decode_component(bytes, pos)
            .map_err(|reason| ShardKvError::invalid_argument("key_mismatch", "key", reason))?;
        out.push((name.clone(), value));
        pos = next;
    }
    if pos != bytes.len() {
        return Err(ShardKvError::invalid_argument(
            "key_mismatch",
            "key",
            "trailing_bytes",
        ));
    }
    Ok(out)
}

fn key_mismatch(key_def: &[String], fields: &Fields) -> ShardKvError {
    let got: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
    ShardKvError::invalid_argument("key_mismatch", "key", format!("{key_def:?} vs {got:?}"))
}

/// Encodes `columns` per `data_model` (§4.5). `columns_def` is the shard's
/// canonical column order (ignored for `binary`, positional for `array`,
/// unused for `hash`).
pub fn encode_value(
    data_model: DataModel,
    columns_def: &[String],
    columns: &Fields,
) -> ShardKvResult<Vec<u8>> {
    match data_model {
        DataModel::Binary => encode_binary(columns),
        DataModel::Array => encode_array(columns_def, columns),
        DataModel::Hash => encode_hash(columns),
    }
}

/// Decodes a value previously produced by `encode_value` for the same
/// `data_model`/`columns_def`.
pub fn decode_value(
    data_model: DataModel,
    columns_def: &[String],
    bytes: &[u8],
) -> ShardKvResult<Fields> {
    match data_model {
        DataModel::Binary => decode_binary(bytes),
        DataModel::Array => decode_array(columns_def, bytes),
        DataModel::Hash => decode_binary(bytes),
    }
}

/// `binary`: the entire column association, serialized as an opaque
/// structured term (§4.5). A length-prefixed sequence of
/// `(name-component, value-component)` pairs is as opaque to the backend as
/// any other byte string, and round-trips losslessly.
fn encode_binary(columns: &Fields) -> ShardKvResult<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&(columns.len() as u32).to_be_bytes());
    for (name, value) in columns {
        encode_component(&FieldValue::Text(name.clone()), &mut out);
        encode_component(value, &mut out);
    }
    Ok(out)
}

fn decode_binary(bytes: &[u8]) -> ShardKvResult<Fields> {
    let count_bytes: [u8; 4] = bytes
        .get(0..4)
        .ok_or_else(|| ShardKvError::invalid_argument("column_mismatch", "value", "truncated"))?
        .try_into()
        .map_err(|_| ShardKvError::invalid_argument("column_mismatch", "value", "truncated"))?;
    let count = u32::from_be_bytes(count_bytes) as usize;
    let mut pos = 4;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let (name, next) = decode_component(bytes, pos).map_err(codec_err)?;
        let (value, next) = decode_component(bytes, next).map_err(codec_err)?;
        let name = match name {
            FieldValue::Text(s) => s,
            _ => return Err(ShardKvError::invalid_argument("column_mismatch", "value", "non_text_name")),
        };
        out.push((name, value));
        pos = next;
    }
    Ok(out)
}

/// `array`: requires `|columns| = |columns_def|`; stores values positionally
/// in `columns_def` order, no names on the wire (§4.5).
fn encode_array(columns_def: &[String], columns: &Fields) -> ShardKvResult<Vec<u8>> {
    if columns.len() != columns_def.len() {
        return Err(column_mismatch(columns_def, columns));
    }
    let mut out = Vec::new();
    for name in columns_def {
        let value = columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| column_mismatch(columns_def, columns))?;
        encode_component(value, &mut out);
    }
    Ok(out)
}

fn decode_array(columns_def: &[String], bytes: &[u8]) -> ShardKvResult<Fields> {
    let mut pos = 0;
    let mut out = Vec::with_capacity(columns_def.len());
    for name in columns_def {
        let (value, next) = decode_component(bytes, pos).map_err(codec_err)?;
        out.push((name.clone(), value));
        pos = next;
    }
    if pos != bytes.len() {
        return Err(ShardKvError::invalid_argument(
            "column_mismatch",
            "value",
            "trailing_bytes",
        ));
    }
    Ok(out)
}

/// `hash`: a map serialization of `columns`, decoded as the same association
/// list (§4.5). Uses the same opaque encoding as `binary`: a map and an
/// arbitrary-order association list carry the same information.
fn encode_hash(columns: &Fields) -> ShardKvResult<Vec<u8>> {
    encode_binary(columns)
}

fn column_mismatch(columns_def: &[String], columns: &Fields) -> ShardKvError {
    let got: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
    ShardKvError::invalid_argument(
        "column_mismatch",
        "columns",
        format!("{columns_def:?} vs {got:?}"),
    )
}

fn codec_err(reason: &'static str) -> ShardKvError {
    ShardKvError::invalid_argument("column_mismatch", "value", reason)
}

/// Index encoding is explicitly unimplemented: any non-empty index list
/// fails `not_supported_yet` (§4.5, §9 Open Question (c)); an empty list is
/// the only supported case and returns an empty result.
pub fn encode_indexes(indexes: &[String]) -> ShardKvResult<Vec<u8>> {
    if indexes.is_empty() {
        Ok(Vec::new())
    } else {
        Err(ShardKvError::unsupported(
            "not_supported_yet",
            "index_encoding",
        ))
    }
}
