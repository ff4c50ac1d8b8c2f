use crate::collection::{Document, ObjectId, OBJECT_ID_LEN};
use crate::common::{
    deserialize_meta, serialize_meta, Value, CURRENT_INDEX_VERSION, DOC_ID, LEGACY_INDEX_VERSION,
};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use chrono::TimeZone;

//
// Compound index keys must sort consistently with the natural ordering of
// the indexed values and be invertible back into a partial document. Two
// encodings coexist:
//
// * Version 2 (current): order-preserving. Each value is a type-rank tag
//   byte followed by a payload that is monotonic within its type:
//   sign-flipped big-endian doubles for numbers, NUL-escaped bytes with a
//   NUL terminator for strings and binary, sign-flipped big-endian epoch
//   millis for dates, raw 12 bytes for object ids. Increasing a value
//   lexicographically increases the encoded bytes for fixed preceding
//   fields, and a key built from fewer values is byte-wise a prefix of
//   every full key sharing them, which is what makes range bounds work.
//
// * Version 1 (legacy): the original tag + little-endian u32 length + raw
//   payload layout, except object ids which are raw 12 bytes after their
//   tag. Variable-width fields are only approximately ordered; the codec
//   keeps decoding these keys so indexes built before the v2 migration
//   remain usable, but new indexes are written as v2.
//
// Numbers decode as F64 in both versions; integers beyond 2^53 lose
// precision inside keys. Cross-numeric equality on Value keeps partial-key
// matching consistent with full-document matching despite that.
//

// type-rank tags, shared by both versions
const TAG_NULL: u8 = 0x05;
const TAG_NUMBER: u8 = 0x10;
const TAG_STRING: u8 = 0x20;
const TAG_DOCUMENT: u8 = 0x30;
const TAG_ARRAY: u8 = 0x35;
const TAG_BYTES: u8 = 0x40;
const TAG_OBJECT_ID: u8 = 0x45;
const TAG_BOOL: u8 = 0x50;
const TAG_DATE: u8 = 0x55;

fn unsupported_version(version: u8) -> DeebeeError {
    DeebeeError::new(
        &format!("Unsupported index key version: {}", version),
        ErrorKind::EncodingError,
    )
}

fn truncated_key() -> DeebeeError {
    DeebeeError::new("Truncated index key", ErrorKind::EncodingError)
}

/// Maps an f64 to 8 bytes whose lexicographic order matches numeric order.
fn order_preserving_f64(v: f64) -> [u8; 8] {
    let bits = v.to_bits();
    let flipped = if bits & (1 << 63) != 0 {
        // negative: flip everything so larger magnitudes sort first
        !bits
    } else {
        // positive: set the sign bit so positives sort above negatives
        bits | (1 << 63)
    };
    flipped.to_be_bytes()
}

fn restore_f64(bytes: [u8; 8]) -> f64 {
    let flipped = u64::from_be_bytes(bytes);
    let bits = if flipped & (1 << 63) != 0 {
        flipped & !(1 << 63)
    } else {
        !flipped
    };
    f64::from_bits(bits)
}

/// Maps an i64 to 8 order-preserving big-endian bytes.
fn order_preserving_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1 << 63)).to_be_bytes()
}

fn restore_i64(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ (1 << 63)) as i64
}

/// Appends escaped bytes: embedded NULs become `00 FF`, and a single `00`
/// terminates the run. Preserves lexicographic order across the escape.
fn push_escaped(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        out.push(b);
        if b == 0x00 {
            out.push(0xFF);
        }
    }
    out.push(0x00);
}

/// Reads an escaped run starting at `pos`; returns the bytes and the
/// position just past the terminator.
fn read_escaped(key: &[u8], mut pos: usize) -> DeebeeResult<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    loop {
        let b = *key.get(pos).ok_or_else(truncated_key)?;
        pos += 1;
        if b != 0x00 {
            out.push(b);
            continue;
        }
        match key.get(pos) {
            Some(0xFF) => {
                out.push(0x00);
                pos += 1;
            }
            _ => return Ok((out, pos)),
        }
    }
}

fn encode_value_v2(value: &Value, out: &mut Vec<u8>) -> DeebeeResult<()> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::I32(_) | Value::I64(_) | Value::F64(_) => {
            out.push(TAG_NUMBER);
            let v = value.as_f64().unwrap_or_default();
            out.extend_from_slice(&order_preserving_f64(v));
        }
        Value::String(v) => {
            out.push(TAG_STRING);
            push_escaped(out, v.as_bytes());
        }
        Value::DateTime(v) => {
            out.push(TAG_DATE);
            out.extend_from_slice(&order_preserving_i64(v.timestamp_millis()));
        }
        Value::ObjectId(v) => {
            out.push(TAG_OBJECT_ID);
            out.extend_from_slice(v.as_bytes());
        }
        Value::Bytes(v) => {
            out.push(TAG_BYTES);
            push_escaped(out, v);
        }
        // composite values are rare in index positions (arrays are
        // flattened away first); their relative order within the type is
        // not meaningful, only equality
        Value::Array(_) => {
            out.push(TAG_ARRAY);
            push_escaped(out, &serialize_meta(value)?);
        }
        Value::Document(_) => {
            out.push(TAG_DOCUMENT);
            push_escaped(out, &serialize_meta(value)?);
        }
    }
    Ok(())
}

fn decode_value_v2(key: &[u8], pos: usize) -> DeebeeResult<(Value, usize)> {
    let tag = *key.get(pos).ok_or_else(truncated_key)?;
    let pos = pos + 1;
    match tag {
        TAG_NULL => Ok((Value::Null, pos)),
        TAG_BOOL => {
            let b = *key.get(pos).ok_or_else(truncated_key)?;
            Ok((Value::Bool(b != 0), pos + 1))
        }
        TAG_NUMBER => {
            let bytes: [u8; 8] = key
                .get(pos..pos + 8)
                .ok_or_else(truncated_key)?
                .try_into()
                .map_err(|_| truncated_key())?;
            Ok((Value::F64(restore_f64(bytes)), pos + 8))
        }
        TAG_STRING => {
            let (bytes, next) = read_escaped(key, pos)?;
            Ok((Value::String(String::from_utf8(bytes)?), next))
        }
        TAG_DATE => {
            let bytes: [u8; 8] = key
                .get(pos..pos + 8)
                .ok_or_else(truncated_key)?
                .try_into()
                .map_err(|_| truncated_key())?;
            let millis = restore_i64(bytes);
            let dt = chrono::Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| {
                    DeebeeError::new(
                        &format!("Invalid date in index key: {}", millis),
                        ErrorKind::EncodingError,
                    )
                })?;
            Ok((Value::DateTime(dt), pos + 8))
        }
        TAG_OBJECT_ID => {
            let bytes = key
                .get(pos..pos + OBJECT_ID_LEN)
                .ok_or_else(truncated_key)?;
            Ok((Value::ObjectId(ObjectId::from_slice(bytes)?), pos + OBJECT_ID_LEN))
        }
        TAG_BYTES => {
            let (bytes, next) = read_escaped(key, pos)?;
            Ok((Value::Bytes(bytes), next))
        }
        TAG_ARRAY | TAG_DOCUMENT => {
            let (bytes, next) = read_escaped(key, pos)?;
            Ok((deserialize_meta(&bytes)?, next))
        }
        other => Err(DeebeeError::new(
            &format!("Unknown index key tag: {:#04x}", other),
            ErrorKind::EncodingError,
        )),
    }
}

fn encode_value_v1(value: &Value, out: &mut Vec<u8>) -> DeebeeResult<()> {
    fn push_sized(out: &mut Vec<u8>, tag: u8, payload: &[u8]) {
        out.push(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }

    match value {
        Value::Null => push_sized(out, TAG_NULL, &[]),
        Value::Bool(v) => push_sized(out, TAG_BOOL, &[u8::from(*v)]),
        Value::I32(_) | Value::I64(_) | Value::F64(_) => {
            let v = value.as_f64().unwrap_or_default();
            push_sized(out, TAG_NUMBER, &v.to_le_bytes());
        }
        Value::String(v) => push_sized(out, TAG_STRING, v.as_bytes()),
        Value::DateTime(v) => {
            push_sized(out, TAG_DATE, &v.timestamp_millis().to_le_bytes())
        }
        Value::ObjectId(v) => {
            out.push(TAG_OBJECT_ID);
            out.extend_from_slice(v.as_bytes());
        }
        Value::Bytes(v) => push_sized(out, TAG_BYTES, v),
        Value::Array(_) => push_sized(out, TAG_ARRAY, &serialize_meta(value)?),
        Value::Document(_) => push_sized(out, TAG_DOCUMENT, &serialize_meta(value)?),
    }
    Ok(())
}

fn decode_value_v1(key: &[u8], pos: usize) -> DeebeeResult<(Value, usize)> {
    let tag = *key.get(pos).ok_or_else(truncated_key)?;
    let pos = pos + 1;

    if tag == TAG_OBJECT_ID {
        let bytes = key
            .get(pos..pos + OBJECT_ID_LEN)
            .ok_or_else(truncated_key)?;
        return Ok((
            Value::ObjectId(ObjectId::from_slice(bytes)?),
            pos + OBJECT_ID_LEN,
        ));
    }

    let len_bytes: [u8; 4] = key
        .get(pos..pos + 4)
        .ok_or_else(truncated_key)?
        .try_into()
        .map_err(|_| truncated_key())?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let pos = pos + 4;
    let payload = key.get(pos..pos + len).ok_or_else(truncated_key)?;
    let next = pos + len;

    let value = match tag {
        TAG_NULL => Value::Null,
        TAG_BOOL => Value::Bool(payload.first().copied().unwrap_or(0) != 0),
        TAG_NUMBER => {
            let bytes: [u8; 8] = payload.try_into().map_err(|_| truncated_key())?;
            Value::F64(f64::from_le_bytes(bytes))
        }
        TAG_STRING => Value::String(String::from_utf8(payload.to_vec())?),
        TAG_DATE => {
            let bytes: [u8; 8] = payload.try_into().map_err(|_| truncated_key())?;
            let millis = i64::from_le_bytes(bytes);
            chrono::Utc
                .timestamp_millis_opt(millis)
                .single()
                .map(Value::DateTime)
                .ok_or_else(|| {
                    DeebeeError::new(
                        &format!("Invalid date in index key: {}", millis),
                        ErrorKind::EncodingError,
                    )
                })?
        }
        TAG_BYTES => Value::Bytes(payload.to_vec()),
        TAG_ARRAY | TAG_DOCUMENT => deserialize_meta(payload)?,
        other => {
            return Err(DeebeeError::new(
                &format!("Unknown index key tag: {:#04x}", other),
                ErrorKind::EncodingError,
            ))
        }
    };
    Ok((value, next))
}

fn encode_value(value: &Value, version: u8, out: &mut Vec<u8>) -> DeebeeResult<()> {
    match version {
        CURRENT_INDEX_VERSION => encode_value_v2(value, out),
        LEGACY_INDEX_VERSION => encode_value_v1(value, out),
        other => Err(unsupported_version(other)),
    }
}

fn decode_value(key: &[u8], pos: usize, version: u8) -> DeebeeResult<(Value, usize)> {
    match version {
        CURRENT_INDEX_VERSION => decode_value_v2(key, pos),
        LEGACY_INDEX_VERSION => decode_value_v1(key, pos),
        other => Err(unsupported_version(other)),
    }
}

/// Encodes a full index entry key for a flattened document: each indexed
/// field's value in order, then the trailing document id.
///
/// The document must contain every indexed field (callers gate on
/// [`Document::has_fields`]) and an `_id`.
pub fn encode_key(doc: &Document, fields: &[String], version: u8) -> DeebeeResult<Vec<u8>> {
    let mut out = Vec::new();
    for field in fields {
        let value = doc.get(field).ok_or_else(|| {
            DeebeeError::new(
                &format!("Cannot index document missing field: {}", field),
                ErrorKind::InternalError,
            )
        })?;
        encode_value(value, version, &mut out)?;
    }

    let id = doc.id().ok_or_else(|| {
        DeebeeError::new(
            "Cannot index document without an _id",
            ErrorKind::InternalError,
        )
    })?;
    encode_value(&Value::ObjectId(id), version, &mut out)?;
    Ok(out)
}

/// Encodes a partial key from leading field values only, for use as a
/// range-scan bound. The result is byte-wise a prefix of every full key
/// sharing those leading values.
pub fn encode_prefix(values: &[Value], version: u8) -> DeebeeResult<Vec<u8>> {
    let mut out = Vec::new();
    for value in values {
        encode_value(value, version, &mut out)?;
    }
    Ok(out)
}

/// Decodes an index entry key back into a partial document holding the
/// indexed fields (and `_id` for the trailing component).
///
/// Tolerates keys that are prefixes of a full entry: decoding simply stops
/// when the bytes run out, yielding only the fields present.
pub fn decode_key(key: &[u8], fields: &[String], version: u8) -> DeebeeResult<Document> {
    let mut doc = Document::new();
    let mut pos = 0;
    let mut index = 0;
    while pos < key.len() {
        let (value, next) = decode_value(key, pos, version)?;
        let field = fields.get(index).map(String::as_str).unwrap_or(DOC_ID);
        doc.put(field, value)?;
        pos = next;
        index += 1;
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SUPPORTED_INDEX_VERSIONS;
    use crate::doc;
    use chrono::Utc;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn with_id(mut doc: Document) -> Document {
        doc.put(DOC_ID, ObjectId::new()).unwrap();
        doc
    }

    #[test]
    fn round_trip_both_versions() {
        let doc = with_id(doc! {
            name: "sauce",
            count: 42,
            when: (Value::DateTime(Utc::now())),
            flag: true,
        });
        let fields = fields(&["name", "count", "when", "flag"]);

        for version in SUPPORTED_INDEX_VERSIONS {
            let key = encode_key(&doc, &fields, version).unwrap();
            let decoded = decode_key(&key, &fields, version).unwrap();

            assert_eq!(decoded.get("name"), Some(&Value::from("sauce")));
            // numbers come back as doubles; cross-numeric equality holds
            assert_eq!(decoded.get("count"), Some(&Value::from(42)));
            assert_eq!(decoded.get("flag"), Some(&Value::from(true)));
            assert_eq!(decoded.id(), doc.id());
        }
    }

    #[test]
    fn v2_numbers_sort_by_value() {
        let cases = [-9001.5, -1.0, -0.5, 0.0, 0.5, 1.0, 4.0, 20.0, 666.0, 9001.0];
        let mut encoded: Vec<Vec<u8>> = cases
            .iter()
            .map(|v| order_preserving_f64(*v).to_vec())
            .collect();
        let sorted = encoded.clone();
        encoded.sort();
        assert_eq!(encoded, sorted);
    }

    #[test]
    fn v2_strings_sort_lexicographically_with_embedded_nul() {
        let cases = ["", "a", "a\0", "a\0b", "ab", "b"];
        let mut out: Vec<Vec<u8>> = cases
            .iter()
            .map(|s| {
                let mut buf = Vec::new();
                push_escaped(&mut buf, s.as_bytes());
                buf
            })
            .collect();
        let sorted = out.clone();
        out.sort();
        assert_eq!(out, sorted);

        for s in cases {
            let mut buf = Vec::new();
            push_escaped(&mut buf, s.as_bytes());
            let (bytes, next) = read_escaped(&buf, 0).unwrap();
            assert_eq!(bytes, s.as_bytes());
            assert_eq!(next, buf.len());
        }
    }

    #[test]
    fn v2_keys_order_consistently_across_fields() {
        let fields = fields(&["a", "b"]);
        let key = |a: i64, b: &str| {
            encode_key(
                &with_id(doc! { a: (a), b: (b) }),
                &fields,
                CURRENT_INDEX_VERSION,
            )
            .unwrap()
        };

        assert!(key(1, "x") < key(2, "a"));
        assert!(key(1, "a") < key(1, "b"));
        assert!(key(-5, "z") < key(0, "a"));
    }

    #[test]
    fn prefix_is_byte_prefix_of_full_key() {
        let fields = fields(&["a", "b"]);
        let doc = with_id(doc! { a: 7, b: "x" });

        for version in SUPPORTED_INDEX_VERSIONS {
            let full = encode_key(&doc, &fields, version).unwrap();
            let prefix = encode_prefix(&[Value::from(7)], version).unwrap();
            assert!(full.starts_with(&prefix));

            // decoding the prefix yields just the leading field
            let partial = decode_key(&prefix, &fields, version).unwrap();
            assert_eq!(partial.get("a"), Some(&Value::from(7.0)));
            assert!(partial.get("b").is_none());
        }
    }

    #[test]
    fn dates_round_trip_at_millisecond_precision() {
        let dt = Utc::now();
        let doc = with_id(doc! { when: (Value::DateTime(dt)) });
        let fields = fields(&["when"]);

        for version in SUPPORTED_INDEX_VERSIONS {
            let key = encode_key(&doc, &fields, version).unwrap();
            let decoded = decode_key(&key, &fields, version).unwrap();
            match decoded.get("when") {
                Some(Value::DateTime(restored)) => {
                    assert_eq!(restored.timestamp_millis(), dt.timestamp_millis())
                }
                other => panic!("expected date, got {:?}", other),
            }
        }
    }

    #[test]
    fn object_ids_are_raw_twelve_bytes() {
        let id = ObjectId::new();
        let doc = with_id(doc! { ref_id: (Value::ObjectId(id)) });
        let fields = fields(&["ref_id"]);

        for version in SUPPORTED_INDEX_VERSIONS {
            let key = encode_key(&doc, &fields, version).unwrap();
            // tag + 12 raw bytes, no length prefix
            assert_eq!(key[0], TAG_OBJECT_ID);
            assert_eq!(&key[1..1 + OBJECT_ID_LEN], id.as_bytes());
        }
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let doc = with_id(doc! { a: 1 });
        let err = encode_key(&doc, &fields(&["a"]), 9).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }

    #[test]
    fn truncated_key_is_an_error() {
        let doc = with_id(doc! { a: 1 });
        let fields = fields(&["a"]);
        let key = encode_key(&doc, &fields, CURRENT_INDEX_VERSION).unwrap();
        let err = decode_key(&key[..key.len() - 4], &fields, CURRENT_INDEX_VERSION).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }
}
