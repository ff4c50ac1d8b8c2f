use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::collection::Document;
use crate::errors::DeebeeResult;

/// Serializes a document into its opaque binary form (MessagePack).
///
/// The codec is an invertible contract: [`deserialize_document`] restores
/// scalars, arrays, nested documents, dates, and object ids exactly. The
/// byte layout itself carries no ordering guarantees; ordered index keys use
/// [`crate::index::key_codec`] instead.
pub fn serialize_document(document: &Document) -> DeebeeResult<Vec<u8>> {
    let bytes = rmp_serde::to_vec(document)?;
    Ok(bytes)
}

/// Restores a document from its binary form.
pub fn deserialize_document(bytes: &[u8]) -> DeebeeResult<Document> {
    let document = rmp_serde::from_slice(bytes)?;
    Ok(document)
}

/// Serializes any persisted metadata value (index definitions, log entries).
pub fn serialize_meta<T: Serialize>(value: &T) -> DeebeeResult<Vec<u8>> {
    let bytes = rmp_serde::to_vec(value)?;
    Ok(bytes)
}

/// Restores a persisted metadata value.
pub fn deserialize_meta<T: DeserializeOwned>(bytes: &[u8]) -> DeebeeResult<T> {
    let value = rmp_serde::from_slice(bytes)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ObjectId;
    use crate::common::Value;
    use crate::doc;
    use chrono::{TimeZone, Utc};

    #[test]
    fn document_round_trip_preserves_types() {
        let id = ObjectId::new();
        let dt = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut doc = doc! {
            name: "sauce",
            count: 42,
            ratio: 0.5,
            active: true,
            tags: ["red", "green"],
            nested: { inner: 1 },
        };
        doc.put("_id", id).unwrap();
        doc.put("created_at", dt).unwrap();
        doc.put("blob", Value::Bytes(vec![0, 1, 2, 255])).unwrap();

        let bytes = serialize_document(&doc).unwrap();
        let restored = deserialize_document(&bytes).unwrap();
        assert_eq!(doc, restored);
        assert_eq!(restored.id().unwrap(), id);
    }

    #[test]
    fn empty_document_round_trips() {
        let doc = doc! {};
        let restored = deserialize_document(&serialize_document(&doc).unwrap()).unwrap();
        assert!(restored.is_empty());
    }
}
