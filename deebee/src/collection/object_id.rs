use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::RngCore;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of bytes in an [ObjectId].
pub const OBJECT_ID_LEN: usize = 12;

static PROCESS_ENTROPY: Lazy<[u8; 5]> = Lazy::new(|| {
    let mut bytes = [0u8; 5];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
});

static COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(rand::thread_rng().next_u32()));

/// A unique identifier for documents.
///
/// Every document in a collection is identified by a 12-byte `ObjectId`
/// stored in its `_id` field, assigned at insert time when absent. The id
/// never changes after creation.
///
/// # Layout
///
/// * 4 bytes - big-endian unix timestamp in seconds
/// * 5 bytes - per-process random entropy
/// * 3 bytes - big-endian incrementing counter, randomly seeded
///
/// The timestamp prefix gives ids a coarse insertion ordering; the entropy
/// and counter keep them unique across concurrent writers without
/// coordination.
///
/// # Examples
///
/// ```rust,ignore
/// use deebee::collection::ObjectId;
///
/// let id = ObjectId::new();
/// assert_eq!(id.as_bytes().len(), 12);
///
/// // round-trip through the hex form
/// let parsed = ObjectId::parse_hex(&id.to_hex())?;
/// assert_eq!(id, parsed);
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy, serde::Deserialize, serde::Serialize)]
pub struct ObjectId {
    bytes: [u8; OBJECT_ID_LEN],
}

impl ObjectId {
    /// Generates a new unique `ObjectId`.
    pub fn new() -> Self {
        let timestamp = Utc::now().timestamp() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; OBJECT_ID_LEN];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_ENTROPY);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        ObjectId { bytes }
    }

    /// Creates an `ObjectId` from exactly 12 raw bytes.
    pub fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        ObjectId { bytes }
    }

    /// Creates an `ObjectId` from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidId`] if the slice is not exactly 12 bytes.
    pub fn from_slice(bytes: &[u8]) -> DeebeeResult<Self> {
        if bytes.len() != OBJECT_ID_LEN {
            log::error!("Invalid object id length: {}", bytes.len());
            return Err(DeebeeError::new(
                &format!(
                    "Object id must be {} bytes, got {}",
                    OBJECT_ID_LEN,
                    bytes.len()
                ),
                ErrorKind::InvalidId,
            ));
        }
        let mut fixed = [0u8; OBJECT_ID_LEN];
        fixed.copy_from_slice(bytes);
        Ok(ObjectId { bytes: fixed })
    }

    /// Parses an `ObjectId` from its 24-character hex form.
    pub fn parse_hex(hex: &str) -> DeebeeResult<Self> {
        if hex.len() != OBJECT_ID_LEN * 2 || !hex.is_ascii() {
            return Err(DeebeeError::new(
                &format!("Invalid object id hex string: {}", hex),
                ErrorKind::InvalidId,
            ));
        }
        let mut bytes = [0u8; OBJECT_ID_LEN];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| {
                DeebeeError::new(
                    &format!("Invalid object id hex string: {}", hex),
                    ErrorKind::InvalidId,
                )
            })?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| {
                DeebeeError::new(
                    &format!("Invalid object id hex string: {}", hex),
                    ErrorKind::InvalidId,
                )
            })?;
        }
        Ok(ObjectId { bytes })
    }

    /// Gets the raw 12 bytes of this id.
    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.bytes
    }

    /// Gets the unix timestamp (seconds) embedded in this id.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// Formats this id as 24 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(OBJECT_ID_LEN * 2);
        for byte in &self.bytes {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_ids_are_unique() {
        let ids: HashSet<ObjectId> = (0..1000).map(|_| ObjectId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn hex_round_trip() {
        let id = ObjectId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(ObjectId::parse_hex(&hex).unwrap(), id);
    }

    #[test]
    fn from_slice_validates_length() {
        let err = ObjectId::from_slice(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidId);

        let bytes = [7u8; OBJECT_ID_LEN];
        let id = ObjectId::from_slice(&bytes).unwrap();
        assert_eq!(id.as_bytes(), &bytes);
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert!(ObjectId::parse_hex("abc").is_err());
        assert!(ObjectId::parse_hex("zz".repeat(12).as_str()).is_err());
    }

    #[test]
    fn timestamp_prefix_is_recent() {
        let before = Utc::now().timestamp() as u32;
        let id = ObjectId::new();
        let after = Utc::now().timestamp() as u32;
        assert!(id.timestamp() >= before && id.timestamp() <= after);
    }
}
