use crate::common::{deserialize_meta, serialize_meta};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::store::{Keyspace, KvStore, WriteBatch};

/// The kind of mutation carried by a replicated [LogEntry].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum LogOpKind {
    Put,
    Del,
}

/// A single operation record on the replicated append-only log.
///
/// Writers append entries instead of mutating the shared view directly; the
/// log transport delivers them to every replica in a causally consistent
/// order and each replica reduces its pending batch with [apply_batch].
/// The `prefix` records which keyspace the writer was addressing, so the
/// reducer can reconstruct the full key without any collection-level
/// knowledge.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct LogEntry {
    pub kind: LogOpKind,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub prefix: Vec<u8>,
}

impl LogEntry {
    /// Records a put against the given keyspace.
    pub fn put(keyspace: &Keyspace, key: &[u8], value: &[u8]) -> Self {
        LogEntry {
            kind: LogOpKind::Put,
            key: key.to_vec(),
            value: Some(value.to_vec()),
            prefix: keyspace.prefix().to_vec(),
        }
    }

    /// Records a delete against the given keyspace.
    pub fn del(keyspace: &Keyspace, key: &[u8]) -> Self {
        LogEntry {
            kind: LogOpKind::Del,
            key: key.to_vec(),
            value: None,
            prefix: keyspace.prefix().to_vec(),
        }
    }

    /// Serializes this entry into its wire form for the log transport.
    pub fn encode(&self) -> DeebeeResult<Vec<u8>> {
        serialize_meta(self)
    }

    /// Restores an entry from its wire form.
    pub fn decode(bytes: &[u8]) -> DeebeeResult<LogEntry> {
        deserialize_meta(bytes)
    }

    fn full_key(&self) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + self.key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(&self.key);
        full
    }
}

/// Reduces a batch of pending log entries into the materialized view.
///
/// Entries are applied strictly in the order the transport presents them;
/// that order must already reflect the transport's causal resolution across
/// concurrent writers. The whole batch lands through one atomic
/// [WriteBatch].
///
/// This is a pure last-writer-wins merge at individual-key granularity:
/// when two writers race on the same key, whichever entry the transport
/// delivers later fully overwrites the other. There is no value-level
/// conflict detection or multi-value retention; that is the documented
/// contract, not an omission to repair here.
pub fn apply_batch(store: &dyn KvStore, entries: &[LogEntry]) -> DeebeeResult<()> {
    let mut batch = WriteBatch::new();
    for entry in entries {
        match entry.kind {
            LogOpKind::Put => {
                let value = entry.value.as_ref().ok_or_else(|| {
                    log::error!("Put log entry is missing a value");
                    DeebeeError::new(
                        "Put log entry is missing a value",
                        ErrorKind::InvalidArgument,
                    )
                })?;
                batch.put(entry.full_key(), value.clone());
            }
            LogOpKind::Del => batch.del(entry.full_key()),
        }
    }
    log::debug!("Applying {} replicated log entries", batch.len());
    store.write(batch)
}
