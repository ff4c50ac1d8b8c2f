pub mod memory;
pub mod merge;

pub use memory::MemoryStore;
pub use merge::{apply_batch, LogEntry, LogOpKind};

use crate::errors::DeebeeResult;
use std::sync::Arc;

/// A single mutation inside a [WriteBatch].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Del { key: Vec<u8> },
}

/// An ordered group of mutations applied atomically by
/// [`KvStore::write`]. Later operations on the same key win.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch { ops: Vec::new() }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn del(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Del { key });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Bounds for an ordered range scan. Both bounds are exclusive, matching
/// the underlying log-structured stores this trait abstracts over.
#[derive(Debug, Default, Clone)]
pub struct RangeOptions {
    /// Exclusive lower bound; unbounded when `None`.
    pub gt: Option<Vec<u8>>,
    /// Exclusive upper bound; unbounded when `None`.
    pub lt: Option<Vec<u8>>,
    /// Yield entries in descending key order.
    pub reverse: bool,
}

/// A key-value entry yielded by a range scan.
pub type KvEntry = (Vec<u8>, Vec<u8>);

/// A pull-based stream of range entries. Abandoning the iterator early is
/// always safe; implementations hold no state that needs cleanup.
pub type KvRange = Box<dyn Iterator<Item = DeebeeResult<KvEntry>> + Send>;

/// Low-level contract for ordered key-value storage backends.
///
/// DeeBee treats the store as durable and internally consistent: point
/// reads and writes, atomic batches, and ordered range scans are all it
/// needs. Namespacing is layered on top with [Keyspace], and replicated
/// multi-writer stores reduce their logs through
/// [`merge::apply_batch`].
pub trait KvStore: Send + Sync {
    /// Retrieves the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> DeebeeResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any existing value.
    fn put(&self, key: &[u8], value: &[u8]) -> DeebeeResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn del(&self, key: &[u8]) -> DeebeeResult<()>;

    /// Applies a batch of mutations atomically, in order.
    fn write(&self, batch: WriteBatch) -> DeebeeResult<()>;

    /// Opens an ordered scan over the given bounds.
    fn range(&self, options: RangeOptions) -> DeebeeResult<KvRange>;
}

/// Computes the smallest key strictly greater than every key starting with
/// `prefix`. Returns `None` when no such bound exists (all-0xFF prefix).
pub(crate) fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.last() {
        if *last < 0xFF {
            *bound.last_mut().expect("non-empty") += 1;
            return Some(bound);
        }
        bound.pop();
    }
    None
}

/// A namespaced view over a [KvStore].
///
/// Every operation transparently prefixes keys with the keyspace prefix and
/// strips it from scan results, so callers work in namespace-relative
/// coordinates. Sub-namespaces nest: `db.sub("people").sub("doc")` isolates
/// the `people` collection's document keyspace.
///
/// Prefixes are built by appending the namespace name followed by a `0x00`
/// separator, which keeps sibling namespaces disjoint under lexicographic
/// ordering.
#[derive(Clone)]
pub struct Keyspace {
    store: Arc<dyn KvStore>,
    prefix: Vec<u8>,
}

impl Keyspace {
    /// Creates a root keyspace with an empty prefix.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Keyspace {
            store,
            prefix: Vec::new(),
        }
    }

    /// Returns a child keyspace named `name`.
    pub fn sub(&self, name: &str) -> Keyspace {
        let mut prefix = self.prefix.clone();
        prefix.extend_from_slice(name.as_bytes());
        prefix.push(0x00);
        Keyspace {
            store: Arc::clone(&self.store),
            prefix,
        }
    }

    /// The raw key prefix of this keyspace, as recorded in replicated log
    /// entries.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }

    pub fn get(&self, key: &[u8]) -> DeebeeResult<Option<Vec<u8>>> {
        self.store.get(&self.full_key(key))
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> DeebeeResult<()> {
        self.store.put(&self.full_key(key), value)
    }

    pub fn del(&self, key: &[u8]) -> DeebeeResult<()> {
        self.store.del(&self.full_key(key))
    }

    /// Applies a batch expressed in keyspace-relative keys.
    pub fn write(&self, batch: WriteBatch) -> DeebeeResult<()> {
        let mut full = WriteBatch::new();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => full.put(self.full_key(&key), value),
                BatchOp::Del { key } => full.del(self.full_key(&key)),
            }
        }
        self.store.write(full)
    }

    /// Opens an ordered scan over this keyspace. Bounds in `options` are
    /// keyspace-relative; yielded keys have the prefix stripped.
    pub fn range(&self, options: RangeOptions) -> DeebeeResult<KvRange> {
        let lower = match &options.gt {
            // a full key always extends the bare prefix, so the prefix
            // itself is a valid exclusive lower bound
            Some(gt) => self.full_key(gt),
            None => self.prefix.clone(),
        };
        let upper = match &options.lt {
            Some(lt) => Some(self.full_key(lt)),
            None => prefix_successor(&self.prefix),
        };

        let raw = self.store.range(RangeOptions {
            gt: Some(lower),
            lt: upper,
            reverse: options.reverse,
        })?;

        let prefix_len = self.prefix.len();
        Ok(Box::new(raw.map(move |entry| {
            entry.map(|(key, value)| (key[prefix_len..].to_vec(), value))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_successor_increments_last_byte() {
        assert_eq!(prefix_successor(b"abc\x00"), Some(b"abc\x01".to_vec()));
        assert_eq!(prefix_successor(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn keyspaces_are_disjoint() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let root = Keyspace::new(store);
        let a = root.sub("a");
        let b = root.sub("b");

        a.put(b"k", b"from-a").unwrap();
        b.put(b"k", b"from-b").unwrap();

        assert_eq!(a.get(b"k").unwrap(), Some(b"from-a".to_vec()));
        assert_eq!(b.get(b"k").unwrap(), Some(b"from-b".to_vec()));

        let entries: Vec<KvEntry> = a
            .range(RangeOptions::default())
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(entries, vec![(b"k".to_vec(), b"from-a".to_vec())]);
    }

    #[test]
    fn range_strips_prefix_and_honors_bounds() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let ks = Keyspace::new(store).sub("ns");
        for i in 0u8..5 {
            ks.put(&[i], &[i]).unwrap();
        }

        let keys: Vec<Vec<u8>> = ks
            .range(RangeOptions {
                gt: Some(vec![0]),
                lt: Some(vec![4]),
                reverse: false,
            })
            .unwrap()
            .map(|e| e.unwrap().0)
            .collect();
        assert_eq!(keys, vec![vec![1], vec![2], vec![3]]);

        let reversed: Vec<Vec<u8>> = ks
            .range(RangeOptions {
                gt: None,
                lt: None,
                reverse: true,
            })
            .unwrap()
            .map(|e| e.unwrap().0)
            .collect();
        assert_eq!(reversed.first(), Some(&vec![4]));
    }

    #[test]
    fn nested_subs_compose_prefixes() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let root = Keyspace::new(store);
        let nested = root.sub("people").sub("doc");
        assert_eq!(nested.prefix(), b"people\x00doc\x00");
    }
}
