use crate::errors::DeebeeResult;
use crate::store::{BatchOp, KvRange, KvStore, RangeOptions, WriteBatch};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// An in-memory ordered key-value store.
///
/// The default backend for tests and for embedding without a persistent
/// store. Range scans snapshot the matching entries under the read lock, so
/// an open scan never observes writes made after it started.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of entries currently stored, across all keyspaces.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> DeebeeResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> DeebeeResult<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn del(&self, key: &[u8]) -> DeebeeResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> DeebeeResult<()> {
        let mut data = self.data.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Del { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn range(&self, options: RangeOptions) -> DeebeeResult<KvRange> {
        let lower = match options.gt {
            Some(gt) => Bound::Excluded(gt),
            None => Bound::Unbounded,
        };
        let upper = match options.lt {
            Some(lt) => Bound::Excluded(lt),
            None => Bound::Unbounded,
        };

        let data = self.data.read();
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = data
            .range::<Vec<u8>, _>((lower, upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if options.reverse {
            entries.reverse();
        }
        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}
