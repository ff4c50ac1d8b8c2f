use crate::collection::Collection;
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::store::{Keyspace, KvStore, MemoryStore};
use dashmap::DashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// An embedded document database over an ordered key-value store.
///
/// The database partitions the store into per-collection keyspaces and
/// hands out [Collection] handles on demand. Handles are cached, so
/// repeated lookups of the same name share state. Cloning a `Database` is
/// cheap; clones share the store and the handle cache.
///
/// # Examples
///
/// ```rust,ignore
/// use deebee::{doc, query, Database};
///
/// let db = Database::in_memory();
/// let recipes = db.collection("recipes")?;
/// recipes.insert(doc! { name: "pasta", ingredients: ["noodles", "sauce"] })?;
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    root: Keyspace,
    collections: DashMap<String, Collection>,
}

impl Database {
    /// Opens a database over the given store.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Database {
            inner: Arc::new(DatabaseInner {
                root: Keyspace::new(store),
                collections: DashMap::new(),
            }),
        }
    }

    /// Opens a database over a fresh [MemoryStore].
    pub fn in_memory() -> Self {
        Database::new(Arc::new(MemoryStore::new()))
    }

    /// Returns the named collection, creating its handle on first use.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::InvalidArgument`] for an empty name or one containing
    ///   a NUL byte (reserved as the keyspace separator)
    pub fn collection(&self, name: &str) -> DeebeeResult<Collection> {
        if name.is_empty() || name.contains('\0') {
            log::error!("Invalid collection name: {:?}", name);
            return Err(DeebeeError::new(
                &format!("Invalid collection name: {:?}", name),
                ErrorKind::InvalidArgument,
            ));
        }

        let collection = self
            .inner
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name, self.inner.root.sub(name)))
            .clone();
        Ok(collection)
    }

    /// Names of the collections opened through this handle.
    pub fn collection_names(&self) -> Vec<String> {
        self.inner
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("collections", &self.collection_names())
            .finish()
    }
}
