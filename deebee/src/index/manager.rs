use crate::collection::Document;
use crate::common::{deserialize_meta, serialize_meta, CURRENT_INDEX_VERSION};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::index::definition::{index_name, IndexDefinition};
use crate::index::{flatten, key_codec};
use crate::store::{Keyspace, RangeOptions, WriteBatch};

/// Options accepted by index creation.
#[derive(Debug, Clone)]
pub struct CreateIndexOptions {
    /// Force a rebuild even when a matching definition already exists.
    pub rebuild: bool,
    /// Key-encoding version to build with.
    pub version: u8,
}

impl Default for CreateIndexOptions {
    fn default() -> Self {
        CreateIndexOptions {
            rebuild: false,
            version: CURRENT_INDEX_VERSION,
        }
    }
}

/// Owns a collection's index catalog and entry keyspaces.
///
/// The catalog keyspace maps index name to serialized [IndexDefinition];
/// each index's entries live in a child of the data keyspace named after
/// the index. Entry maintenance here is per-document; the surrounding
/// collection decides when to call it and pairs it with document writes.
#[derive(Clone)]
pub struct IndexManager {
    catalog: Keyspace,
    data_root: Keyspace,
}

impl IndexManager {
    pub fn new(catalog: Keyspace, data_root: Keyspace) -> Self {
        IndexManager { catalog, data_root }
    }

    /// Registers an index over `fields`, returning the definition and
    /// whether its entries must be (re)built.
    ///
    /// Creating an index that already exists at the same or a newer version
    /// is a no-op unless `rebuild` is set. Requesting a newer version than
    /// the stored definition upgrades it and forces a rebuild.
    pub fn create_index(
        &self,
        fields: Vec<String>,
        options: &CreateIndexOptions,
    ) -> DeebeeResult<(IndexDefinition, bool)> {
        if fields.is_empty() {
            log::error!("Cannot create an index over no fields");
            return Err(DeebeeError::new(
                "Cannot create an index over no fields",
                ErrorKind::InvalidArgument,
            ));
        }

        let name = index_name(&fields);
        if let Some(existing) = self.get_index(&name)? {
            if existing.version() >= options.version && !options.rebuild {
                log::debug!("Index {} already exists, skipping creation", name);
                return Ok((existing, false));
            }
        }

        let definition = IndexDefinition::new(fields, options.version);
        self.catalog
            .put(name.as_bytes(), &serialize_meta(&definition)?)?;
        log::debug!("Registered index {}", definition);
        Ok((definition, true))
    }

    /// Looks up a definition by name.
    pub fn get_index(&self, name: &str) -> DeebeeResult<Option<IndexDefinition>> {
        match self.catalog.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(deserialize_meta(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Looks up a definition by name, failing when it does not exist.
    pub fn require_index(&self, name: &str) -> DeebeeResult<IndexDefinition> {
        self.get_index(name)?.ok_or_else(|| {
            log::error!("Invalid index: {}", name);
            DeebeeError::new(&format!("Invalid index: {}", name), ErrorKind::InvalidIndex)
        })
    }

    /// Lists every registered definition, including ones whose version this
    /// build cannot use. Callers filter on
    /// [`IndexDefinition::is_supported`] where it matters.
    pub fn list_indexes(&self) -> DeebeeResult<Vec<IndexDefinition>> {
        let mut definitions = Vec::new();
        for entry in self.catalog.range(RangeOptions::default())? {
            let (_, bytes) = entry?;
            definitions.push(deserialize_meta(&bytes)?);
        }
        Ok(definitions)
    }

    /// The keyspace holding this index's entries.
    pub fn entries(&self, definition: &IndexDefinition) -> Keyspace {
        self.data_root.sub(definition.name())
    }

    fn entry_keys(
        &self,
        definition: &IndexDefinition,
        doc: &Document,
    ) -> DeebeeResult<Vec<Vec<u8>>> {
        if !doc.has_fields(definition.fields()) {
            return Ok(Vec::new());
        }
        flatten(doc, definition.fields())?
            .iter()
            .map(|flat| key_codec::encode_key(flat, definition.fields(), definition.version()))
            .collect()
    }

    /// Writes this document's entries into the index. Documents missing any
    /// indexed field get no entries.
    pub fn index_document(
        &self,
        definition: &IndexDefinition,
        doc: &Document,
    ) -> DeebeeResult<()> {
        let keys = self.entry_keys(definition, doc)?;
        if keys.is_empty() {
            return Ok(());
        }
        let id = doc.id().ok_or_else(|| {
            DeebeeError::new(
                "Cannot index document without an _id",
                ErrorKind::InternalError,
            )
        })?;

        let mut batch = WriteBatch::new();
        for key in keys {
            batch.put(key, id.as_bytes().to_vec());
        }
        self.entries(definition).write(batch)
    }

    /// Removes this document's entries from the index.
    pub fn deindex_document(
        &self,
        definition: &IndexDefinition,
        doc: &Document,
    ) -> DeebeeResult<()> {
        let keys = self.entry_keys(definition, doc)?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for key in keys {
            batch.del(key);
        }
        self.entries(definition).write(batch)
    }

    /// Drops every entry of the index, leaving the definition in place.
    /// Used as the first phase of a rebuild.
    pub fn clear_entries(&self, definition: &IndexDefinition) -> DeebeeResult<()> {
        let entries = self.entries(definition);
        let mut batch = WriteBatch::new();
        for entry in entries.range(RangeOptions::default())? {
            let (key, _) = entry?;
            batch.del(key);
        }
        if !batch.is_empty() {
            entries.write(batch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ObjectId;
    use crate::common::{Value, DOC_ID, LEGACY_INDEX_VERSION};
    use crate::doc;
    use crate::store::{KvStore, MemoryStore};
    use std::sync::Arc;

    fn manager() -> IndexManager {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let root = Keyspace::new(store);
        IndexManager::new(root.sub("idxs"), root.sub("idx"))
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn with_id(mut doc: Document) -> Document {
        doc.put(DOC_ID, ObjectId::new()).unwrap();
        doc
    }

    fn entry_count(manager: &IndexManager, definition: &IndexDefinition) -> usize {
        manager
            .entries(definition)
            .range(RangeOptions::default())
            .unwrap()
            .count()
    }

    #[test]
    fn create_is_idempotent() {
        let manager = manager();
        let (def, build) = manager
            .create_index(fields(&["a", "b"]), &CreateIndexOptions::default())
            .unwrap();
        assert_eq!(def.name(), "a,b");
        assert!(build);

        let (again, build) = manager
            .create_index(fields(&["a", "b"]), &CreateIndexOptions::default())
            .unwrap();
        assert_eq!(again, def);
        assert!(!build);
    }

    #[test]
    fn version_upgrade_forces_rebuild() {
        let manager = manager();
        let legacy_opts = CreateIndexOptions {
            version: LEGACY_INDEX_VERSION,
            ..CreateIndexOptions::default()
        };
        let (legacy, _) = manager.create_index(fields(&["a"]), &legacy_opts).unwrap();
        assert_eq!(legacy.version(), LEGACY_INDEX_VERSION);

        let (upgraded, build) = manager
            .create_index(fields(&["a"]), &CreateIndexOptions::default())
            .unwrap();
        assert!(build);
        assert_eq!(upgraded.version(), CURRENT_INDEX_VERSION);
        assert_eq!(
            manager.require_index("a").unwrap().version(),
            CURRENT_INDEX_VERSION
        );
    }

    #[test]
    fn require_index_fails_for_unknown_name() {
        let manager = manager();
        let err = manager.require_index("missing").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIndex);
    }

    #[test]
    fn index_and_deindex_round_trip() {
        let manager = manager();
        let (def, _) = manager
            .create_index(fields(&["tags"]), &CreateIndexOptions::default())
            .unwrap();

        let doc = with_id(doc! { tags: ["a", "b", "c"] });
        manager.index_document(&def, &doc).unwrap();
        assert_eq!(entry_count(&manager, &def), 3);

        // entries point back at the document id
        for entry in manager.entries(&def).range(RangeOptions::default()).unwrap() {
            let (_, value) = entry.unwrap();
            assert_eq!(value, doc.id().unwrap().as_bytes().to_vec());
        }

        manager.deindex_document(&def, &doc).unwrap();
        assert_eq!(entry_count(&manager, &def), 0);
    }

    #[test]
    fn documents_missing_a_field_are_not_indexed() {
        let manager = manager();
        let (def, _) = manager
            .create_index(fields(&["a", "b"]), &CreateIndexOptions::default())
            .unwrap();

        manager
            .index_document(&def, &with_id(doc! { a: 1 }))
            .unwrap();
        assert_eq!(entry_count(&manager, &def), 0);

        // a null value is present, so the document still gets an entry
        let mut null_b = with_id(doc! { a: 1 });
        null_b.put("b", Value::Null).unwrap();
        manager.index_document(&def, &null_b).unwrap();
        assert_eq!(entry_count(&manager, &def), 1);
    }

    #[test]
    fn clear_entries_empties_the_index() {
        let manager = manager();
        let (def, _) = manager
            .create_index(fields(&["a"]), &CreateIndexOptions::default())
            .unwrap();
        for i in 0..5 {
            manager
                .index_document(&def, &with_id(doc! { a: (i) }))
                .unwrap();
        }
        assert_eq!(entry_count(&manager, &def), 5);

        manager.clear_entries(&def).unwrap();
        assert_eq!(entry_count(&manager, &def), 0);
        assert!(manager.get_index("a").unwrap().is_some());
    }
}
