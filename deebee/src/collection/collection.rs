use crate::collection::update::{self, UpdateOptions, UpdateSpec};
use crate::collection::{Cursor, DeleteResult, Document, ObjectId, UpdateResult};
use crate::common::{
    serialize_document, DOC_KEYSPACE, INDEX_CATALOG_KEYSPACE, INDEX_DATA_KEYSPACE,
};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::index::{CreateIndexOptions, IndexDefinition, IndexManager};
use crate::query::Query;
use crate::store::{Keyspace, RangeOptions};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A named collection of documents.
///
/// Each collection owns three sub-keyspaces of its scope: documents by id,
/// the index catalog, and one entry keyspace per index. Handles are cheap
/// clones sharing the same state, so a collection can be passed around
/// freely.
///
/// # Examples
///
/// ```rust,ignore
/// use deebee::{doc, query, Database};
///
/// let db = Database::in_memory();
/// let people = db.collection("people")?;
/// people.insert(doc! { name: "Ada", age: 36 })?;
/// let found = people.find_one(&query! { name: "Ada" })?;
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

struct CollectionInner {
    name: String,
    docs: Keyspace,
    indexes: IndexManager,
}

impl Collection {
    pub(crate) fn new(name: &str, scope: Keyspace) -> Self {
        Collection {
            inner: Arc::new(CollectionInner {
                name: name.to_string(),
                docs: scope.sub(DOC_KEYSPACE),
                indexes: IndexManager::new(
                    scope.sub(INDEX_CATALOG_KEYSPACE),
                    scope.sub(INDEX_DATA_KEYSPACE),
                ),
            }),
        }
    }

    /// The collection's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Inserts a document, assigning a fresh `_id` when absent, and returns
    /// the stored form.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::InvalidArgument`] for an empty document
    /// * [`ErrorKind::DuplicateKey`] when the `_id` already exists
    pub fn insert(&self, mut doc: Document) -> DeebeeResult<Document> {
        if doc.is_empty() {
            log::error!("No document supplied to insert");
            return Err(DeebeeError::new(
                "No document supplied to insert",
                ErrorKind::InvalidArgument,
            ));
        }

        let id = match doc.id() {
            Some(id) => id,
            None => {
                let id = ObjectId::new();
                doc.put(crate::common::DOC_ID, id)?;
                id
            }
        };

        if self.inner.docs.get(id.as_bytes())?.is_some() {
            log::error!("Document with _id {} already exists", id);
            return Err(DeebeeError::new(
                &format!("Document with _id {} already exists", id),
                ErrorKind::DuplicateKey,
            ));
        }

        self.inner
            .docs
            .put(id.as_bytes(), &serialize_document(&doc)?)?;
        for definition in self.maintained_indexes()? {
            self.inner.indexes.index_document(&definition, &doc)?;
        }

        log::debug!("Inserted document {} into {}", id, self.inner.name);
        Ok(doc)
    }

    /// Opens a cursor over the documents matching `query`.
    pub fn find(&self, query: Query) -> Cursor {
        Cursor::new(
            self.inner.docs.clone(),
            self.inner.indexes.clone(),
            query,
        )
    }

    /// Returns the first document matching `query`.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::NotFound`] when nothing matches
    pub fn find_one(&self, query: &Query) -> DeebeeResult<Document> {
        self.find(query.clone()).first()?.ok_or_else(|| {
            DeebeeError::new(
                &format!("No document found in {}", self.inner.name),
                ErrorKind::NotFound,
            )
        })
    }

    /// Creates (or upgrades) a compound index over `fields` and builds its
    /// entries from the existing documents. Returns the definition; its
    /// [`name`](IndexDefinition::name) is the handle used by hints and
    /// [`Collection::re_index`].
    pub fn create_index(
        &self,
        fields: &[&str],
        options: &CreateIndexOptions,
    ) -> DeebeeResult<IndexDefinition> {
        let fields = fields.iter().map(|s| s.to_string()).collect();
        let (definition, build) = self.inner.indexes.create_index(fields, options)?;
        if build {
            self.rebuild_entries(&definition)?;
        }
        Ok(definition)
    }

    /// Lists every index registered on this collection.
    pub fn list_indexes(&self) -> DeebeeResult<Vec<IndexDefinition>> {
        self.inner.indexes.list_indexes()
    }

    /// Rebuilds the named index's entries from scratch. This is the repair
    /// path for entries orphaned by a crash mid-write, and the migration
    /// path after a version upgrade.
    pub fn re_index(&self, name: &str) -> DeebeeResult<()> {
        let definition = self.inner.indexes.require_index(name)?;
        self.rebuild_entries(&definition)
    }

    fn rebuild_entries(&self, definition: &IndexDefinition) -> DeebeeResult<()> {
        log::debug!(
            "Rebuilding index {} on {}",
            definition.name(),
            self.inner.name
        );
        self.inner.indexes.clear_entries(definition)?;
        for entry in self.inner.docs.range(RangeOptions::default())? {
            let (_, bytes) = entry?;
            let doc = crate::common::deserialize_document(&bytes)?;
            self.inner.indexes.index_document(definition, &doc)?;
        }
        Ok(())
    }

    /// Applies an update spec to the documents matching `query`.
    ///
    /// Without [`UpdateOptions::multi`] only the first match is touched.
    /// With [`UpdateOptions::upsert`], an empty match set inserts a new
    /// document seeded from the query's equality fields with the update
    /// applied on top.
    pub fn update(
        &self,
        query: &Query,
        spec: &UpdateSpec,
        options: &UpdateOptions,
    ) -> DeebeeResult<UpdateResult> {
        let mut cursor = self.find(query.clone());
        if let Some(hint) = &options.hint {
            cursor = cursor.hint(hint);
        }
        if !options.multi {
            cursor = cursor.limit(1);
        }
        let targets = cursor.to_vec()?;

        if targets.is_empty() && options.upsert {
            let seed = update::upsert_seed(query)?;
            let seeded = update::apply(&seed, spec)?;
            self.insert(seeded)?;
            return Ok(UpdateResult {
                n_upserted: 1,
                ..UpdateResult::default()
            });
        }

        // every matched document is rewritten, so the two counters agree
        // even when the operators leave the content unchanged
        let mut result = UpdateResult::default();
        for doc in targets {
            result.n_matched += 1;
            let updated = update::apply(&doc, spec)?;
            self.replace(&doc, &updated)?;
            result.n_modified += 1;
        }
        log::debug!("{} on {}", result, self.inner.name);
        Ok(result)
    }

    /// Removes every document matching `query`.
    pub fn delete(&self, query: &Query) -> DeebeeResult<DeleteResult> {
        let targets = self.find(query.clone()).to_vec()?;
        let definitions = self.maintained_indexes()?;
        for doc in &targets {
            for definition in &definitions {
                self.inner.indexes.deindex_document(definition, doc)?;
            }
            if let Some(id) = doc.id() {
                self.inner.docs.del(id.as_bytes())?;
            }
        }
        let result = DeleteResult {
            n_deleted: targets.len(),
        };
        log::debug!("{} on {}", result, self.inner.name);
        Ok(result)
    }

    fn replace(&self, old: &Document, new: &Document) -> DeebeeResult<()> {
        let id = old.id().ok_or_else(|| {
            DeebeeError::new(
                "Stored document is missing its _id",
                ErrorKind::InternalError,
            )
        })?;
        let definitions = self.maintained_indexes()?;
        for definition in &definitions {
            self.inner.indexes.deindex_document(definition, old)?;
        }
        self.inner.docs.put(id.as_bytes(), &serialize_document(new)?)?;
        for definition in &definitions {
            self.inner.indexes.index_document(definition, new)?;
        }
        Ok(())
    }

    /// The indexes whose entries this build maintains. Definitions written
    /// by a newer build are left untouched; they are repaired by
    /// [`Collection::re_index`] under a build that understands them.
    fn maintained_indexes(&self) -> DeebeeResult<Vec<IndexDefinition>> {
        Ok(self
            .inner
            .indexes
            .list_indexes()?
            .into_iter()
            .filter(IndexDefinition::is_supported)
            .collect())
    }
}

impl Debug for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.inner.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;
    use crate::store::{KvStore, MemoryStore};
    use crate::{doc, query};

    fn collection() -> Collection {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        Collection::new("people", Keyspace::new(store).sub("people"))
    }

    #[test]
    fn insert_assigns_an_id() {
        let people = collection();
        let stored = people.insert(doc! { name: "Ada" }).unwrap();
        let id = stored.id().expect("id assigned");

        let mut by_id = Query::new();
        by_id.put(crate::common::DOC_ID, id).unwrap();
        let found = people.find_one(&by_id).unwrap();
        assert_eq!(found.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn insert_rejects_duplicates_and_empty_docs() {
        let people = collection();
        let stored = people.insert(doc! { name: "Ada" }).unwrap();

        let err = people.insert(stored.clone()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);

        let err = people.insert(Document::new()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn debug_output_names_the_collection() {
        let people = collection();
        assert_eq!(format!("{:?}", people), "Collection { name: \"people\" }");
    }

    #[test]
    fn find_one_not_found() {
        let people = collection();
        let err = people.find_one(&query! { name: "nobody" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn update_single_and_multi() {
        let people = collection();
        for age in [30, 40, 50] {
            people.insert(doc! { kind: "x", age: (age) }).unwrap();
        }

        let single = people
            .update(
                &query! { kind: "x" },
                &UpdateSpec::from(doc! { "$set": { seen: true } }),
                &UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!(single.n_matched, 1);
        assert_eq!(single.n_modified, 1);

        let multi = people
            .update(
                &query! { kind: "x" },
                &UpdateSpec::from(doc! { "$inc": { age: 1 } }),
                &UpdateOptions {
                    multi: true,
                    ..UpdateOptions::default()
                },
            )
            .unwrap();
        assert_eq!(multi.n_matched, 3);
        assert_eq!(multi.n_modified, 3);
        assert_eq!(people.find(query! { age: 41 }).count().unwrap(), 1);
    }

    #[test]
    fn no_op_updates_still_count_as_modified() {
        let people = collection();
        people.insert(doc! { tags: ["a"] }).unwrap();

        // adding an element that is already present leaves the document
        // unchanged, but it is rewritten and counted all the same
        let result = people
            .update(
                &query! { tags: "a" },
                &UpdateSpec::from(doc! { "$addToSet": { tags: "a" } }),
                &UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!(result.n_matched, 1);
        assert_eq!(result.n_modified, 1);

        let found = people.find_one(&query! { tags: "a" }).unwrap();
        assert_eq!(
            found.get("tags"),
            Some(&Value::Array(vec![Value::from("a")]))
        );
    }

    #[test]
    fn upsert_inserts_when_nothing_matches() {
        let people = collection();
        let result = people
            .update(
                &query! { name: "fresh" },
                &UpdateSpec::from(doc! { "$set": { age: 1 } }),
                &UpdateOptions {
                    upsert: true,
                    ..UpdateOptions::default()
                },
            )
            .unwrap();
        assert_eq!(result.n_upserted, 1);
        assert_eq!(result.n_matched, 0);

        let found = people.find_one(&query! { name: "fresh" }).unwrap();
        assert_eq!(found.get("age"), Some(&Value::from(1)));
    }

    #[test]
    fn delete_removes_documents_and_index_entries() {
        let people = collection();
        people
            .create_index(&["age"], &CreateIndexOptions::default())
            .unwrap();
        for age in [30, 40] {
            people.insert(doc! { age: (age) }).unwrap();
        }

        let result = people.delete(&query! { age: 30 }).unwrap();
        assert_eq!(result.n_deleted, 1);
        assert_eq!(people.find(query! {}).count().unwrap(), 1);

        // the index no longer serves the deleted document
        let found = people
            .find(query! { age: 30 })
            .hint("age")
            .to_vec()
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn create_index_builds_from_existing_documents() {
        let people = collection();
        for age in [30, 40] {
            people.insert(doc! { age: (age) }).unwrap();
        }
        let definition = people
            .create_index(&["age"], &CreateIndexOptions::default())
            .unwrap();
        assert_eq!(definition.name(), "age");

        let cursor = people.find(query! { age: 40 });
        let plan = cursor.plan().unwrap().expect("index used");
        assert_eq!(plan.index.name(), "age");
        assert_eq!(cursor.count().unwrap(), 1);
    }

    #[test]
    fn re_index_repairs_entries() {
        let people = collection();
        people.insert(doc! { age: 30 }).unwrap();
        people
            .create_index(&["age"], &CreateIndexOptions::default())
            .unwrap();

        people.re_index("age").unwrap();
        assert_eq!(
            people.find(query! { age: 30 }).hint("age").count().unwrap(),
            1
        );

        let err = people.re_index("missing").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIndex);
    }
}
