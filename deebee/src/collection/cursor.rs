use crate::collection::{Document, FindOptions, ObjectId};
use crate::common::{deserialize_document, SortOrder};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::index::{key_codec, IndexManager};
use crate::query::{matcher, planner, Query, RangePlan};
use crate::store::{Keyspace, KvRange, RangeOptions};
use std::collections::HashSet;

/// A lazy handle on the results of a find.
///
/// A cursor holds the query and its options; nothing touches the store
/// until [`Cursor::iter`] (or one of the consuming helpers) runs. The
/// modifiers consume and return the cursor, so options chain:
///
/// ```rust,ignore
/// let docs = people
///     .find(query! { age: { "$gte": 21 } })
///     .sort("age", SortOrder::Ascending)
///     .skip(10)
///     .limit(10)
///     .to_vec()?;
/// ```
///
/// Cursors are cheap to clone and a clone can be re-run; every run opens a
/// fresh snapshot scan.
#[derive(Clone)]
pub struct Cursor {
    docs: Keyspace,
    indexes: IndexManager,
    query: Query,
    options: FindOptions,
}

impl Cursor {
    pub(crate) fn new(docs: Keyspace, indexes: IndexManager, query: Query) -> Self {
        Cursor {
            docs,
            indexes,
            query,
            options: FindOptions::new(),
        }
    }

    /// Caps the number of documents yielded.
    pub fn limit(mut self, limit: usize) -> Self {
        self.options = self.options.with_limit(limit);
        self
    }

    /// Passes over the first `skip` matching documents. Applied before the
    /// limit.
    pub fn skip(mut self, skip: usize) -> Self {
        self.options = self.options.with_skip(skip);
        self
    }

    /// Requires results ordered by `field`. Sorting is index-only: if no
    /// index can produce the order, iteration fails with
    /// [`ErrorKind::UnsortableQuery`].
    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.options = self.options.with_sort(field, order);
        self
    }

    /// Forces the planner onto the named index.
    pub fn hint(mut self, index_name: &str) -> Self {
        self.options = self.options.with_hint(index_name);
        self
    }

    /// Reports the planner's decision for this cursor without running it.
    /// `None` means a full collection scan (or a primary-key lookup).
    pub fn plan(&self) -> DeebeeResult<Option<RangePlan>> {
        if self.query.id_lookup().is_some() {
            return Ok(None);
        }
        planner::plan(
            &self.query,
            self.options.sort.as_ref().map(|s| s.field.as_str()),
            self.options.hint.as_deref(),
            &self.indexes,
        )
    }

    /// Opens the result stream.
    pub fn iter(&self) -> DeebeeResult<DocumentStream> {
        let source = self.open_source()?;
        Ok(DocumentStream {
            source,
            docs: self.docs.clone(),
            query: self.query.clone(),
            seen: HashSet::new(),
            skip_remaining: self.options.skip,
            limit_remaining: self.options.limit,
            done: false,
        })
    }

    /// Collects every result into a vector.
    pub fn to_vec(&self) -> DeebeeResult<Vec<Document>> {
        self.iter()?.collect()
    }

    /// Counts the results without keeping them.
    pub fn count(&self) -> DeebeeResult<usize> {
        let mut count = 0;
        for doc in self.iter()? {
            doc?;
            count += 1;
        }
        Ok(count)
    }

    /// Yields just the first result, if any.
    pub fn first(&self) -> DeebeeResult<Option<Document>> {
        self.clone().limit(1).iter()?.next().transpose()
    }

    fn open_source(&self) -> DeebeeResult<Source> {
        // a concrete _id bypasses planning entirely
        if let Some(id) = self.query.id_lookup() {
            let doc = match self.docs.get(id.as_bytes())? {
                Some(bytes) => {
                    let doc = deserialize_document(&bytes)?;
                    matcher::matches(&doc, &self.query)?.then_some(doc)
                }
                None => None,
            };
            return Ok(Source::Single(doc));
        }

        let sort_field = self.options.sort.as_ref().map(|s| s.field.as_str());
        let chosen = planner::plan(
            &self.query,
            sort_field,
            self.options.hint.as_deref(),
            &self.indexes,
        )?;

        match chosen {
            Some(plan) => self.open_index_scan(plan),
            None => {
                if let Some(sort) = &self.options.sort {
                    log::error!("Unable to sort query results by {}", sort.field);
                    return Err(DeebeeError::new(
                        &format!("Unable to sort query results by {}", sort.field),
                        ErrorKind::UnsortableQuery,
                    ));
                }
                Ok(Source::Scan {
                    entries: self.docs.range(RangeOptions::default())?,
                })
            }
        }
    }

    fn open_index_scan(&self, plan: RangePlan) -> DeebeeResult<Source> {
        let (gt, lt) = plan.scan_bounds(&self.query)?;
        let reverse = self
            .options
            .sort
            .as_ref()
            .is_some_and(|s| s.order.is_reverse());
        let entries = self.indexes.entries(&plan.index).range(RangeOptions {
            gt,
            lt,
            reverse,
        })?;

        // Entry keys carry one flattened element per array field, so $all
        // can never be judged from a partial key; those predicates wait for
        // the full document.
        let prefilter_fields: Vec<String> = plan
            .index
            .fields()
            .iter()
            .filter(|field| {
                self.query
                    .get(field)
                    .and_then(|predicate| predicate.as_document())
                    .map_or(true, |ops| !ops.contains_key("$all"))
            })
            .cloned()
            .collect();
        let prefilter = self.query.subset(&prefilter_fields);

        Ok(Source::Index {
            entries,
            fields: plan.index.fields().to_vec(),
            version: plan.index.version(),
            prefilter,
        })
    }
}

enum Source {
    /// Primary-key lookup: at most one pre-checked document.
    Single(Option<Document>),
    /// Index entry scan; candidate ids resolve to full documents.
    Index {
        entries: KvRange,
        fields: Vec<String>,
        version: u8,
        prefilter: Query,
    },
    /// Full collection scan in id order.
    Scan { entries: KvRange },
}

/// The running form of a [Cursor]: a pull-based stream of matching
/// documents. Nothing beyond the yielded document is buffered, and
/// dropping the stream early abandons the scan with no cleanup cost.
pub struct DocumentStream {
    source: Source,
    docs: Keyspace,
    query: Query,
    seen: HashSet<ObjectId>,
    skip_remaining: usize,
    limit_remaining: Option<usize>,
    done: bool,
}

impl DocumentStream {
    /// Pulls the next candidate document out of the source, before the
    /// full-query re-match and skip/limit accounting.
    fn pull(&mut self) -> Option<DeebeeResult<Document>> {
        let DocumentStream { source, docs, .. } = self;
        match source {
            Source::Single(slot) => slot.take().map(Ok),
            Source::Scan { entries } => entries
                .next()
                .map(|entry| entry.and_then(|(_, bytes)| deserialize_document(&bytes))),
            Source::Index {
                entries,
                fields,
                version,
                prefilter,
            } => loop {
                let (key, id_bytes) = match entries.next()? {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(e)),
                };
                let partial = match key_codec::decode_key(&key, fields, *version) {
                    Ok(partial) => partial,
                    Err(e) => return Some(Err(e)),
                };
                match matcher::matches(&partial, prefilter) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => return Some(Err(e)),
                }
                match docs.get(&id_bytes) {
                    Ok(Some(bytes)) => return Some(deserialize_document(&bytes)),
                    // an entry can outlive its document after a crash
                    // between the two writes; reindexing repairs it
                    Ok(None) => {
                        log::warn!("Skipping stale index entry");
                        continue;
                    }
                    Err(e) => return Some(Err(e)),
                }
            },
        }
    }
}

impl Iterator for DocumentStream {
    type Item = DeebeeResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.limit_remaining == Some(0) {
            self.done = true;
            return None;
        }

        loop {
            let doc = match self.pull() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(doc)) => doc,
            };

            // multikey indexes yield one entry per array element; a
            // document counts once
            if let Some(id) = doc.id() {
                if self.seen.contains(&id) {
                    continue;
                }
            }
            match matcher::matches(&doc, &self.query) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
            if let Some(id) = doc.id() {
                self.seen.insert(id);
            }

            if self.skip_remaining > 0 {
                self.skip_remaining -= 1;
                continue;
            }
            if let Some(remaining) = &mut self.limit_remaining {
                *remaining -= 1;
            }
            return Some(Ok(doc));
        }
    }
}
