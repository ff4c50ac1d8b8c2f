use crate::common::Value;
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::index::{key_codec, IndexDefinition, IndexManager};
use crate::query::Query;
use crate::store::prefix_successor;

/// The planner's decision: scan this index, seeded with an equality prefix
/// over its leading fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RangePlan {
    pub index: IndexDefinition,
    /// Leading index fields the query pins to a single value. May be empty,
    /// in which case the whole index is scanned (useful purely for its sort
    /// order).
    pub prefix_fields: Vec<String>,
}

impl RangePlan {
    /// Builds the exclusive range bounds for the index entry scan.
    ///
    /// The lower bound is the encoded equality prefix itself; every full
    /// entry key extends it and therefore sorts strictly after it. The
    /// upper bound is the smallest key past all extensions of the prefix.
    /// An empty prefix scans the entire index.
    pub fn scan_bounds(&self, query: &Query) -> DeebeeResult<(Option<Vec<u8>>, Option<Vec<u8>>)> {
        if self.prefix_fields.is_empty() {
            return Ok((None, None));
        }

        let mut values: Vec<Value> = Vec::with_capacity(self.prefix_fields.len());
        for field in &self.prefix_fields {
            let value = query.get(field).and_then(Query::equality_value).ok_or_else(|| {
                DeebeeError::new(
                    &format!("Plan prefix field {} is not pinned by the query", field),
                    ErrorKind::InternalError,
                )
            })?;
            values.push(value.clone());
        }

        let prefix = key_codec::encode_prefix(&values, self.index.version())?;
        let upper = prefix_successor(&prefix);
        Ok((Some(prefix), upper))
    }
}

/// Counts how many leading `index_fields` appear in `pinned`, i.e. the
/// length of the usable equality prefix.
fn consecutive_prefix(index_fields: &[String], pinned: &[String]) -> usize {
    index_fields
        .iter()
        .take_while(|field| pinned.contains(field))
        .count()
}

fn hint_sort_mismatch(name: &str) -> DeebeeError {
    log::error!("Hinted index {} cannot satisfy the requested sort", name);
    DeebeeError::new(
        &format!("Hinted index {} cannot satisfy the requested sort", name),
        ErrorKind::HintSortMismatch,
    )
}

/// Selects an index for the query, or `None` when only a full collection
/// scan will do.
///
/// Planning works on two field sets derived from the query in its original
/// field order: the fields the query constrains at all (everything except
/// `$exists: false` predicates, which ask for absence and can never be
/// served by a presence-sparse index), and the fields pinned to a single
/// value (literals and `$eq`). An index is usable when it covers some
/// constrained field; it is seeded with its longest run of leading pinned
/// fields, and the candidate with the longest such run wins. Ties keep
/// catalog order.
///
/// A sort requirement narrows the field: the sort field must sit in the
/// index immediately after the equality prefix, so that the index's own
/// order yields documents in sorted order.
///
/// A hint bypasses candidate selection but is still validated against the
/// sort requirement.
pub fn plan(
    query: &Query,
    sort_field: Option<&str>,
    hint: Option<&str>,
    manager: &IndexManager,
) -> DeebeeResult<Option<RangePlan>> {
    let mut constrained: Vec<String> = Vec::new();
    let mut pinned: Vec<String> = Vec::new();
    for (field, predicate) in query.iter() {
        let absence = Query::is_operator_object(predicate)
            && predicate
                .as_document()
                .and_then(|doc| doc.get("$exists"))
                .and_then(Value::as_bool)
                == Some(false);
        if absence {
            continue;
        }
        constrained.push(field.clone());
        if Query::equality_value(predicate).is_some() {
            pinned.push(field.clone());
        }
    }

    if let Some(name) = hint {
        let index = manager.require_index(name)?;
        if !index.is_supported() {
            log::error!("Invalid index: {} has unsupported version", name);
            return Err(DeebeeError::new(
                &format!(
                    "Invalid index: {} has unsupported version {}",
                    name,
                    index.version()
                ),
                ErrorKind::InvalidIndex,
            ));
        }

        let prefix_len = consecutive_prefix(index.fields(), &pinned);
        if let Some(sort_field) = sort_field {
            let sort_pos = index
                .fields()
                .iter()
                .position(|field| field == sort_field)
                .ok_or_else(|| hint_sort_mismatch(name))?;
            if prefix_len != sort_pos {
                return Err(hint_sort_mismatch(name));
            }
        }

        let prefix_fields = index.fields()[..prefix_len].to_vec();
        return Ok(Some(RangePlan {
            index,
            prefix_fields,
        }));
    }

    let mut best: Option<(usize, IndexDefinition)> = None;
    for index in manager.list_indexes()? {
        if !index.is_supported() {
            continue;
        }

        let prefix_len = consecutive_prefix(index.fields(), &pinned);
        let usable = match sort_field {
            Some(sort_field) => index
                .fields()
                .iter()
                .position(|field| field == sort_field)
                .is_some_and(|pos| pos == prefix_len),
            None => index
                .fields()
                .iter()
                .any(|field| constrained.contains(field)),
        };
        if !usable {
            continue;
        }

        // first candidate wins ties, so catalog order breaks them
        if best.as_ref().map_or(true, |(len, _)| prefix_len > *len) {
            best = Some((prefix_len, index));
        }
    }

    Ok(best.map(|(prefix_len, index)| {
        let prefix_fields = index.fields()[..prefix_len].to_vec();
        log::debug!(
            "Planned scan over index {} with {} equality prefix field(s)",
            index.name(),
            prefix_fields.len()
        );
        RangePlan {
            index,
            prefix_fields,
        }
    }))
}
