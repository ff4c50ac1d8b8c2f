use crate::collection::ObjectId;
use crate::common::{Value, DOC_ID};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use indexmap::IndexMap;
use std::fmt::{Debug, Formatter};

/// A find/update/delete predicate over documents.
///
/// A query maps field names to either a literal value (equality) or an
/// operator document such as `{ "$gt": 5 }`. Field order is preserved and
/// significant: the planner derives equality prefixes "in original field
/// order", so `query! { a: 1, b: 2 }` and `query! { b: 2, a: 1 }` may pick
/// different index prefixes.
///
/// An empty query matches every document.
///
/// # Examples
///
/// ```rust,ignore
/// use deebee::query;
///
/// let everything = query! {};
/// let range = query! { age: { "$gte": 21 }, city: "NY" };
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct Query {
    fields: IndexMap<String, Value>,
}

impl Query {
    /// Creates an empty query, which matches all documents.
    pub fn new() -> Self {
        Query {
            fields: IndexMap::new(),
        }
    }

    /// Adds a predicate on a field. A literal value means equality; a
    /// document whose keys start with `$` is an operator set.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::InvalidArgument`] if the field name is empty
    pub fn put<T: Into<Value>>(&mut self, field: &str, value: T) -> DeebeeResult<()> {
        if field.is_empty() {
            log::error!("Query does not support empty field names");
            return Err(DeebeeError::new(
                "Query does not support empty field names",
                ErrorKind::InvalidArgument,
            ));
        }
        self.fields.insert(field.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over predicates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Restricts the query to the given fields, preserving order.
    pub fn subset(&self, fields: &[String]) -> Query {
        Query {
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| fields.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Detects a pure primary-key lookup: `_id` bound to a concrete id
    /// value rather than an operator document.
    pub fn id_lookup(&self) -> Option<ObjectId> {
        match self.fields.get(DOC_ID) {
            Some(Value::ObjectId(id)) => Some(*id),
            _ => None,
        }
    }

    /// Checks whether a predicate value is an operator document, i.e. a
    /// nested document with at least one `$`-prefixed key.
    pub fn is_operator_object(value: &Value) -> bool {
        match value.as_document() {
            Some(doc) => doc.keys().any(|key| key.starts_with('$')),
            None => false,
        }
    }

    /// Extracts the equality value a predicate pins its field to, if any:
    /// the literal itself, or the operand of an `$eq` operator.
    pub fn equality_value(value: &Value) -> Option<&Value> {
        if !Self::is_operator_object(value) {
            return Some(value);
        }
        value.as_document().and_then(|doc| doc.get("$eq"))
    }
}

impl Debug for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

impl FromIterator<(String, Value)> for Query {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Query {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Creates a [Query] from a literal, in the same shape as
/// [`doc!`](crate::doc). Operator keys are written as string literals:
///
/// ```rust,ignore
/// use deebee::query;
///
/// let q = query! { rating: { "$gte": 4 }, tags: { "$all": ["vegan"] } };
/// ```
#[macro_export]
macro_rules! query {
    () => {
        $crate::query::Query::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut query = $crate::query::Query::new();
            $(
                query
                    .put(&$crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect("failed to build query literal");
            )*
            query
        }
    };
}
