use crate::collection::ObjectId;
use crate::common::{Value, DOC_ID};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// Represents a document in a DeeBee collection.
///
/// Documents are ordered mappings from field name ([String]) to [Value].
/// Nested documents and arrays are ordinary values, so a document can hold
/// arbitrarily shaped data.
///
/// The `_id` field is reserved: it always holds the document's 12-byte
/// [ObjectId], assigned during insertion when absent, and never changes
/// afterwards. Writing a non-id value into `_id` is rejected.
///
/// # Examples
///
/// ```rust,ignore
/// use deebee::doc;
///
/// let doc = doc! {
///     name: "pasta",
///     ingredients: ["noodles", "sauce"],
///     servings: 4,
/// };
/// assert_eq!(doc.size(), 3);
/// ```
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Default, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct Document {
    data: BTreeMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: BTreeMap::new(),
        }
    }

    /// Checks if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the number of fields in the document.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates a value with a field name.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::InvalidArgument`] if the key is empty
    /// * [`ErrorKind::InvalidId`] if the key is `_id` and the value is not an
    ///   [ObjectId]
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> DeebeeResult<()> {
        if key.is_empty() {
            log::error!("Document does not support empty field names");
            return Err(DeebeeError::new(
                "Document does not support empty field names",
                ErrorKind::InvalidArgument,
            ));
        }

        let value = value.into();
        if key == DOC_ID && value.as_object_id().is_none() {
            log::error!("The _id field must hold an object id");
            return Err(DeebeeError::new(
                "The _id field must hold an object id",
                ErrorKind::InvalidId,
            ));
        }

        self.data.insert(key.to_string(), value);
        Ok(())
    }

    /// Gets the value for a field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Removes a field, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Checks whether a field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the document id, if one has been assigned.
    pub fn id(&self) -> Option<ObjectId> {
        self.get(DOC_ID).and_then(|v| v.as_object_id().copied())
    }

    /// Checks whether all the given fields are present.
    ///
    /// This is the "sparse index by presence" test: a document missing any
    /// indexed field produces no index entries for that index. A null value
    /// still counts as present and is indexed as null.
    pub fn has_fields(&self, fields: &[String]) -> bool {
        fields.iter().all(|field| self.contains_key(field))
    }

    /// Iterates over `(field, value)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Iterates over field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.data.iter()).finish()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

/// Strips the surrounding quotes `stringify!` leaves on string-literal keys.
/// Used by the [`doc!`](crate::doc) and [`query!`](crate::query) macros.
#[doc(hidden)]
pub fn normalize(key: &str) -> String {
    key.trim_matches('"').to_string()
}

/// Creates a [Document] from a literal.
///
/// Keys may be bare identifiers or string literals (useful for reserved
/// names); values may be scalars, arrays, nested literals, or arbitrary
/// expressions convertible into [`crate::common::Value`].
///
/// # Examples
///
/// ```rust,ignore
/// use deebee::doc;
///
/// let doc = doc! {
///     name: "Alice",
///     scores: [90, 85],
///     address: { city: "New York" },
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.put(&$crate::collection::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect("failed to build document literal");
            )*
            doc
        }
    };
}

/// Helper macro converting values for [`doc!`](crate::doc) and
/// [`query!`](crate::query). Handles nested documents, arrays, and
/// expressions.
#[macro_export]
macro_rules! doc_value {
    // nested document
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    // array of values
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    // any expression convertible into a Value
    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
