use crate::collection::Document;
use crate::collection::ObjectId;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};

/// Compare two floats with NaN treated as greater than all other values,
/// matching the total ordering used for index keys.
#[inline]
fn num_cmp(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[inline]
fn num_eq(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// Represents a [Document] field value.
///
/// A value is either a scalar (null, boolean, number, string, date, binary
/// object id, raw bytes), an [`Value::Array`] of values, or a nested
/// [`Value::Document`].
///
/// # Numeric coercion
///
/// The three numeric variants ([`Value::I32`], [`Value::I64`],
/// [`Value::F64`]) equate and order against each other through `f64`
/// coercion, so `Value::from(1i64) == Value::from(1.0)`. This mirrors the
/// behavior of values decoded back out of index keys, which always
/// reconstruct numbers as `F64`.
///
/// # Ordering
///
/// `Ord` is total. Values of the same type compare naturally; values of
/// different (non-numeric) types compare by a fixed type rank
/// (null < numbers < string < document < array < bytes < object id
/// < bool < date).
#[derive(Clone, Default, serde::Deserialize, serde::Serialize)]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 32-bit integer value.
    I32(i32),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents a point in time with millisecond precision.
    DateTime(DateTime<Utc>),
    /// Represents a 12-byte binary object identifier.
    ObjectId(ObjectId),
    /// Represents opaque binary data.
    Bytes(Vec<u8>),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents a nested document.
    Document(Document),
}

impl Value {
    /// Returns `true` if this value is one of the numeric variants.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_) | Value::F64(_))
    }

    /// Coerces a numeric value to `f64`. Returns `None` for non-numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Coerces this value to the comparable form used by range operators:
    /// numbers as `f64`, dates reduced to their millisecond epoch.
    ///
    /// Mixed comparisons between values without a comparable form are not an
    /// error; the matcher treats them as a failed match.
    pub fn as_comparable(&self) -> Option<f64> {
        match self {
            Value::DateTime(dt) => Some(dt.timestamp_millis() as f64),
            other => other.as_f64(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    /// Fixed rank used to order values of different types.
    pub(crate) fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::I32(_) | Value::I64(_) | Value::F64(_) => 1,
            Value::String(_) => 2,
            Value::Document(_) => 3,
            Value::Array(_) => 4,
            Value::Bytes(_) => 5,
            Value::ObjectId(_) => 6,
            Value::Bool(_) => 7,
            Value::DateTime(_) => 8,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_number() && other.is_number() {
            // cross-numeric equality through f64
            if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                return num_eq(a, b);
            }
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => {
                a.timestamp_millis() == b.timestamp_millis()
            }
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.is_number() && other.is_number() {
            if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                return num_cmp(a, b);
            }
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => {
                a.timestamp_millis().cmp(&b.timestamp_millis())
            }
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Value::ObjectId(v) => write!(f, "ObjectId({})", v),
            Value::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Value::Array(values) => f.debug_list().entries(values.iter()).finish(),
            Value::Document(doc) => write!(f, "{:?}", doc),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}
