use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic, ReadExecutor};

/// Error kinds for DeeBee operations.
///
/// Each kind describes a specific category of failure so callers can react
/// precisely (for example, treating [`ErrorKind::NotFound`] from `find_one`
/// differently from a storage failure).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A required argument was missing or malformed (e.g. no document
    /// supplied to insert, `$in` given a non-array operand).
    InvalidArgument,
    /// An insert supplied an `_id` that already exists in the collection.
    DuplicateKey,
    /// The requested document was not found.
    NotFound,
    /// An unknown index name was referenced (hint or `get_index`).
    InvalidIndex,
    /// A hinted index cannot satisfy the requested sort order.
    HintSortMismatch,
    /// A sort was requested but no index can produce the ordering.
    UnsortableQuery,
    /// An unrecognized `$`-prefixed key appeared in a query.
    InvalidQueryOperator,
    /// An unrecognized `$`-prefixed key appeared in an update spec.
    InvalidUpdateOperator,
    /// The supplied id bytes do not form a valid object id.
    InvalidId,
    /// Error encoding or decoding persisted data.
    EncodingError,
    /// Error from the underlying key-value store.
    StoreError,
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::DuplicateKey => write!(f, "Duplicate key"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidIndex => write!(f, "Invalid index"),
            ErrorKind::HintSortMismatch => write!(f, "Hint sort mismatch"),
            ErrorKind::UnsortableQuery => write!(f, "Unsortable query"),
            ErrorKind::InvalidQueryOperator => write!(f, "Invalid query operator"),
            ErrorKind::InvalidUpdateOperator => write!(f, "Invalid update operator"),
            ErrorKind::InvalidId => write!(f, "Invalid id"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::StoreError => write!(f, "Store error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom DeeBee error type.
///
/// `DeebeeError` carries the error message, kind, an optional cause for
/// error chaining, and a backtrace captured at construction time.
///
/// # Examples
///
/// ```rust,ignore
/// use deebee::errors::{DeebeeError, ErrorKind, DeebeeResult};
///
/// fn example() -> DeebeeResult<()> {
///     Err(DeebeeError::new("Invalid index", ErrorKind::InvalidIndex))
/// }
/// ```
#[derive(Clone)]
pub struct DeebeeError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DeebeeError>>,
    backtrace: Atomic<Backtrace>,
}

impl DeebeeError {
    /// Creates a new `DeebeeError` with the specified message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DeebeeError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `DeebeeError` with a cause attached, preserving the
    /// underlying error for debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DeebeeError) -> Self {
        DeebeeError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DeebeeError> {
        self.cause.as_deref()
    }
}

impl Display for DeebeeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DeebeeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => self
                .backtrace
                .read_with(|bt| write!(f, "{}\n{:?}", self.message, bt)),
        }
    }
}

impl Error for DeebeeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for DeeBee operations.
///
/// All fallible DeeBee operations return this type.
pub type DeebeeResult<T> = Result<T, DeebeeError>;

// From trait implementations for automatic error conversion
impl From<std::io::Error> for DeebeeError {
    fn from(err: std::io::Error) -> Self {
        DeebeeError::new(&format!("IO error: {}", err), ErrorKind::StoreError)
    }
}

impl From<std::string::FromUtf8Error> for DeebeeError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DeebeeError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<rmp_serde::encode::Error> for DeebeeError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        DeebeeError::new(
            &format!("Serialization error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<rmp_serde::decode::Error> for DeebeeError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        DeebeeError::new(
            &format!("Deserialization error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<String> for DeebeeError {
    fn from(msg: String) -> Self {
        DeebeeError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DeebeeError {
    fn from(msg: &str) -> Self {
        DeebeeError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deebee_error_new_creates_error() {
        let error = DeebeeError::new("An error occurred", ErrorKind::StoreError);
        assert_eq!(error.message(), "An error occurred");
        assert_eq!(error.kind(), &ErrorKind::StoreError);
        assert!(error.cause().is_none());
    }

    #[test]
    fn deebee_error_new_with_cause_creates_error() {
        let cause = DeebeeError::new("Disk failed", ErrorKind::StoreError);
        let error =
            DeebeeError::new_with_cause("Index write failed", ErrorKind::StoreError, cause);
        assert_eq!(error.message(), "Index write failed");
        assert!(error.cause().is_some());
        assert_eq!(error.cause().unwrap().message(), "Disk failed");
    }

    #[test]
    fn deebee_error_display_formats_message_only() {
        let error = DeebeeError::new("An error occurred", ErrorKind::NotFound);
        assert_eq!(format!("{}", error), "An error occurred");
    }

    #[test]
    fn deebee_error_debug_includes_cause() {
        let cause = DeebeeError::new("Root cause", ErrorKind::StoreError);
        let error = DeebeeError::new_with_cause("Top level", ErrorKind::InternalError, cause);
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("Top level"));
        assert!(formatted.contains("Caused by:"));
    }

    #[test]
    fn deebee_error_source_returns_cause() {
        let cause = DeebeeError::new("Root cause", ErrorKind::StoreError);
        let error = DeebeeError::new_with_cause("Top level", ErrorKind::InternalError, cause);
        assert!(error.source().is_some());

        let error = DeebeeError::new("No cause", ErrorKind::InternalError);
        assert!(error.source().is_none());
    }

    #[test]
    fn error_kind_display_matches_category() {
        assert_eq!(format!("{}", ErrorKind::InvalidIndex), "Invalid index");
        assert_eq!(
            format!("{}", ErrorKind::InvalidQueryOperator),
            "Invalid query operator"
        );
        assert_eq!(format!("{}", ErrorKind::UnsortableQuery), "Unsortable query");
    }

    #[test]
    fn from_conversions_map_to_expected_kinds() {
        let io_err: DeebeeError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(io_err.kind(), &ErrorKind::StoreError);

        let utf8_err: DeebeeError = String::from_utf8(vec![0xFF]).unwrap_err().into();
        assert_eq!(utf8_err.kind(), &ErrorKind::EncodingError);

        let str_err: DeebeeError = "plain message".into();
        assert_eq!(str_err.kind(), &ErrorKind::InternalError);
        assert_eq!(str_err.message(), "plain message");
    }

    #[test]
    fn question_mark_operator_converts_errors() {
        fn decode_op() -> DeebeeResult<String> {
            let value = String::from_utf8(vec![0x68, 0x69])?;
            Ok(value)
        }
        assert_eq!(decode_op().unwrap(), "hi");
    }
}
