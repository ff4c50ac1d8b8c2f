use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::query::Query;
use std::cmp::Ordering;

/// The query operators understood by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    All,
    Exists,
}

impl QueryOperator {
    /// Parses a `$`-prefixed operator key.
    ///
    /// # Errors
    ///
    /// * [`ErrorKind::InvalidQueryOperator`] for anything unrecognized
    pub fn parse(key: &str) -> DeebeeResult<QueryOperator> {
        match key {
            "$eq" => Ok(QueryOperator::Eq),
            "$gt" => Ok(QueryOperator::Gt),
            "$gte" => Ok(QueryOperator::Gte),
            "$lt" => Ok(QueryOperator::Lt),
            "$lte" => Ok(QueryOperator::Lte),
            "$in" => Ok(QueryOperator::In),
            "$all" => Ok(QueryOperator::All),
            "$exists" => Ok(QueryOperator::Exists),
            other => {
                log::error!("Invalid query operator: {}", other);
                Err(DeebeeError::new(
                    &format!("Invalid query operator: {}", other),
                    ErrorKind::InvalidQueryOperator,
                ))
            }
        }
    }
}

/// Evaluates a full query against a document. Fields combine with AND;
/// operators within one field's operator document also combine with AND.
pub fn matches(doc: &Document, query: &Query) -> DeebeeResult<bool> {
    for (field, predicate) in query.iter() {
        if !field_matches(doc.get(field), predicate)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluates one field's predicate against the field's value (`None` when
/// the document lacks the field).
pub fn field_matches(value: Option<&Value>, predicate: &Value) -> DeebeeResult<bool> {
    let operators = match predicate.as_document() {
        Some(operators) if Query::is_operator_object(predicate) => operators,
        _ => return Ok(value.is_some_and(|v| compare_eq(v, predicate))),
    };

    for (key, operand) in operators.iter() {
        let operator = QueryOperator::parse(key)?;
        if !apply(operator, value, operand)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn apply(operator: QueryOperator, value: Option<&Value>, operand: &Value) -> DeebeeResult<bool> {
    match operator {
        QueryOperator::Eq => Ok(value.is_some_and(|v| compare_eq(v, operand))),
        QueryOperator::Gt => Ok(compare_range(value, operand, Ordering::is_gt)),
        QueryOperator::Gte => Ok(compare_range(value, operand, Ordering::is_ge)),
        QueryOperator::Lt => Ok(compare_range(value, operand, Ordering::is_lt)),
        QueryOperator::Lte => Ok(compare_range(value, operand, Ordering::is_le)),
        QueryOperator::In => {
            let candidates = array_operand(operand, "$in")?;
            Ok(value.is_some_and(|v| match v.as_array() {
                Some(elements) => elements
                    .iter()
                    .any(|element| candidates.contains(element)),
                None => candidates.contains(v),
            }))
        }
        QueryOperator::All => {
            let required = array_operand(operand, "$all")?;
            Ok(value.and_then(Value::as_array).is_some_and(|elements| {
                required.iter().all(|needle| elements.contains(needle))
            }))
        }
        QueryOperator::Exists => {
            let expected = operand.as_bool().ok_or_else(|| {
                log::error!("$exists must be set to a boolean");
                DeebeeError::new(
                    "$exists must be set to a boolean",
                    ErrorKind::InvalidArgument,
                )
            })?;
            Ok(value.is_some() == expected)
        }
    }
}

fn array_operand<'a>(operand: &'a Value, operator: &str) -> DeebeeResult<&'a Vec<Value>> {
    operand.as_array().ok_or_else(|| {
        log::error!("{} must be set to an array", operator);
        DeebeeError::new(
            &format!("{} must be set to an array", operator),
            ErrorKind::InvalidArgument,
        )
    })
}

/// Equality with array semantics: an array field matches when any element
/// equals the operand, unless the operand is itself an array, in which case
/// arrays compare elementwise. Object ids compare by their 12 bytes.
fn compare_eq(value: &Value, operand: &Value) -> bool {
    if let (Some(elements), false) = (value.as_array(), operand.is_array()) {
        return elements.iter().any(|element| element == operand);
    }
    value == operand
}

/// Range comparison over the comparable form: numbers and dates reduce to
/// `f64`, strings compare lexicographically against strings. A missing
/// field or a mixed incomparable pair is simply not a match.
fn compare_range(
    value: Option<&Value>,
    operand: &Value,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    let Some(value) = value else { return false };

    if let (Some(a), Some(b)) = (value.as_comparable(), operand.as_comparable()) {
        return a.partial_cmp(&b).is_some_and(accept);
    }
    if let (Some(a), Some(b)) = (value.as_str(), operand.as_str()) {
        return accept(a.cmp(b));
    }
    false
}
