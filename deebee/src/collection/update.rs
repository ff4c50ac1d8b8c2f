use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::errors::{DeebeeError, ErrorKind, DeebeeResult};
use crate::query::matcher;

/// An update specification: one or more steps applied in sequence.
///
/// Each step is a document mixing plain field assignments with operator
/// groups (`$set`, `$inc`, `$push`, ...). Multi-step specs exist so a later
/// step can observe the effect of an earlier one, e.g. `$set` a field and
/// then `$inc` it.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    steps: Vec<Document>,
}

impl UpdateSpec {
    pub fn steps(&self) -> &[Document] {
        &self.steps
    }
}

impl From<Document> for UpdateSpec {
    fn from(step: Document) -> Self {
        UpdateSpec { steps: vec![step] }
    }
}

impl From<Vec<Document>> for UpdateSpec {
    fn from(steps: Vec<Document>) -> Self {
        UpdateSpec { steps }
    }
}

/// Options for [`Collection::update`](crate::collection::Collection::update).
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Update every matching document instead of just the first.
    pub multi: bool,
    /// When nothing matches, insert a document seeded from the query's
    /// equality fields with the update applied.
    pub upsert: bool,
    /// Index hint forwarded to the planner when finding targets.
    pub hint: Option<String>,
}

/// Applies an update spec to a document, returning the rewritten copy.
/// The input document is never mutated and `_id` always survives untouched.
pub fn apply(doc: &Document, spec: &UpdateSpec) -> DeebeeResult<Document> {
    let mut updated = doc.clone();
    for step in spec.steps() {
        apply_step(&mut updated, step)?;
    }
    Ok(updated)
}

fn apply_step(doc: &mut Document, step: &Document) -> DeebeeResult<()> {
    for (key, value) in step.iter() {
        if let Some(operator) = key.strip_prefix('$') {
            let operands = operand_group(key, value)?;
            match operator {
                "set" => {
                    for (field, value) in operands.iter() {
                        if field != DOC_ID {
                            doc.put(field, value.clone())?;
                        }
                    }
                }
                "unset" => {
                    for (field, _) in operands.iter() {
                        if field != DOC_ID {
                            doc.remove(field);
                        }
                    }
                }
                "rename" => {
                    for (field, new_name) in operands.iter() {
                        apply_rename(doc, field, new_name)?;
                    }
                }
                "inc" => {
                    for (field, delta) in operands.iter() {
                        apply_inc(doc, field, delta)?;
                    }
                }
                "mul" => {
                    for (field, factor) in operands.iter() {
                        apply_mul(doc, field, factor)?;
                    }
                }
                "push" => {
                    for (field, value) in operands.iter() {
                        apply_push(doc, field, value)?;
                    }
                }
                "addToSet" => {
                    for (field, value) in operands.iter() {
                        apply_add_to_set(doc, field, value)?;
                    }
                }
                "pop" => {
                    for (field, direction) in operands.iter() {
                        apply_pop(doc, field, direction)?;
                    }
                }
                "pull" => {
                    for (field, predicate) in operands.iter() {
                        apply_pull(doc, field, predicate)?;
                    }
                }
                other => {
                    log::error!("Invalid update operator: ${}", other);
                    return Err(DeebeeError::new(
                        &format!("Invalid update operator: ${}", other),
                        ErrorKind::InvalidUpdateOperator,
                    ));
                }
            }
        } else if key != DOC_ID {
            // bare keys are plain field replacement
            doc.put(key, value.clone())?;
        }
    }
    Ok(())
}

fn operand_group<'a>(operator: &str, value: &'a Value) -> DeebeeResult<&'a Document> {
    value.as_document().ok_or_else(|| {
        log::error!("{} requires a document of field operands", operator);
        DeebeeError::new(
            &format!("{} requires a document of field operands", operator),
            ErrorKind::InvalidArgument,
        )
    })
}

fn numeric_operand(operator: &str, field: &str, value: &Value) -> DeebeeResult<f64> {
    value.as_f64().ok_or_else(|| {
        log::error!("{} requires a numeric operand for field {}", operator, field);
        DeebeeError::new(
            &format!("{} requires a numeric operand for field {}", operator, field),
            ErrorKind::InvalidArgument,
        )
    })
}

fn is_integer(value: &Value) -> bool {
    matches!(value, Value::I32(_) | Value::I64(_))
}

fn apply_rename(doc: &mut Document, field: &str, new_name: &Value) -> DeebeeResult<()> {
    let new_name = new_name.as_str().ok_or_else(|| {
        log::error!("$rename requires a string operand for field {}", field);
        DeebeeError::new(
            &format!("$rename requires a string operand for field {}", field),
            ErrorKind::InvalidArgument,
        )
    })?;
    if field == DOC_ID || new_name == DOC_ID {
        return Ok(());
    }
    if let Some(value) = doc.remove(field) {
        doc.put(new_name, value)?;
    }
    Ok(())
}

fn apply_inc(doc: &mut Document, field: &str, delta: &Value) -> DeebeeResult<()> {
    let delta_f = numeric_operand("$inc", field, delta)?;
    let next = match doc.get(field) {
        // missing fields start from the delta itself
        None => delta.clone(),
        Some(existing) => {
            let existing_f = numeric_operand("$inc", field, existing)?;
            if is_integer(existing) && is_integer(delta) {
                Value::I64((existing_f as i64) + (delta_f as i64))
            } else {
                Value::F64(existing_f + delta_f)
            }
        }
    };
    doc.put(field, next)
}

fn apply_mul(doc: &mut Document, field: &str, factor: &Value) -> DeebeeResult<()> {
    let factor_f = numeric_operand("$mul", field, factor)?;
    let next = match doc.get(field) {
        // missing fields become zero, typed like the factor
        None => {
            if is_integer(factor) {
                Value::I64(0)
            } else {
                Value::F64(0.0)
            }
        }
        Some(existing) => {
            let existing_f = numeric_operand("$mul", field, existing)?;
            if is_integer(existing) && is_integer(factor) {
                Value::I64((existing_f as i64) * (factor_f as i64))
            } else {
                Value::F64(existing_f * factor_f)
            }
        }
    };
    doc.put(field, next)
}

/// Unwraps a `{ "$each": [...] }` wrapper into its elements, or wraps a
/// single value.
fn pushed_values(value: &Value) -> DeebeeResult<Option<Vec<Value>>> {
    let Some(wrapper) = value.as_document() else {
        return Ok(None);
    };
    let Some(each) = wrapper.get("$each") else {
        return Ok(None);
    };
    let elements = each.as_array().ok_or_else(|| {
        log::error!("$each must be set to an array");
        DeebeeError::new("$each must be set to an array", ErrorKind::InvalidArgument)
    })?;
    Ok(Some(elements.clone()))
}

fn apply_push(doc: &mut Document, field: &str, value: &Value) -> DeebeeResult<()> {
    let each = pushed_values(value)?;
    match doc.get(field) {
        Some(Value::Array(existing)) => {
            let mut elements = existing.clone();
            match each {
                Some(values) => elements.extend(values),
                None => elements.push(value.clone()),
            }
            doc.put(field, Value::Array(elements))
        }
        Some(_) => {
            log::error!("$push cannot append to non-array field {}", field);
            Err(DeebeeError::new(
                &format!("$push cannot append to non-array field {}", field),
                ErrorKind::InvalidArgument,
            ))
        }
        // an absent field takes the pushed value as-is; $each still
        // produces an array
        None => match each {
            Some(values) => doc.put(field, Value::Array(values)),
            None => doc.put(field, value.clone()),
        },
    }
}

fn apply_add_to_set(doc: &mut Document, field: &str, value: &Value) -> DeebeeResult<()> {
    let candidates = match pushed_values(value)? {
        Some(values) => values,
        None => vec![value.clone()],
    };
    match doc.get(field) {
        Some(Value::Array(existing)) => {
            let mut elements = existing.clone();
            for candidate in candidates {
                if !elements.contains(&candidate) {
                    elements.push(candidate);
                }
            }
            doc.put(field, Value::Array(elements))
        }
        // set semantics only apply to arrays
        Some(_) => Ok(()),
        None => {
            let mut elements: Vec<Value> = Vec::new();
            for candidate in candidates {
                if !elements.contains(&candidate) {
                    elements.push(candidate);
                }
            }
            doc.put(field, Value::Array(elements))
        }
    }
}

fn apply_pop(doc: &mut Document, field: &str, direction: &Value) -> DeebeeResult<()> {
    let direction = numeric_operand("$pop", field, direction)?;
    if let Some(Value::Array(existing)) = doc.get(field) {
        if existing.is_empty() {
            return Ok(());
        }
        let mut elements = existing.clone();
        if direction < 0.0 {
            elements.remove(0);
        } else {
            elements.pop();
        }
        doc.put(field, Value::Array(elements))?;
    }
    Ok(())
}

fn apply_pull(doc: &mut Document, field: &str, predicate: &Value) -> DeebeeResult<()> {
    if let Some(Value::Array(existing)) = doc.get(field) {
        let mut kept = Vec::with_capacity(existing.len());
        for element in existing.clone() {
            if !matcher::field_matches(Some(&element), predicate)? {
                kept.push(element);
            }
        }
        doc.put(field, Value::Array(kept))?;
    }
    Ok(())
}

/// Synthesizes the seed document for an upsert: every field the query pins
/// to a single value (literals and `$eq` operands).
pub fn upsert_seed(query: &crate::query::Query) -> DeebeeResult<Document> {
    let mut seed = Document::new();
    for (field, predicate) in query.iter() {
        if let Some(value) = crate::query::Query::equality_value(predicate) {
            seed.put(field, value.clone())?;
        }
    }
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, query};

    fn run(doc: &Document, step: Document) -> Document {
        apply(doc, &UpdateSpec::from(step)).unwrap()
    }

    #[test]
    fn bare_fields_replace_values() {
        let doc = doc! { a: 1, b: "old" };
        let updated = run(&doc, doc! { b: "new", c: true });
        assert_eq!(updated.get("a"), Some(&Value::from(1)));
        assert_eq!(updated.get("b"), Some(&Value::from("new")));
        assert_eq!(updated.get("c"), Some(&Value::from(true)));
    }

    #[test]
    fn set_and_unset() {
        let doc = doc! { a: 1, b: 2 };
        let updated = run(&doc, doc! { "$set": { a: 10, c: 30 }, "$unset": { b: 1 } });
        assert_eq!(updated.get("a"), Some(&Value::from(10)));
        assert_eq!(updated.get("c"), Some(&Value::from(30)));
        assert!(updated.get("b").is_none());
    }

    #[test]
    fn id_is_never_touched() {
        let mut doc = doc! { a: 1 };
        let id = crate::collection::ObjectId::new();
        doc.put(DOC_ID, id).unwrap();

        let other = crate::collection::ObjectId::new();
        let updated = run(
            &doc,
            doc! { "$set": { "_id": (other) }, "$unset": { "_id": (other) }, "_id": (other) },
        );
        assert_eq!(updated.id(), Some(id));
    }

    #[test]
    fn inc_adds_and_creates() {
        let doc = doc! { value: 0, rating: 4.5 };
        let updated = run(&doc, doc! { "$inc": { value: 1, rating: 0.5, fresh: 7 } });
        assert_eq!(updated.get("value"), Some(&Value::I64(1)));
        assert_eq!(updated.get("rating"), Some(&Value::F64(5.0)));
        assert_eq!(updated.get("fresh"), Some(&Value::from(7)));
    }

    #[test]
    fn inc_rejects_non_numeric_target() {
        let doc = doc! { value: "nope" };
        let err = apply(&doc, &UpdateSpec::from(doc! { "$inc": { value: 1 } })).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn mul_scales_and_zeroes_missing() {
        let doc = doc! { value: 6 };
        let updated = run(&doc, doc! { "$mul": { value: 7, fresh: 3 } });
        assert_eq!(updated.get("value"), Some(&Value::I64(42)));
        assert_eq!(updated.get("fresh"), Some(&Value::I64(0)));
    }

    #[test]
    fn rename_moves_a_value() {
        let doc = doc! { old: "keep me" };
        let updated = run(&doc, doc! { "$rename": { old: "new", absent: "other" } });
        assert!(updated.get("old").is_none());
        assert_eq!(updated.get("new"), Some(&Value::from("keep me")));
        assert!(updated.get("other").is_none());
    }

    #[test]
    fn push_appends_and_creates() {
        let doc = doc! { tags: ["a"] };
        let updated = run(&doc, doc! { "$push": { tags: "b" } });
        assert_eq!(
            updated.get("tags").and_then(Value::as_array).unwrap().len(),
            2
        );

        // $each appends several at once
        let updated = run(&updated, doc! { "$push": { tags: { "$each": ["c", "d"] } } });
        assert_eq!(
            updated.get("tags").and_then(Value::as_array).unwrap().len(),
            4
        );

        // a missing field takes the pushed value directly
        let updated = run(&doc! {}, doc! { "$push": { fresh: "solo" } });
        assert_eq!(updated.get("fresh"), Some(&Value::from("solo")));
    }

    #[test]
    fn add_to_set_deduplicates() {
        let doc = doc! { tags: ["a", "b"] };
        let updated = run(
            &doc,
            doc! { "$addToSet": { tags: { "$each": ["b", "c", "c"] } } },
        );
        let tags = updated.get("tags").and_then(Value::as_array).unwrap();
        assert_eq!(
            tags,
            &vec![Value::from("a"), Value::from("b"), Value::from("c")]
        );
    }

    #[test]
    fn pop_trims_either_end() {
        let doc = doc! { tags: ["a", "b", "c"] };
        let updated = run(&doc, doc! { "$pop": { tags: 1 } });
        let tags = updated.get("tags").and_then(Value::as_array).unwrap();
        assert_eq!(tags, &vec![Value::from("a"), Value::from("b")]);

        let updated = run(&updated, doc! { "$pop": { tags: (-1) } });
        let tags = updated.get("tags").and_then(Value::as_array).unwrap();
        assert_eq!(tags, &vec![Value::from("b")]);

        // missing or empty fields are left alone
        let unchanged = run(&doc! {}, doc! { "$pop": { tags: 1 } });
        assert!(unchanged.get("tags").is_none());
    }

    #[test]
    fn pull_filters_by_predicate() {
        let doc = doc! { scores: [1, 5, 10, 20] };
        let updated = run(&doc, doc! { "$pull": { scores: { "$gte": 10 } } });
        let scores = updated.get("scores").and_then(Value::as_array).unwrap();
        assert_eq!(scores, &vec![Value::from(1), Value::from(5)]);

        // a literal predicate pulls by equality
        let updated = run(&updated, doc! { "$pull": { scores: 5 } });
        let scores = updated.get("scores").and_then(Value::as_array).unwrap();
        assert_eq!(scores, &vec![Value::from(1)]);
    }

    #[test]
    fn steps_apply_in_sequence() {
        let doc = doc! {};
        let spec = UpdateSpec::from(vec![
            doc! { "$set": { value: 10 } },
            doc! { "$inc": { value: 5 } },
        ]);
        let updated = apply(&doc, &spec).unwrap();
        assert_eq!(updated.get("value"), Some(&Value::I64(15)));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = apply(
            &doc! {},
            &UpdateSpec::from(doc! { "$explode": { a: 1 } }),
        )
        .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidUpdateOperator);
    }

    #[test]
    fn upsert_seed_takes_equality_fields() {
        let q = query! { name: "x", age: { "$eq": 30 }, score: { "$gt": 5 } };
        let seed = upsert_seed(&q).unwrap();
        assert_eq!(seed.get("name"), Some(&Value::from("x")));
        assert_eq!(seed.get("age"), Some(&Value::from(30)));
        assert!(seed.get("score").is_none());
    }
}
