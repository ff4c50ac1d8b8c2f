use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::errors::DeebeeResult;

/// Expands array-valued indexed fields into one partial document per
/// combination of elements.
///
/// Indexing a document under a compound index requires one index entry per
/// element when a field holds an array (a "multikey" index). With several
/// array fields the entries form the cross product of their elements. This
/// function performs that expansion on a partial document carrying only the
/// indexed fields plus `_id`:
///
/// * no indexed field is an array: one document, unchanged
/// * `{ tags: ["a", "b"] }` over `["tags"]`: two documents, one per tag
/// * `{ a: [1, 2], b: ["x", "y"] }` over `["a", "b"]`: four documents
/// * an empty array yields no documents at all, so the document simply has
///   no entries in that index
///
/// Nested arrays expand recursively, element by element.
pub fn flatten(doc: &Document, fields: &[String]) -> DeebeeResult<Vec<Document>> {
    let mut partial = Document::new();
    for field in fields {
        if let Some(value) = doc.get(field) {
            partial.put(field, value.clone())?;
        }
    }
    if let Some(id) = doc.get(DOC_ID) {
        partial.put(DOC_ID, id.clone())?;
    }

    let mut out = Vec::new();
    flatten_into(partial, fields, &mut out)?;
    Ok(out)
}

fn flatten_into(doc: Document, fields: &[String], out: &mut Vec<Document>) -> DeebeeResult<()> {
    for field in fields {
        if let Some(Value::Array(elements)) = doc.get(field) {
            let elements = elements.clone();
            for element in elements {
                let mut copy = doc.clone();
                copy.put(field, element)?;
                flatten_into(copy, fields, out)?;
            }
            return Ok(());
        }
    }
    out.push(doc);
    Ok(())
}
