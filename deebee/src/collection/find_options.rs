use crate::common::SortOrder;

/// A sort requirement: one field, ascending or descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

/// Options shaping a cursor's result stream.
///
/// Built through the [Cursor](crate::collection::Cursor) modifiers rather
/// than directly; each modifier clones the cursor with one option changed,
/// so a configured cursor can be kept and re-run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Maximum number of documents to yield; unbounded when `None`.
    pub limit: Option<usize>,
    /// Number of matching documents to pass over before yielding.
    pub skip: usize,
    /// Required result order. Sorting is only possible through an index.
    pub sort: Option<SortSpec>,
    /// Name of an index the planner must use.
    pub hint: Option<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        FindOptions::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some(SortSpec {
            field: field.to_string(),
            order,
        });
        self
    }

    pub fn with_hint(mut self, index_name: &str) -> Self {
        self.hint = Some(index_name.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_composes() {
        let options = FindOptions::new()
            .with_limit(10)
            .with_skip(5)
            .with_sort("age", SortOrder::Descending)
            .with_hint("age");

        assert_eq!(options.limit, Some(10));
        assert_eq!(options.skip, 5);
        assert_eq!(
            options.sort,
            Some(SortSpec {
                field: "age".to_string(),
                order: SortOrder::Descending,
            })
        );
        assert_eq!(options.hint.as_deref(), Some("age"));
    }
}
