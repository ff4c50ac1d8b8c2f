/// Specifies the direction for sorting documents.
///
/// Used with [`crate::collection::Cursor::sort`] to control result ordering.
/// Sorted iteration always runs over an index; a descending sort reverses the
/// index range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Sort from smallest to largest value.
    Ascending,
    /// Sort from largest to smallest value.
    Descending,
}

impl SortOrder {
    /// Whether an index range scan must run in reverse to honor this order.
    pub fn is_reverse(&self) -> bool {
        matches!(self, SortOrder::Descending)
    }
}
