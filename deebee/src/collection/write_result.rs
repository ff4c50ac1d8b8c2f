use std::fmt::{Display, Formatter};

/// The outcome of an update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents the query matched.
    pub n_matched: usize,
    /// Documents rewritten. Every matched document is rewritten, so this
    /// equals `n_matched` outside the upsert path.
    pub n_modified: usize,
    /// Documents created through upsert (0 or 1).
    pub n_upserted: usize,
}

impl Display for UpdateResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UpdateResult [matched: {}, modified: {}, upserted: {}]",
            self.n_matched, self.n_modified, self.n_upserted
        )
    }
}

/// The outcome of a delete operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Documents removed.
    pub n_deleted: usize,
}

impl Display for DeleteResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeleteResult [deleted: {}]", self.n_deleted)
    }
}
