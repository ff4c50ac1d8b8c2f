//! Query representation, predicate matching, and index-aware planning.

pub mod matcher;
pub mod planner;
#[allow(clippy::module_inception)]
pub mod query;

pub use planner::{plan, RangePlan};
pub use query::Query;
