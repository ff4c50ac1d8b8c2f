pub mod codec;
pub mod constants;
pub mod sort_order;
pub mod type_utils;
pub mod value;

pub use codec::{deserialize_document, deserialize_meta, serialize_document, serialize_meta};
pub use constants::*;
pub use sort_order::SortOrder;
pub use type_utils::{atomic, Atomic, ReadExecutor, WriteExecutor};
pub use value::Value;
