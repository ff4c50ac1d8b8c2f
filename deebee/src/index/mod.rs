//! Compound secondary indexes: key encoding, array flattening, and the
//! per-collection index catalog.

pub mod definition;
pub mod flatten;
pub mod key_codec;
pub mod manager;

pub use definition::{index_name, is_supported_version, IndexDefinition};
pub use flatten::flatten;
pub use manager::{CreateIndexOptions, IndexManager};
