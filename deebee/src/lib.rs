//! DeeBee is an embedded document database layered over an ordered,
//! append-only key-value substrate.
//!
//! Documents live in named [collections](collection::Collection), carry a
//! 12-byte [object id](collection::ObjectId) under `_id`, and are queried
//! with Mongo-style predicates (`$eq`, `$gt`, `$gte`, `$lt`, `$lte`,
//! `$in`, `$all`, `$exists`). Compound secondary indexes flatten array
//! fields into one entry per element, and an index-aware
//! [planner](query::planner) turns equality prefixes into range scans over
//! order-preserving [index keys](index::key_codec). Results stream through
//! pull-based [cursors](collection::Cursor) with skip, limit, index-backed
//! sort, and hints. Updates go through an operator engine (`$set`,
//! `$unset`, `$rename`, `$inc`, `$mul`, `$push`, `$addToSet`, `$pop`,
//! `$pull`) with optional upsert.
//!
//! Storage is pluggable through [`store::KvStore`]; an in-memory ordered
//! store ships by default, and replicated multi-writer backends reduce
//! their operation logs deterministically with [`store::merge`].
//!
//! # Quick start
//!
//! ```rust,ignore
//! use deebee::{doc, query, Database, SortOrder};
//!
//! let db = Database::in_memory();
//! let recipes = db.collection("recipes")?;
//!
//! recipes.insert(doc! {
//!     name: "pasta",
//!     ingredients: ["noodles", "tomatoes", "basil"],
//!     rating: 5,
//! })?;
//!
//! recipes.create_index(&["ingredients", "name"], &Default::default())?;
//!
//! let favorites = recipes
//!     .find(query! { ingredients: "basil", rating: { "$gte": 4 } })
//!     .sort("name", SortOrder::Ascending)
//!     .to_vec()?;
//! # Ok::<(), deebee::errors::DeebeeError>(())
//! ```

pub mod collection;
pub mod common;
pub mod db;
pub mod errors;
pub mod index;
pub mod query;
pub mod store;

pub use collection::{
    Collection, Cursor, DeleteResult, Document, ObjectId, UpdateOptions, UpdateSpec, UpdateResult,
};
pub use common::{SortOrder, Value};
pub use db::Database;
pub use errors::{DeebeeError, ErrorKind, DeebeeResult};
pub use index::{CreateIndexOptions, IndexDefinition};
pub use query::Query;
