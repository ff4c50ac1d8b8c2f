//! Collections of documents: ids, the document model, cursors, and write
//! operations.

#[allow(clippy::module_inception)]
pub mod collection;
pub mod cursor;
pub mod document;
pub mod find_options;
pub mod object_id;
pub mod update;
pub mod write_result;

pub use collection::Collection;
pub use cursor::{Cursor, DocumentStream};
pub use document::{normalize, Document};
pub use find_options::{FindOptions, SortSpec};
pub use object_id::{ObjectId, OBJECT_ID_LEN};
pub use update::{UpdateOptions, UpdateSpec};
pub use write_result::{DeleteResult, UpdateResult};
