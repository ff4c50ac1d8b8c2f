// doc constants
pub const DOC_ID: &str = "_id";

// collection keyspace names
pub const DOC_KEYSPACE: &str = "doc";
pub const INDEX_CATALOG_KEYSPACE: &str = "idxs";
pub const INDEX_DATA_KEYSPACE: &str = "idx";

// index constants
pub const INDEX_NAME_SEPARATOR: &str = ",";

/// Index key encoding versions understood by this build. The planner only
/// considers indexes whose persisted version appears here.
pub const SUPPORTED_INDEX_VERSIONS: [u8; 2] = [LEGACY_INDEX_VERSION, CURRENT_INDEX_VERSION];
pub const LEGACY_INDEX_VERSION: u8 = 1;
pub const CURRENT_INDEX_VERSION: u8 = 2;

pub const DEEBEE_VERSION: &str = env!("CARGO_PKG_VERSION");
