use crate::collection::Document;
use crate::common::{CURRENT_INDEX_VERSION, INDEX_NAME_SEPARATOR, SUPPORTED_INDEX_VERSIONS};
use std::fmt::{Display, Formatter};

/// Derives the canonical index name from its field list.
///
/// The name doubles as the index's keyspace name and as the handle accepted
/// by cursor hints, so it is always the comma-joined field list.
pub fn index_name(fields: &[String]) -> String {
    fields.join(INDEX_NAME_SEPARATOR)
}

/// Checks whether this build can read and write keys of the given version.
pub fn is_supported_version(version: u8) -> bool {
    SUPPORTED_INDEX_VERSIONS.contains(&version)
}

/// A persisted description of a compound index.
///
/// Definitions live in the collection's index catalog keyspace under their
/// name; the entries themselves live in a sibling keyspace per index. The
/// `version` selects the key encoding
/// ([key_codec](crate::index::key_codec)) and gates planner eligibility:
/// a definition written by a newer build than this one is left untouched
/// and never planned against.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct IndexDefinition {
    name: String,
    fields: Vec<String>,
    version: u8,
    #[serde(default)]
    options: Document,
}

impl IndexDefinition {
    pub fn new(fields: Vec<String>, version: u8) -> Self {
        IndexDefinition {
            name: index_name(&fields),
            fields,
            version,
            options: Document::new(),
        }
    }

    /// The index name, `fields.join(",")`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The indexed fields, most significant first.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The key-encoding version this index was built with.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Opaque creation options, preserved for forward compatibility.
    pub fn options(&self) -> &Document {
        &self.options
    }

    pub fn is_supported(&self) -> bool {
        is_supported_version(self.version)
    }

    /// Whether this definition is current, or would be superseded by a
    /// rebuild at [CURRENT_INDEX_VERSION].
    pub fn is_current(&self) -> bool {
        self.version >= CURRENT_INDEX_VERSION
    }
}

impl Display for IndexDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Index [{} v{}]", self.name, self.version)
    }
}
