use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Zarr V2 consolidated metadata, the `.zmetadata` document.
///
/// Aggregates every metadata document of a hierarchy keyed by its path relative to the root, e.g.
/// ```json
/// {
///     "zarr_consolidated_format": 1,
///     "metadata": {
///         ".zgroup": {"zarr_format": 2},
///         "array/.zarray": {"chunks": [10], "...": "..."},
///         "array/.zattrs": {"_ARRAY_DIMENSIONS": ["x"]}
///     }
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct ConsolidatedMetadata {
    /// The consolidated format version. Must be `1`.
    pub zarr_consolidated_format: monostate::MustBe!(1u64),
    /// The metadata documents keyed by their relative path.
    pub metadata: Map<String, JsonValue>,
}

impl ConsolidatedMetadata {
    /// Create empty consolidated metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the document at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.metadata.get(key)
    }

    /// Set the document at `key`.
    pub fn set(&mut self, key: &str, document: JsonValue) {
        self.metadata.insert(key.to_string(), document);
    }

    /// Remove the document at `key`.
    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.metadata.remove(key)
    }

    /// The names of the direct children of the node at the relative `prefix` (e.g. `""` or `group/`) with a document named `document`.
    #[must_use]
    pub fn children(&self, prefix: &str, document: &str) -> Vec<String> {
        self.metadata
            .keys()
            .filter_map(|key| {
                let child = key.strip_prefix(prefix)?.strip_suffix(document)?;
                let child = child.strip_suffix('/')?;
                (!child.is_empty() && !child.contains('/')).then(|| child.to_string())
            })
            .collect()
    }
}
