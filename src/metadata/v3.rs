//! V3 metadata, the pre-release "core protocol 3.0" layout.
//!
//! A hierarchy has a `zarr.json` entry point.
//! The metadata document of the node at path `/a/b` is `meta/root/a/b.array.json` or `meta/root/a/b.group.json`
//! (`meta/root.group.json` for the root group), and the chunks of an array are stored under `data/root/a/b/`.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{
    array::{
        chunk_key_encoding::ChunkKeySeparator, codec::CodecMetadata, ArrayError, FillValue,
        MemoryOrder, NativeDtype,
    },
    node::NodePath,
    storage::{StoreKey, StoreKeyError, StorePrefix, StorePrefixError},
};

use super::{validate_shape, ArrayAttributes, ArrayDefinition};

/// The key of the entry point document.
pub const ENTRY_POINT: &str = "zarr.json";

/// The V3 entry point document, `zarr.json`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct EntryPointMetadataV3 {
    /// The protocol.
    pub zarr_format: monostate::MustBe!("https://purl.org/zarr/spec/protocol/core/3.0"),
    /// The metadata encoding.
    pub metadata_encoding: monostate::MustBe!("https://purl.org/zarr/spec/protocol/core/3.0"),
    /// The suffix of metadata documents.
    pub metadata_key_suffix: monostate::MustBe!(".json"),
    /// Extensions. Must be empty.
    #[serde(default)]
    pub extensions: Vec<JsonValue>,
}

/// A regular chunk grid.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ChunkGridV3 {
    /// The chunk grid type. Must be `regular`.
    #[serde(rename = "type")]
    pub grid_type: monostate::MustBe!("regular"),
    /// The length of each dimension of a chunk.
    pub chunk_shape: Vec<u64>,
    /// The chunk key separator.
    #[serde(default = "chunk_key_separator_default_v3")]
    pub separator: ChunkKeySeparator,
}

const fn chunk_key_separator_default_v3() -> ChunkKeySeparator {
    ChunkKeySeparator::Slash
}

/// V3 array metadata, the `*.array.json` document.
///
/// An example `JSON` document:
/// ```json
/// {
///     "shape": [10000, 1000],
///     "data_type": "<f8",
///     "chunk_grid": {
///         "type": "regular",
///         "chunk_shape": [1000, 100],
///         "separator": "/"
///     },
///     "chunk_memory_layout": "C",
///     "fill_value": "NaN",
///     "compressor": {
///         "codec": "https://purl.org/zarr/spec/codec/gzip/1.0",
///         "configuration": {"level": 1}
///     },
///     "extensions": [],
///     "attributes": {"foo": 42}
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadataV3 {
    /// The length of each dimension of the array.
    pub shape: Vec<u64>,
    /// The native data type token.
    pub data_type: JsonValue,
    /// The chunk grid.
    pub chunk_grid: ChunkGridV3,
    /// The memory order of the elements of a chunk.
    pub chunk_memory_layout: MemoryOrder,
    /// The fill value.
    #[serde(default)]
    pub fill_value: JsonValue,
    /// The compressor, absent if the chunks are not compressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressor: Option<JsonValue>,
    /// Extensions.
    #[serde(default)]
    pub extensions: Vec<JsonValue>,
    /// The attributes.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
    /// Filters are not supported, their presence is an error.
    #[serde(default, skip_serializing)]
    pub filters: Option<JsonValue>,
}

/// V3 group metadata, the `*.group.json` document.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadataV3 {
    /// Extensions.
    #[serde(default)]
    pub extensions: Vec<JsonValue>,
    /// The attributes.
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

/// Check that every extension can be ignored.
fn validate_extensions(extensions: &[JsonValue]) -> Result<(), ArrayError> {
    match extensions.iter().find(|extension| {
        extension.get("must_understand").and_then(JsonValue::as_bool) != Some(false)
    }) {
        Some(extension) => Err(ArrayError::InvalidMetadata(format!(
            "unsupported extension {extension}"
        ))),
        None => Ok(()),
    }
}

impl EntryPointMetadataV3 {
    /// Check that every extension can be ignored.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidMetadata`] if an extension must be understood.
    pub fn validate(&self) -> Result<(), ArrayError> {
        validate_extensions(&self.extensions)
    }
}

impl ArrayMetadataV3 {
    /// Parse into an [`ArrayDefinition`].
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidMetadata`] if the metadata is structurally invalid, or
    /// [`ArrayError::UnsupportedType`] if the data type is not supported.
    pub fn to_definition(&self) -> Result<ArrayDefinition, ArrayError> {
        validate_shape(&self.shape, &self.chunk_grid.chunk_shape)?;
        validate_extensions(&self.extensions)?;
        if self.filters.as_ref().is_some_and(|filters| !filters.is_null()) {
            return Err(ArrayError::InvalidMetadata(
                "filters are not supported".to_string(),
            ));
        }
        let dtype = NativeDtype::parse_v3(&self.data_type)?;
        let fill_value = FillValue::from_json(&self.fill_value, &dtype)?;
        let compressor = self
            .compressor
            .as_ref()
            .filter(|compressor| !compressor.is_null())
            .map(CodecMetadata::from_v3_json)
            .transpose()
            .map_err(ArrayError::InvalidMetadata)?;
        Ok(ArrayDefinition {
            shape: self.shape.clone(),
            block_shape: self.chunk_grid.chunk_shape.clone(),
            dtype,
            dtype_json: self.data_type.clone(),
            fill_value,
            compressor,
            filters: Vec::new(),
            order: self.chunk_memory_layout,
            separator: self.chunk_grid.separator,
            attributes: ArrayAttributes::from_json(self.attributes.clone()),
        })
    }

    /// Serialise an [`ArrayDefinition`].
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidMetadata`] if the definition has filters.
    pub fn from_definition(definition: &ArrayDefinition) -> Result<Self, ArrayError> {
        if !definition.filters.is_empty() {
            return Err(ArrayError::InvalidMetadata(
                "filters are not supported".to_string(),
            ));
        }
        Ok(Self {
            shape: definition.shape.clone(),
            data_type: definition.dtype_json.clone(),
            chunk_grid: ChunkGridV3 {
                grid_type: monostate::MustBe!("regular"),
                chunk_shape: definition.block_shape.clone(),
                separator: definition.separator,
            },
            chunk_memory_layout: definition.order,
            fill_value: FillValue::to_json(definition.fill_value.as_ref(), &definition.dtype),
            compressor: definition
                .compressor
                .as_ref()
                .map(CodecMetadata::to_v3_json),
            extensions: Vec::new(),
            attributes: definition.attributes.to_json(),
            filters: None,
        })
    }
}

/// The key of the metadata document of the array at `path`.
///
/// # Errors
/// Returns [`StoreKeyError`] if the resulting key is invalid.
pub fn array_metadata_key(path: &NodePath) -> Result<StoreKey, StoreKeyError> {
    StoreKey::new(format!("meta/root{}.array.json", node_suffix(path)))
}

/// The key of the metadata document of the group at `path`.
///
/// # Errors
/// Returns [`StoreKeyError`] if the resulting key is invalid.
pub fn group_metadata_key(path: &NodePath) -> Result<StoreKey, StoreKeyError> {
    StoreKey::new(format!("meta/root{}.group.json", node_suffix(path)))
}

/// The prefix of the metadata documents of the children of the group at `path`, e.g. `meta/root/a/`.
///
/// # Errors
/// Returns [`StorePrefixError`] if the resulting prefix is invalid.
pub fn children_metadata_prefix(path: &NodePath) -> Result<StorePrefix, StorePrefixError> {
    StorePrefix::new(format!("meta/root{}/", node_suffix(path)))
}

/// The prefix of the chunks of the array at `path`, e.g. `data/root/a/b/`.
///
/// # Errors
/// Returns [`StorePrefixError`] if the resulting prefix is invalid.
pub fn chunk_prefix(path: &NodePath) -> Result<StorePrefix, StorePrefixError> {
    StorePrefix::new(format!("data/root{}/", node_suffix(path)))
}

fn node_suffix(path: &NodePath) -> &str {
    if path.is_root() {
        ""
    } else {
        path.as_str()
    }
}
