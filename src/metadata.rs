//! Metadata documents.
//!
//! Two on-disk dialects describe the same logical array model:
//!  - [Zarr V2](v2): `.zarray`, `.zattrs` and `.zgroup` documents next to the chunks, optionally aggregated in a
//!    [consolidated](ConsolidatedMetadata) `.zmetadata` document,
//!  - [V3](v3) (the pre-release "core protocol 3.0" layout): a `zarr.json` entry point, documents under `meta/root`
//!    and chunks under `data/root`.
//!
//! Both are parsed into and serialised from an [`ArrayDefinition`].

mod attributes;
mod consolidated;
pub mod v2;
pub mod v3;

pub use attributes::{ArrayAttributes, SpatialReference};
pub use consolidated::ConsolidatedMetadata;

use serde_json::Value as JsonValue;

use crate::{
    array::{
        chunk_key_encoding::ChunkKeySeparator, codec::CodecMetadata, ArrayError, FillValue,
        MemoryOrder, NativeDtype,
    },
    node::NodePath,
    storage::StorePrefix,
};

/// The dialect independent definition of an array.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDefinition {
    /// The number of elements along each dimension.
    pub shape: Vec<u64>,
    /// The number of elements along each dimension of a chunk.
    pub block_shape: Vec<u64>,
    /// The native data type and its logical counterpart.
    pub dtype: NativeDtype,
    /// The native data type as written in the metadata document.
    pub dtype_json: JsonValue,
    /// The fill value.
    pub fill_value: Option<FillValue>,
    /// The compressor.
    pub compressor: Option<CodecMetadata>,
    /// The filters, in encoding order.
    pub filters: Vec<CodecMetadata>,
    /// The memory order of the chunks.
    pub order: MemoryOrder,
    /// The chunk key separator.
    pub separator: ChunkKeySeparator,
    /// The attributes.
    pub attributes: ArrayAttributes,
}

/// Check the shape and chunk shape of an array.
///
/// # Errors
/// Returns [`ArrayError::InvalidMetadata`] if the dimensionalities differ or an entry is zero.
pub(crate) fn validate_shape(shape: &[u64], block_shape: &[u64]) -> Result<(), ArrayError> {
    if shape.len() != block_shape.len() {
        return Err(ArrayError::InvalidMetadata(format!(
            "shape {shape:?} and chunk shape {block_shape:?} have different dimensionalities"
        )));
    }
    if shape.contains(&0) {
        return Err(ArrayError::InvalidMetadata(format!(
            "shape {shape:?} has a zero sized dimension"
        )));
    }
    if block_shape.contains(&0) {
        return Err(ArrayError::InvalidMetadata(format!(
            "chunk shape {block_shape:?} has a zero sized dimension"
        )));
    }
    Ok(())
}

/// The store prefix of a node in a Zarr V2 hierarchy, e.g. `group/array/`.
#[must_use]
pub(crate) fn node_prefix(path: &NodePath) -> StorePrefix {
    if path.is_root() {
        StorePrefix::root()
    } else {
        StorePrefix::from_validated(&format!("{}/", path.relative()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_validation() {
        assert!(validate_shape(&[10, 20], &[5, 5]).is_ok());
        assert!(validate_shape(&[], &[]).is_ok());
        assert!(matches!(
            validate_shape(&[10, 20], &[5]),
            Err(ArrayError::InvalidMetadata(_))
        ));
        assert!(matches!(
            validate_shape(&[10, 0], &[5, 5]),
            Err(ArrayError::InvalidMetadata(_))
        ));
        assert!(matches!(
            validate_shape(&[10, 20], &[5, 0]),
            Err(ArrayError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn node_prefixes() {
        assert_eq!(node_prefix(&NodePath::root()).as_str(), "");
        assert_eq!(
            node_prefix(&NodePath::new("/group/array").unwrap()).as_str(),
            "group/array/"
        );
    }
}
