//! Zarr V2 metadata.
//!
//! An array is described by a `.zarray` document and an optional `.zattrs` document, a group by a `.zgroup` document
//! and an optional `.zattrs` document.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::array::{
    chunk_key_encoding::ChunkKeySeparator, codec::CodecMetadata, ArrayError, FillValue,
    MemoryOrder, NativeDtype,
};

use super::{validate_shape, ArrayAttributes, ArrayDefinition};

/// The name of a Zarr V2 array metadata document.
pub const ZARRAY: &str = ".zarray";
/// The name of a Zarr V2 group metadata document.
pub const ZGROUP: &str = ".zgroup";
/// The name of a Zarr V2 attributes document.
pub const ZATTRS: &str = ".zattrs";
/// The name of the Zarr V2 consolidated metadata document.
pub const ZMETADATA: &str = ".zmetadata";

/// Zarr V2 array metadata, the `.zarray` document.
///
/// An example `JSON` document for a Zarr V2 array:
/// ```json
/// {
///     "chunks": [
///         256,
///         256
///     ],
///     "compressor": {
///         "id": "zlib",
///         "level": 1
///     },
///     "dtype": "<f8",
///     "fill_value": "NaN",
///     "filters": null,
///     "order": "C",
///     "shape": [
///         1000,
///         1000
///     ],
///     "zarr_format": 2
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ArrayMetadataV2 {
    /// The length of each dimension of a chunk.
    pub chunks: Vec<u64>,
    /// The compressor, or null if the chunks are not compressed.
    #[serde(default)]
    pub compressor: Option<JsonValue>,
    /// The native data type, a token such as `<f8` or a list of `[name, dtype]` fields.
    pub dtype: JsonValue,
    /// The fill value.
    #[serde(default)]
    pub fill_value: JsonValue,
    /// The filters, or null if there are none.
    #[serde(default)]
    pub filters: Option<Vec<JsonValue>>,
    /// The memory order of the elements of a chunk.
    pub order: MemoryOrder,
    /// The length of each dimension of the array.
    pub shape: Vec<u64>,
    /// The storage specification version. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
    /// The chunk key separator.
    #[serde(
        default = "chunk_key_separator_default_zarr_v2",
        skip_serializing_if = "is_default_separator"
    )]
    pub dimension_separator: ChunkKeySeparator,
    /// The NCZarr array extension, e.g. `{"dimrefs": ["/y", "/x"], "storage": "chunked"}`.
    #[serde(
        rename = "_NCZARR_ARRAY",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub nczarr_array: Option<JsonValue>,
}

const fn chunk_key_separator_default_zarr_v2() -> ChunkKeySeparator {
    ChunkKeySeparator::Dot
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_default_separator(separator: &ChunkKeySeparator) -> bool {
    *separator == ChunkKeySeparator::Dot
}

impl ArrayMetadataV2 {
    /// Parse into an [`ArrayDefinition`] with the attributes of the `.zattrs` document.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidMetadata`] if the metadata is structurally invalid, or
    /// [`ArrayError::UnsupportedType`] if the data type is not supported.
    pub fn to_definition(
        &self,
        attributes: Map<String, JsonValue>,
    ) -> Result<ArrayDefinition, ArrayError> {
        validate_shape(&self.shape, &self.chunks)?;
        let mut attributes = ArrayAttributes::from_json(attributes);
        if attributes.dimension_names.is_none() {
            attributes.dimension_refs = self.nczarr_dimension_refs();
        }
        let dtype = NativeDtype::parse_v2(&self.dtype)?;
        let fill_value = FillValue::from_json(&self.fill_value, &dtype)?;
        let compressor = self
            .compressor
            .as_ref()
            .map(CodecMetadata::from_v2_json)
            .transpose()
            .map_err(ArrayError::InvalidMetadata)?;
        let filters = self
            .filters
            .iter()
            .flatten()
            .map(CodecMetadata::from_v2_json)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ArrayError::InvalidMetadata)?;
        Ok(ArrayDefinition {
            shape: self.shape.clone(),
            block_shape: self.chunks.clone(),
            dtype,
            dtype_json: self.dtype.clone(),
            fill_value,
            compressor,
            filters,
            order: self.order,
            separator: self.dimension_separator,
            attributes,
        })
    }

    /// The dimension full names of the NCZarr extension, if every one is a string.
    fn nczarr_dimension_refs(&self) -> Option<Vec<String>> {
        self.nczarr_array
            .as_ref()?
            .get("dimrefs")?
            .as_array()?
            .iter()
            .map(|dimref| dimref.as_str().map(str::to_string))
            .collect()
    }

    /// Serialise an [`ArrayDefinition`] to a `.zarray` and a `.zattrs` document.
    #[must_use]
    pub fn from_definition(definition: &ArrayDefinition) -> (Self, Map<String, JsonValue>) {
        let filters: Vec<JsonValue> = definition
            .filters
            .iter()
            .map(CodecMetadata::to_v2_json)
            .collect();
        let metadata = Self {
            chunks: definition.block_shape.clone(),
            compressor: definition.compressor.as_ref().map(CodecMetadata::to_v2_json),
            dtype: definition.dtype_json.clone(),
            fill_value: FillValue::to_json(definition.fill_value.as_ref(), &definition.dtype),
            filters: (!filters.is_empty()).then_some(filters),
            order: definition.order,
            shape: definition.shape.clone(),
            zarr_format: monostate::MustBe!(2u64),
            dimension_separator: definition.separator,
            nczarr_array: None,
        };
        (metadata, definition.attributes.to_json())
    }
}

/// Zarr V2 group metadata, the `.zgroup` document.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Default, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct GroupMetadataV2 {
    /// The storage specification version. Must be `2`.
    pub zarr_format: monostate::MustBe!(2u64),
}

#[cfg(test)]
mod tests {
    use crate::array::{DataType, NumericType, Value};

    use super::*;

    #[test]
    fn array_metadata_v2() {
        let json = r#"{
            "chunks": [2, 3],
            "compressor": {"id": "zlib", "level": 1},
            "dtype": ">i2",
            "fill_value": 3,
            "filters": null,
            "order": "F",
            "shape": [4, 5],
            "zarr_format": 2,
            "dimension_separator": "/"
        }"#;
        let metadata: ArrayMetadataV2 = serde_json::from_str(json).unwrap();
        let mut zattrs = Map::new();
        zattrs.insert("_ARRAY_DIMENSIONS".to_string(), serde_json::json!(["y", "x"]));
        zattrs.insert("title".to_string(), serde_json::json!("test"));
        let definition = metadata.to_definition(zattrs).unwrap();
        assert_eq!(definition.shape, vec![4, 5]);
        assert_eq!(definition.block_shape, vec![2, 3]);
        assert_eq!(
            definition.dtype.data_type(),
            &DataType::Numeric(NumericType::Int16)
        );
        assert_eq!(
            definition.fill_value.as_ref().map(FillValue::value),
            Some(&Value::from(crate::array::Number::Int16(3)))
        );
        assert_eq!(definition.compressor.as_ref().map(CodecMetadata::id), Some("zlib"));
        assert!(definition.filters.is_empty());
        assert_eq!(definition.order, MemoryOrder::F);
        assert_eq!(definition.separator, ChunkKeySeparator::Slash);
        assert_eq!(
            definition.attributes.dimension_names,
            Some(vec!["y".to_string(), "x".to_string()])
        );

        let (round_trip, zattrs) = ArrayMetadataV2::from_definition(&definition);
        assert_eq!(round_trip, metadata);
        assert_eq!(zattrs.len(), 2);
    }

    #[test]
    fn array_metadata_v2_serialised() {
        let json = r#"{"chunks":[10],"compressor":null,"dtype":"<f4","fill_value":"NaN","filters":null,"order":"C","shape":[100],"zarr_format":2}"#;
        let metadata: ArrayMetadataV2 = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.dimension_separator, ChunkKeySeparator::Dot);
        assert_eq!(metadata.to_string(), json);
        let definition = metadata.to_definition(Map::new()).unwrap();
        assert!(definition
            .fill_value
            .as_ref()
            .and_then(FillValue::as_f64)
            .is_some_and(f64::is_nan));
    }

    #[test]
    fn array_metadata_v2_invalid() {
        let base = serde_json::json!({
            "chunks": [10],
            "compressor": null,
            "dtype": "<f4",
            "fill_value": null,
            "filters": null,
            "order": "C",
            "shape": [100],
            "zarr_format": 2
        });
        let with = |key: &str, value: JsonValue| {
            let mut json = base.clone();
            json[key] = value;
            serde_json::from_value::<ArrayMetadataV2>(json)
                .map_err(|err| ArrayError::InvalidMetadata(err.to_string()))
                .and_then(|metadata| metadata.to_definition(Map::new()))
        };
        assert!(with("chunks", serde_json::json!([10])).is_ok());
        assert!(matches!(
            with("chunks", serde_json::json!([10, 10])),
            Err(ArrayError::InvalidMetadata(_))
        ));
        assert!(matches!(
            with("chunks", serde_json::json!([0])),
            Err(ArrayError::InvalidMetadata(_))
        ));
        assert!(matches!(
            with("dtype", serde_json::json!("<x4")),
            Err(ArrayError::UnsupportedType(_))
        ));
        assert!(matches!(
            with("fill_value", serde_json::json!("abc")),
            Err(ArrayError::InvalidMetadata(_))
        ));
        assert!(matches!(
            with("order", serde_json::json!("K")),
            Err(ArrayError::InvalidMetadata(_))
        ));
        assert!(matches!(
            with("zarr_format", serde_json::json!(3)),
            Err(ArrayError::InvalidMetadata(_))
        ));
        assert!(matches!(
            with("compressor", serde_json::json!({"level": 1})),
            Err(ArrayError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn group_metadata_v2() {
        let metadata: GroupMetadataV2 = serde_json::from_str(r#"{"zarr_format":2}"#).unwrap();
        assert_eq!(metadata.to_string(), r#"{"zarr_format":2}"#);
        assert!(serde_json::from_str::<GroupMetadataV2>(r#"{"zarr_format":3}"#).is_err());
    }
}
