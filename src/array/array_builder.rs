use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::{
    config::global_config,
    group::{Dimension, ZarrVersion},
    metadata::{validate_shape, ArrayAttributes, ArrayDefinition},
};

use super::{
    chunk_key_encoding::ChunkKeySeparator, codec::CodecMetadata, data_type::StringFormat,
    ArrayError, DataType, FillValue, MemoryOrder, NativeDtype, Value,
};

/// An [`Array`](super::Array) builder.
///
/// The array builder is initialised from the dimensions and data type of the array.
///  - The block shape defaults to the [default block size](crate::config::Config#default-block-size-limit) along the last two dimensions and `1` along the others.
///  - There is no compressor, no filters and no fill value, and chunks are stored in `C` order.
///  - The chunk key separator defaults to `.` for Zarr V2 and `/` for V3.
///  - String data types use the [default string format](crate::config::Config#default-string-format).
///
/// Use the methods in the array builder to change the configuration away from these defaults, and then create the array in a group with [`Group::create_array`](crate::group::Group::create_array).
/// The array metadata is written to the store when the array is created.
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    data_type: DataType,
    dimensions: Vec<Arc<Dimension>>,
    block_shape: Option<Vec<u64>>,
    fill_value: Option<Value>,
    compressor: Option<CodecMetadata>,
    filters: Vec<CodecMetadata>,
    order: MemoryOrder,
    dimension_separator: Option<ChunkKeySeparator>,
    string_format: Option<StringFormat>,
    attributes: Map<String, JsonValue>,
}

impl ArrayBuilder {
    /// Create a new array builder for an array with `dimensions` and `data_type`.
    ///
    /// An array with no dimensions holds a single element.
    #[must_use]
    pub fn new(dimensions: Vec<Arc<Dimension>>, data_type: DataType) -> Self {
        Self {
            data_type,
            dimensions,
            block_shape: None,
            fill_value: None,
            compressor: None,
            filters: Vec::new(),
            order: MemoryOrder::C,
            dimension_separator: None,
            string_format: None,
            attributes: Map::new(),
        }
    }

    /// Set the data type.
    pub fn data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = data_type;
        self
    }

    /// Set the block (chunk) shape.
    pub fn block_shape(&mut self, block_shape: Vec<u64>) -> &mut Self {
        self.block_shape = Some(block_shape);
        self
    }

    /// Set the fill value.
    pub fn fill_value(&mut self, fill_value: impl Into<Value>) -> &mut Self {
        self.fill_value = Some(fill_value.into());
        self
    }

    /// Set the compressor.
    pub fn compressor(&mut self, compressor: Option<CodecMetadata>) -> &mut Self {
        self.compressor = compressor;
        self
    }

    /// Set the filters, in encoding order.
    ///
    /// Filters are only supported by Zarr V2 arrays.
    pub fn filters(&mut self, filters: Vec<CodecMetadata>) -> &mut Self {
        self.filters = filters;
        self
    }

    /// Set the memory order of the elements of a chunk.
    pub fn order(&mut self, order: MemoryOrder) -> &mut Self {
        self.order = order;
        self
    }

    /// Set the chunk key separator.
    pub fn dimension_separator(&mut self, separator: ChunkKeySeparator) -> &mut Self {
        self.dimension_separator = Some(separator);
        self
    }

    /// Set the native encoding of fixed-length strings.
    pub fn string_format(&mut self, string_format: StringFormat) -> &mut Self {
        self.string_format = Some(string_format);
        self
    }

    /// Set the user attributes.
    pub fn attributes(&mut self, attributes: Map<String, JsonValue>) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// The dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &[Arc<Dimension>] {
        &self.dimensions
    }

    /// The default block shape of an array with `shape`.
    #[must_use]
    pub fn default_block_shape(shape: &[u64]) -> Vec<u64> {
        let limit = global_config().default_block_size_limit();
        let dimensionality = shape.len();
        shape
            .iter()
            .enumerate()
            .map(|(dim, &size)| {
                if dimensionality == 1 {
                    size.max(1)
                } else if dim + 2 >= dimensionality {
                    size.clamp(1, limit)
                } else {
                    1
                }
            })
            .collect()
    }

    pub(crate) fn build_definition(
        &self,
        version: ZarrVersion,
    ) -> Result<ArrayDefinition, ArrayError> {
        let shape: Vec<u64> = self.dimensions.iter().map(|dim| dim.size()).collect();
        let block_shape = self
            .block_shape
            .clone()
            .unwrap_or_else(|| Self::default_block_shape(&shape));
        validate_shape(&shape, &block_shape)?;

        let (dtype_json, dtype) = match version {
            ZarrVersion::V2 => {
                let string_format = self
                    .string_format
                    .unwrap_or_else(|| global_config().default_string_format());
                NativeDtype::build_v2(&self.data_type, string_format)?
            }
            ZarrVersion::V3 => {
                if !self.filters.is_empty() {
                    return Err(ArrayError::InvalidMetadata(
                        "filters are not supported by V3 arrays".to_string(),
                    ));
                }
                NativeDtype::build_v3(&self.data_type)?
            }
        };
        let filters = self
            .filters
            .iter()
            .map(|filter| complete_delta_filter(filter, &dtype_json))
            .collect::<Result<Vec<_>, _>>()?;
        let fill_value = self
            .fill_value
            .as_ref()
            .map(|fill_value| FillValue::new(fill_value, dtype.data_type()))
            .transpose()?;

        let mut attributes = ArrayAttributes::from_json(self.attributes.clone());
        if !self.dimensions.is_empty() {
            attributes.dimension_names = Some(
                self.dimensions
                    .iter()
                    .map(|dim| dim.name().to_string())
                    .collect(),
            );
        }

        Ok(ArrayDefinition {
            shape,
            block_shape,
            dtype,
            dtype_json,
            fill_value,
            compressor: self.compressor.clone(),
            filters,
            order: self.order,
            separator: self.dimension_separator.unwrap_or(match version {
                ZarrVersion::V2 => ChunkKeySeparator::Dot,
                ZarrVersion::V3 => ChunkKeySeparator::Slash,
            }),
            attributes,
        })
    }
}

/// Set the `dtype` of a `delta` filter without one to the native type of the elements, or of their parts for complex numbers.
fn complete_delta_filter(
    filter: &CodecMetadata,
    dtype_json: &JsonValue,
) -> Result<CodecMetadata, ArrayError> {
    if filter.id() != "delta" || filter.configuration().contains_key("dtype") {
        return Ok(filter.clone());
    }
    let token = dtype_json.as_str().unwrap_or_default();
    let delta_dtype = match (token.get(..1), token.get(1..2), token.get(2..)) {
        (Some(endianness), Some("c"), Some(size)) => size
            .parse::<usize>()
            .ok()
            .map(|size| format!("{endianness}f{}", size / 2)),
        (Some(_), Some("i" | "u" | "f"), Some(_)) => Some(token.to_string()),
        _ => None,
    }
    .ok_or_else(|| {
        ArrayError::InvalidMetadata(format!(
            "the delta filter needs a dtype for elements of type {dtype_json}"
        ))
    })?;
    let mut configuration = filter.configuration().clone();
    configuration.insert("dtype".to_string(), delta_dtype.into());
    Ok(CodecMetadata::new(filter.id(), configuration))
}

#[cfg(test)]
mod tests {
    use crate::array::NumericType;

    use super::*;

    fn dimension(name: &str, size: u64) -> Arc<Dimension> {
        Arc::new(Dimension::new(name, &format!("/{name}"), size, None, None))
    }

    #[test]
    fn array_builder_default_block_shape() {
        assert_eq!(ArrayBuilder::default_block_shape(&[]), Vec::<u64>::new());
        assert_eq!(ArrayBuilder::default_block_shape(&[1000]), vec![1000]);
        assert_eq!(ArrayBuilder::default_block_shape(&[100, 1000]), vec![100, 256]);
        assert_eq!(
            ArrayBuilder::default_block_shape(&[5, 1000, 10]),
            vec![1, 256, 10]
        );
    }

    #[test]
    fn array_builder_definition() {
        let mut builder = ArrayBuilder::new(
            vec![dimension("y", 10), dimension("x", 20)],
            DataType::Numeric(NumericType::Float32),
        );
        builder.block_shape(vec![5, 5]).fill_value(-1.0);
        let definition = builder.build_definition(ZarrVersion::V2).unwrap();
        assert_eq!(definition.shape, vec![10, 20]);
        assert_eq!(definition.dtype_json, serde_json::json!("<f4"));
        assert_eq!(definition.separator, ChunkKeySeparator::Dot);
        assert_eq!(
            definition.fill_value.as_ref().and_then(FillValue::as_f64),
            Some(-1.0)
        );
        assert_eq!(
            definition.attributes.dimension_names,
            Some(vec!["y".to_string(), "x".to_string()])
        );
        let definition = builder.build_definition(ZarrVersion::V3).unwrap();
        assert_eq!(definition.separator, ChunkKeySeparator::Slash);

        builder.filters(vec![CodecMetadata::new("zlib", Map::new())]);
        assert!(builder.build_definition(ZarrVersion::V2).is_ok());
        assert!(matches!(
            builder.build_definition(ZarrVersion::V3),
            Err(ArrayError::InvalidMetadata(_))
        ));

        builder.block_shape(vec![5, 0]);
        assert!(matches!(
            builder.build_definition(ZarrVersion::V2),
            Err(ArrayError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn array_builder_delta_dtype() {
        let delta = CodecMetadata::new("delta", Map::new());
        let mut builder = ArrayBuilder::new(
            vec![dimension("x", 10)],
            DataType::Numeric(NumericType::Complex64),
        );
        builder.filters(vec![delta]);
        let definition = builder.build_definition(ZarrVersion::V2).unwrap();
        assert_eq!(
            definition.filters[0].configuration().get("dtype"),
            Some(&serde_json::json!("<f4"))
        );

        builder.data_type(DataType::Numeric(NumericType::UInt16));
        let definition = builder.build_definition(ZarrVersion::V2).unwrap();
        assert_eq!(
            definition.filters[0].configuration().get("dtype"),
            Some(&serde_json::json!("<u2"))
        );

        builder.data_type(DataType::String {
            max_length: Some(4),
        });
        assert!(matches!(
            builder.build_definition(ZarrVersion::V2),
            Err(ArrayError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn array_builder_unsupported_type() {
        let builder = ArrayBuilder::new(
            vec![dimension("x", 10)],
            DataType::String { max_length: None },
        );
        assert!(matches!(
            builder.build_definition(ZarrVersion::V2),
            Err(ArrayError::UnsupportedType(_))
        ));
        let builder = ArrayBuilder::new(
            vec![dimension("x", 10)],
            DataType::Numeric(NumericType::Complex64),
        );
        assert!(builder.build_definition(ZarrVersion::V2).is_ok());
        assert!(matches!(
            builder.build_definition(ZarrVersion::V3),
            Err(ArrayError::UnsupportedType(_))
        ));
    }
}
