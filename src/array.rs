//! Chunked N-dimensional arrays.
//!
//! An array is a node in a hierarchy holding an N-dimensional grid of elements split into equally sized chunks.
//! Each chunk is encoded independently (native element encoding, memory order, then the codec pipeline) and stored
//! as a single value in a store. A chunk absent from the store has every element equal to the fill value.
//!
//! Use [`Group::create_array`](crate::group::Group::create_array) with an [`ArrayBuilder`] to create a new array,
//! or [`Group::open_array`](crate::group::Group::open_array) to open an existing one.
//! The documentation for [`Array`] details how to interact with arrays.

mod array_builder;
mod array_errors;
pub mod chunk_key_encoding;
pub mod codec;
pub mod data_type;
mod element;
mod fill_value;
mod strided;
mod tile_cache;
mod transpose;
mod value;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};

pub use self::{
    array_builder::ArrayBuilder,
    array_errors::{ArrayError, ErrorSink, LogErrorSink},
    chunk_key_encoding::{ChunkKeyEncoding, ChunkKeySeparator},
    codec::{CodecMetadata, CodecPipeline, CodecRegistry},
    data_type::{
        CompoundComponent, CompoundType, DataType, NativeDtype, NumericType, StringFormat,
        UnsupportedDataTypeError,
    },
    element::Element,
    fill_value::FillValue,
    transpose::MemoryOrder,
    value::{Number, Value},
};
pub use crate::metadata::{ArrayAttributes, ArrayDefinition, SpatialReference};

use crate::{
    group::{Dimension, Group, Hierarchy, ZarrVersion},
    metadata::{
        node_prefix,
        v2::{ArrayMetadataV2, ZARRAY, ZATTRS},
        v3::{self, ArrayMetadataV3},
    },
    node::NodePath,
};

use self::tile_cache::{TileCache, TileLayout};

/// Check the value of an attribute with `dimensions`.
///
/// Attributes are scalars (no dimensions) or one-dimensional JSON arrays.
///
/// # Errors
/// Returns [`ArrayError::UnsupportedRank`] if there are 2 or more dimensions, or [`ArrayError::IncompatibleElementType`] if
/// `value` is not a scalar for 0 dimensions or a JSON array of `dimensions[0]` values for 1 dimension.
pub(crate) fn check_attribute(dimensions: &[u64], value: &JsonValue) -> Result<(), ArrayError> {
    match dimensions {
        [] if value.is_array() => Err(ArrayError::IncompatibleElementType(
            "a scalar attribute cannot be a JSON array".to_string(),
        )),
        [] => Ok(()),
        [length] => match value.as_array() {
            Some(values) if values.len() as u64 == *length => Ok(()),
            _ => Err(ArrayError::IncompatibleElementType(format!(
                "a one-dimensional attribute must be a JSON array of {length} values"
            ))),
        },
        _ => Err(ArrayError::UnsupportedRank(dimensions.len())),
    }
}

/// The strides of a C-contiguous buffer holding a region of `count` elements.
fn c_strides(count: &[usize]) -> Vec<isize> {
    let mut strides = vec![1isize; count.len()];
    for dim in (0..count.len().saturating_sub(1)).rev() {
        strides[dim] = strides[dim + 1] * count[dim + 1].max(1) as isize;
    }
    strides
}

/// Give a `blosc` compressor the element size it shuffles by, which is not part of its metadata.
fn with_blosc_typesize(compressor: CodecMetadata, dtype: &NativeDtype) -> CodecMetadata {
    if compressor.id() != "blosc" || compressor.configuration().contains_key("typesize") {
        return compressor;
    }
    let mut configuration = compressor.configuration().clone();
    configuration.insert("typesize".to_string(), dtype.component_size().into());
    CodecMetadata::new(compressor.id(), configuration)
}

#[derive(Debug)]
struct ArrayState {
    shape: Vec<u64>,
    layout: TileLayout,
    cache: TileCache,
    dtype_json: JsonValue,
    attributes: ArrayAttributes,
    definition_modified: bool,
    attributes_modified: bool,
}

/// A chunked N-dimensional array.
///
/// ### Metadata
///
/// An array is defined by
///  - its **dimensions**: the shared, named [`Dimension`]s giving the length of each axis,
///  - its **data type**: the logical [`DataType`] of its elements and their native encoding ([`NativeDtype`]),
///  - its **block size**: the shape of a chunk,
///  - its **fill value**: the value of the elements of absent chunks, also known as the no data value,
///  - its **codecs**: an optional compressor and a list of filters,
///  - its **order**: whether the elements of a chunk are stored in `C` (row-major) or `F` (column-major) order,
///
/// and by its attributes, some of which have a dedicated accessor: the unit, offset, scale and spatial reference.
///
/// ### Reading and writing
///
/// [`read`](Array::read) and [`write`](Array::write) transfer an arbitrary strided region between the array and a caller buffer
/// of any [`Element`] type, converting each element as needed.
/// [`read_region`](Array::read_region) and [`write_region`](Array::write_region) are shortcuts for contiguous regions in C order.
///
/// An array decodes at most one chunk at a time. Modified chunks are written back when a different chunk is needed,
/// on [`flush`](Array::flush), and when the array is dropped. A chunk with every element equal to the fill value is
/// erased from the store rather than written.
///
/// ### Concurrency
///
/// Calls on an array are serialised by an internal lock. Separate arrays writing to the same chunks are not coordinated.
#[derive(Debug)]
pub struct Array {
    hierarchy: Arc<Hierarchy>,
    group: Weak<Group>,
    path: NodePath,
    dimensions: Vec<Arc<Dimension>>,
    state: Mutex<ArrayState>,
}

impl Array {
    pub(crate) fn new(
        hierarchy: Arc<Hierarchy>,
        group: Weak<Group>,
        path: NodePath,
        definition: ArrayDefinition,
        dimensions: Vec<Arc<Dimension>>,
    ) -> Result<Self, ArrayError> {
        let ArrayDefinition {
            shape,
            block_shape,
            dtype,
            dtype_json,
            fill_value,
            compressor,
            filters,
            order,
            separator,
            attributes,
        } = definition;
        if dimensions.len() != shape.len() {
            return Err(ArrayError::InvalidMetadata(format!(
                "{path} has {} dimensions and a shape of {shape:?}",
                dimensions.len()
            )));
        }
        let compressor = compressor.map(|compressor| with_blosc_typesize(compressor, &dtype));
        let pipeline =
            CodecPipeline::new(hierarchy.options().codec_registry(), compressor, filters)?;
        let key_encoding = match hierarchy.version() {
            ZarrVersion::V2 => ChunkKeyEncoding::new(node_prefix(&path), separator),
            ZarrVersion::V3 => {
                ChunkKeyEncoding::new_with_c_prefix(v3::chunk_prefix(&path)?, separator)
            }
        };
        let block_shape = block_shape
            .iter()
            .map(|&size| {
                usize::try_from(size).map_err(|_| {
                    ArrayError::InvalidMetadata(format!("chunk size {size} is too large"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let cache = TileCache::new(dtype.data_type());
        let layout = TileLayout {
            storage: hierarchy.storage().clone(),
            dtype,
            block_shape,
            order,
            pipeline,
            key_encoding,
            fill_value,
        };
        Ok(Self {
            hierarchy,
            group,
            path,
            dimensions,
            state: Mutex::new(ArrayState {
                shape,
                layout,
                cache,
                dtype_json,
                attributes,
                definition_modified: false,
                attributes_modified: false,
            }),
        })
    }

    /// The name of the array.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// The path of the array.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// The full name of the array, e.g. `/group/array`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.path.as_str()
    }

    /// The group of the array, if it is still alive.
    #[must_use]
    pub fn group(&self) -> Option<Arc<Group>> {
        self.group.upgrade()
    }

    /// The dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &[Arc<Dimension>] {
        &self.dimensions
    }

    /// The number of elements along each dimension.
    #[must_use]
    pub fn shape(&self) -> Vec<u64> {
        self.state.lock().shape.clone()
    }

    /// The total number of elements.
    #[must_use]
    pub fn total_element_count(&self) -> u64 {
        self.state.lock().shape.iter().product()
    }

    /// The logical data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.state.lock().layout.data_type().clone()
    }

    /// The native data type.
    #[must_use]
    pub fn native_data_type(&self) -> NativeDtype {
        self.state.lock().layout.dtype.clone()
    }

    /// The number of elements along each dimension of a chunk.
    #[must_use]
    pub fn block_size(&self) -> Vec<u64> {
        self.state
            .lock()
            .layout
            .block_shape
            .iter()
            .map(|&size| size as u64)
            .collect()
    }

    /// The memory order of the elements of a chunk.
    #[must_use]
    pub fn order(&self) -> MemoryOrder {
        self.state.lock().layout.order
    }

    /// The compressor.
    #[must_use]
    pub fn compressor(&self) -> Option<CodecMetadata> {
        self.state.lock().layout.pipeline.compressor().cloned()
    }

    /// The filters, in encoding order.
    #[must_use]
    pub fn filters(&self) -> Vec<CodecMetadata> {
        self.state.lock().layout.pipeline.filters().cloned().collect()
    }

    /// The chunk key separator.
    #[must_use]
    pub fn dimension_separator(&self) -> ChunkKeySeparator {
        self.state.lock().layout.key_encoding.separator()
    }

    /// The fill value, also known as the no data value.
    #[must_use]
    pub fn fill_value(&self) -> Option<FillValue> {
        self.state.lock().layout.fill_value.clone()
    }

    /// The logical bytes of the fill value, or [`None`] if there is no fill value or the data type contains strings.
    #[must_use]
    pub fn raw_fill_value(&self) -> Option<Vec<u8>> {
        self.state
            .lock()
            .layout
            .fill_value
            .as_ref()
            .and_then(FillValue::logical_bytes)
            .map(<[u8]>::to_vec)
    }

    /// The no data value, the logical value of the fill value.
    #[must_use]
    pub fn no_data_value(&self) -> Option<Value> {
        self.state
            .lock()
            .layout
            .fill_value
            .as_ref()
            .map(|fill_value| fill_value.value().clone())
    }

    /// Set or clear the no data value (the fill value).
    ///
    /// The current chunk is flushed with the previous fill value first.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable, [`ArrayError::IncompatibleElementType`] if `value` cannot be
    /// converted to the data type, or an [`ArrayError`] if the current chunk cannot be flushed.
    pub fn set_no_data_value(&self, value: Option<&Value>) -> Result<(), ArrayError> {
        self.hierarchy.check_updatable()?;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let fill_value = value
            .map(|value| FillValue::new(value, state.layout.data_type()))
            .transpose()?;
        state.cache.invalidate(&state.layout)?;
        state.layout.fill_value = fill_value;
        state.definition_modified = true;
        Ok(())
    }

    /// Grow the array to `new_shape`.
    ///
    /// The chunk grid is unchanged, so existing chunks keep their keys and the new elements read as the fill value.
    /// The dimensions of the array are resized with it, including for the other arrays sharing them.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable,
    /// or [`ArrayError::InvalidRegion`] if `new_shape` has the wrong length, shrinks a dimension,
    /// or gives different sizes to a dimension referenced more than once.
    pub fn resize(&self, new_shape: &[u64]) -> Result<(), ArrayError> {
        self.hierarchy.check_updatable()?;
        if new_shape.len() != self.dimensions.len() {
            return Err(ArrayError::InvalidRegion(format!(
                "{} has {} dimensions, not {}",
                self.path,
                self.dimensions.len(),
                new_shape.len()
            )));
        }
        for (i, (dimension, &size)) in self.dimensions.iter().zip(new_shape).enumerate() {
            if size < dimension.size() {
                return Err(ArrayError::InvalidRegion(format!(
                    "cannot shrink dimension {} from {} to {size}",
                    dimension.full_name(),
                    dimension.size()
                )));
            }
            let conflicting = self.dimensions[..i]
                .iter()
                .zip(new_shape)
                .any(|(other, &other_size)| Arc::ptr_eq(other, dimension) && other_size != size);
            if conflicting {
                return Err(ArrayError::InvalidRegion(format!(
                    "dimension {} is referenced several times with different sizes",
                    dimension.full_name()
                )));
            }
        }

        let mut state = self.state.lock();
        if state.shape == new_shape {
            return Ok(());
        }
        for (dimension, &size) in self.dimensions.iter().zip(new_shape) {
            dimension.set_size(size);
        }
        log::debug!("resizing {} from {:?} to {new_shape:?}", self.path, state.shape);
        state.shape = new_shape.to_vec();
        state.definition_modified = true;
        Ok(())
    }

    /// The unit.
    #[must_use]
    pub fn unit(&self) -> Option<String> {
        self.state.lock().attributes.unit.clone()
    }

    /// Set or clear the unit.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable.
    pub fn set_unit(&self, unit: Option<&str>) -> Result<(), ArrayError> {
        self.update_attributes(|attributes| attributes.unit = unit.map(str::to_string))
    }

    /// The offset of the values.
    #[must_use]
    pub fn offset(&self) -> Option<f64> {
        self.state.lock().attributes.offset
    }

    /// Set or clear the offset of the values.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable.
    pub fn set_offset(&self, offset: Option<f64>) -> Result<(), ArrayError> {
        self.update_attributes(|attributes| attributes.offset = offset)
    }

    /// The scale of the values.
    #[must_use]
    pub fn scale(&self) -> Option<f64> {
        self.state.lock().attributes.scale
    }

    /// Set or clear the scale of the values.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable.
    pub fn set_scale(&self, scale: Option<f64>) -> Result<(), ArrayError> {
        self.update_attributes(|attributes| attributes.scale = scale)
    }

    /// The spatial reference.
    #[must_use]
    pub fn spatial_ref(&self) -> Option<SpatialReference> {
        self.state.lock().attributes.spatial_ref.clone()
    }

    /// Set or clear the spatial reference.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable.
    pub fn set_spatial_ref(&self, spatial_ref: Option<SpatialReference>) -> Result<(), ArrayError> {
        self.update_attributes(|attributes| attributes.spatial_ref = spatial_ref)
    }

    fn update_attributes(
        &self,
        update: impl FnOnce(&mut ArrayAttributes),
    ) -> Result<(), ArrayError> {
        self.hierarchy.check_updatable()?;
        let mut state = self.state.lock();
        update(&mut state.attributes);
        state.attributes_modified = true;
        Ok(())
    }

    /// The user attributes, excluding those with a dedicated accessor and the dimension names.
    #[must_use]
    pub fn attributes(&self) -> Map<String, JsonValue> {
        self.state.lock().attributes.user.clone()
    }

    /// The user attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<JsonValue> {
        self.state.lock().attributes.user.get(name).cloned()
    }

    /// Create or replace the attribute `name`.
    ///
    /// An attribute has 0 dimensions (a scalar) or 1 dimension (a JSON array of `dimensions[0]` values).
    /// Attributes with a dedicated accessor, such as `units`, are updated too.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable, [`ArrayError::UnsupportedRank`] if there are 2 or more
    /// dimensions, or [`ArrayError::IncompatibleElementType`] if `value` does not match `dimensions`.
    pub fn create_attribute(
        &self,
        name: &str,
        dimensions: &[u64],
        value: JsonValue,
    ) -> Result<(), ArrayError> {
        self.hierarchy.check_updatable()?;
        check_attribute(dimensions, &value)?;
        let mut state = self.state.lock();
        let mut attributes = state.attributes.to_json();
        attributes.insert(name.to_string(), value);
        state.attributes = ArrayAttributes::from_json(attributes);
        state.attributes_modified = true;
        Ok(())
    }

    /// Delete the attribute `name`. Returns true if it existed.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable.
    pub fn delete_attribute(&self, name: &str) -> Result<bool, ArrayError> {
        self.hierarchy.check_updatable()?;
        let mut state = self.state.lock();
        let mut attributes = state.attributes.to_json();
        if attributes.remove(name).is_none() {
            return Ok(false);
        }
        state.attributes = ArrayAttributes::from_json(attributes);
        state.attributes_modified = true;
        Ok(true)
    }

    /// The arrays named by the space separated `coordinates` attribute, opened from the group of the array.
    ///
    /// Coordinate variables that cannot be opened are skipped with a warning.
    #[must_use]
    pub fn coordinate_variables(&self) -> Vec<Arc<Array>> {
        let Some(coordinates) = self
            .attribute("coordinates")
            .and_then(|coordinates| coordinates.as_str().map(str::to_string))
        else {
            return Vec::new();
        };
        let Some(group) = self.group.upgrade() else {
            log::warn!(
                "cannot resolve the coordinate variables of {}, its group has been dropped",
                self.path
            );
            return Vec::new();
        };
        coordinates
            .split_whitespace()
            .filter_map(|name| match group.open_array(name) {
                Ok(array) => Some(array),
                Err(err) => {
                    log::warn!("cannot open the coordinate variable {name} of {}: {err}", self.path);
                    None
                }
            })
            .collect()
    }

    /// Read a strided region into `buffer`.
    ///
    /// Along dimension `i`, the region holds the `count[i]` elements at `start[i] + k * step[i]`.
    /// A negative `step` walks the array backwards from `start`.
    /// Region element `k` is held in `buffer` at offset `sum(k[i] * buffer_stride[i])` from the lowest buffer offset of the region.
    ///
    /// A region with a zero `count` reads nothing.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidRegion`] if the region is not within the array, [`ArrayError::InvalidBufferSize`] if `buffer` is too small,
    /// [`ArrayError::IncompatibleElementType`] if an element cannot be converted to `T`, or an [`ArrayError`] if a chunk cannot be retrieved
    /// or decoded.
    pub fn read<T: Element>(
        &self,
        start: &[u64],
        count: &[usize],
        step: &[i64],
        buffer_stride: &[isize],
        buffer: &mut [T],
    ) -> Result<(), ArrayError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        strided::read(
            &state.layout,
            &mut state.cache,
            &state.shape,
            start,
            count,
            step,
            buffer_stride,
            buffer,
        )
    }

    /// Write a strided region from `buffer`.
    ///
    /// The region and its layout in `buffer` are as for [`read`](Array::read).
    /// Chunks written entirely are not retrieved from the store. Elements of a partially written chunk outside the region are preserved.
    ///
    /// # Errors
    /// Returns [`ArrayError::NotWritable`] if the hierarchy is not updatable, [`ArrayError::InvalidRegion`] if the region is not within the
    /// array, [`ArrayError::InvalidBufferSize`] if `buffer` is too small, [`ArrayError::IncompatibleElementType`] if an element cannot be
    /// converted to the data type, or an [`ArrayError`] if a chunk cannot be retrieved, decoded or flushed.
    pub fn write<T: Element>(
        &self,
        start: &[u64],
        count: &[usize],
        step: &[i64],
        buffer_stride: &[isize],
        buffer: &[T],
    ) -> Result<(), ArrayError> {
        self.hierarchy.check_updatable()?;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        strided::write(
            &state.layout,
            &mut state.cache,
            &state.shape,
            start,
            count,
            step,
            buffer_stride,
            buffer,
        )
    }

    /// Read the contiguous region of `count` elements at `start`, in C order.
    ///
    /// # Errors
    /// See [`read`](Array::read).
    pub fn read_region<T: Element>(
        &self,
        start: &[u64],
        count: &[usize],
    ) -> Result<Vec<T>, ArrayError> {
        let initial = T::from_value(&Value::zero(&self.data_type()))?;
        let mut elements = vec![initial; count.iter().product()];
        self.read(
            start,
            count,
            &vec![1; count.len()],
            &c_strides(count),
            &mut elements,
        )?;
        Ok(elements)
    }

    /// Write the contiguous region of `count` elements at `start` from `elements` in C order.
    ///
    /// # Errors
    /// See [`write`](Array::write).
    pub fn write_region<T: Element>(
        &self,
        start: &[u64],
        count: &[usize],
        elements: &[T],
    ) -> Result<(), ArrayError> {
        self.write(
            start,
            count,
            &vec![1; count.len()],
            &c_strides(count),
            elements,
        )
    }

    #[cfg(feature = "ndarray")]
    /// Read the contiguous region of `count` elements at `start` into an [`ndarray::ArrayD`].
    ///
    /// # Errors
    /// See [`read`](Array::read).
    pub fn read_ndarray<T: Element>(
        &self,
        start: &[u64],
        count: &[usize],
    ) -> Result<ndarray::ArrayD<T>, ArrayError> {
        let elements = self.read_region(start, count)?;
        ndarray::ArrayD::from_shape_vec(count.to_vec(), elements)
            .map_err(|err| ArrayError::InvalidRegion(err.to_string()))
    }

    #[cfg(feature = "ndarray")]
    /// Write an [`ndarray::ArrayViewD`] to the region at `start`.
    ///
    /// # Errors
    /// See [`write`](Array::write).
    pub fn write_ndarray<T: Element>(
        &self,
        start: &[u64],
        array: &ndarray::ArrayViewD<T>,
    ) -> Result<(), ArrayError> {
        let array = array.as_standard_layout();
        let elements = array.as_slice().ok_or_else(|| {
            ArrayError::InvalidRegion("the array is not contiguous".to_string())
        })?;
        self.write_region(start, array.shape(), elements)
    }

    fn definition(state: &ArrayState) -> ArrayDefinition {
        ArrayDefinition {
            shape: state.shape.clone(),
            block_shape: state
                .layout
                .block_shape
                .iter()
                .map(|&size| size as u64)
                .collect(),
            dtype: state.layout.dtype.clone(),
            dtype_json: state.dtype_json.clone(),
            fill_value: state.layout.fill_value.clone(),
            compressor: state.layout.pipeline.compressor().cloned(),
            filters: state.layout.pipeline.filters().cloned().collect(),
            order: state.layout.order,
            separator: state.layout.key_encoding.separator(),
            attributes: state.attributes.clone(),
        }
    }

    /// Write the metadata of a new array.
    pub(crate) fn store_metadata(&self) -> Result<(), ArrayError> {
        let mut state = self.state.lock();
        state.definition_modified = true;
        state.attributes_modified = !state.attributes.to_json().is_empty();
        self.flush_metadata(&mut state)
    }

    fn flush_metadata(&self, state: &mut ArrayState) -> Result<(), ArrayError> {
        if !state.definition_modified && !state.attributes_modified {
            return Ok(());
        }
        let definition = Self::definition(state);
        match self.hierarchy.version() {
            ZarrVersion::V2 => {
                let (zarray, zattrs) = ArrayMetadataV2::from_definition(&definition);
                let prefix = node_prefix(&self.path);
                if state.definition_modified {
                    let zarray = serde_json::to_value(zarray)
                        .map_err(|err| ArrayError::InvalidMetadata(err.to_string()))?;
                    self.hierarchy.write_json(&prefix.key(ZARRAY)?, zarray)?;
                    state.definition_modified = false;
                }
                if state.attributes_modified {
                    self.hierarchy
                        .write_json(&prefix.key(ZATTRS)?, JsonValue::Object(zattrs))?;
                    state.attributes_modified = false;
                }
            }
            ZarrVersion::V3 => {
                let metadata = serde_json::to_value(ArrayMetadataV3::from_definition(&definition)?)
                    .map_err(|err| ArrayError::InvalidMetadata(err.to_string()))?;
                self.hierarchy
                    .write_json(&v3::array_metadata_key(&self.path)?, metadata)?;
                state.definition_modified = false;
                state.attributes_modified = false;
            }
        }
        Ok(())
    }

    /// Write the current chunk if it has been modified, then the metadata if it has been modified.
    ///
    /// Flushing an unmodified array does not touch the store.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the chunk cannot be encoded or a store operation fails.
    pub fn flush(&self) -> Result<(), ArrayError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.cache.flush(&state.layout)?;
        self.flush_metadata(state)
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            self.hierarchy.options().error_sink().report(&err);
        }
    }
}
