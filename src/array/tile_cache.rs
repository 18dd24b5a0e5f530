//! The one-tile cache of an array.
//!
//! An array holds at most one decoded chunk (the current tile) in memory.
//! Loading a different chunk flushes the current tile first if it is dirty.
//! A chunk absent from storage is held as an *empty* tile: it is never decoded or allocated until it is written to.

use crate::storage::{ReadableWritableListableStorage, StoreKey};

use super::{
    chunk_key_encoding::{ChunkKeyEncoding, ChunkKeySeparator},
    codec::CodecPipeline,
    data_type::{
        decode_element, decode_element_value, encode_element, encode_element_value,
        ConversionWarnings, DataType, NativeDtype,
    },
    fill_value::FillValue,
    transpose::{transpose_c_to_f, transpose_f_to_c, MemoryOrder},
    value::Value,
    ArrayError,
};

/// Everything needed to address, decode and encode the chunks of an array.
pub(crate) struct TileLayout {
    pub(crate) storage: ReadableWritableListableStorage,
    pub(crate) dtype: NativeDtype,
    pub(crate) block_shape: Vec<usize>,
    pub(crate) order: MemoryOrder,
    pub(crate) pipeline: CodecPipeline,
    pub(crate) key_encoding: ChunkKeyEncoding,
    pub(crate) fill_value: Option<FillValue>,
}

impl std::fmt::Debug for TileLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLayout")
            .field("dtype", &self.dtype)
            .field("block_shape", &self.block_shape)
            .field("order", &self.order)
            .field("pipeline", &self.pipeline)
            .field("key_encoding", &self.key_encoding)
            .field("fill_value", &self.fill_value)
            .finish_non_exhaustive()
    }
}

impl TileLayout {
    pub(crate) fn data_type(&self) -> &DataType {
        self.dtype.data_type()
    }

    /// The number of elements in a tile.
    pub(crate) fn tile_num_elements(&self) -> usize {
        self.block_shape.iter().product()
    }

    /// The fill value, or zero if the array has no fill value.
    pub(crate) fn fill_or_zero(&self) -> Value {
        self.fill_value.as_ref().map_or_else(
            || Value::zero(self.data_type()),
            |fill_value| fill_value.value().clone(),
        )
    }

    fn fill_bytes_or_zero(&self) -> Vec<u8> {
        self.fill_value
            .as_ref()
            .and_then(FillValue::logical_bytes)
            .map_or_else(|| vec![0; self.data_type().size()], <[u8]>::to_vec)
    }

    /// The native encoding of one element equal to the fill value (or zero if there is no fill value).
    fn native_fill_or_zero(&self) -> Vec<u8> {
        let mut native = vec![0; self.dtype.native_size()];
        if let Some(fill_value) = &self.fill_value {
            encode_element_value(
                self.data_type(),
                self.dtype.elts(),
                fill_value.value(),
                &mut native,
                &mut ConversionWarnings::default(),
            );
        }
        native
    }

    pub(crate) fn chunk_key(&self, chunk_indices: &[u64]) -> Result<StoreKey, ArrayError> {
        Ok(self.key_encoding.key(chunk_indices)?)
    }
}

/// The decoded elements of a tile.
///
/// Data types without strings are held in their logical byte layout.
/// Data types with strings are held as one [`Value`] per element.
#[derive(Debug)]
pub(crate) enum TileBuffer {
    Fixed(Vec<u8>),
    Values(Vec<Value>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TileState {
    Unloaded,
    Clean,
    Dirty,
}

/// The current tile of an array and its scratch buffers.
#[derive(Debug)]
pub(crate) struct TileCache {
    state: TileState,
    chunk_indices: Vec<u64>,
    empty: bool,
    buffer: TileBuffer,
    raw: Vec<u8>,
    transposed: Vec<u8>,
    warnings: ConversionWarnings,
}

impl TileCache {
    pub(crate) fn new(data_type: &DataType) -> Self {
        Self {
            state: TileState::Unloaded,
            chunk_indices: Vec::new(),
            empty: true,
            buffer: if data_type.has_string() {
                TileBuffer::Values(Vec::new())
            } else {
                TileBuffer::Fixed(Vec::new())
            },
            raw: Vec::new(),
            transposed: Vec::new(),
            warnings: ConversionWarnings::default(),
        }
    }

    /// Returns true if the current tile is absent from storage and has not been written to.
    pub(crate) fn is_empty(&self) -> bool {
        self.empty
    }

    fn is_dirty(&self) -> bool {
        self.state == TileState::Dirty
    }

    pub(crate) fn buffer(&self) -> &TileBuffer {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut TileBuffer {
        &mut self.buffer
    }

    fn is_current(&self, chunk_indices: &[u64]) -> bool {
        self.state != TileState::Unloaded && self.chunk_indices == chunk_indices
    }

    /// Flush the current tile if dirty, then forget it.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub(crate) fn invalidate(&mut self, layout: &TileLayout) -> Result<(), ArrayError> {
        self.flush(layout)?;
        self.state = TileState::Unloaded;
        self.empty = true;
        Ok(())
    }

    /// Make the chunk at `chunk_indices` the current tile.
    ///
    /// # Errors
    /// Returns an error if flushing the previous tile, or retrieving or decoding the chunk fails.
    pub(crate) fn load(
        &mut self,
        layout: &TileLayout,
        chunk_indices: &[u64],
    ) -> Result<(), ArrayError> {
        if self.is_current(chunk_indices) {
            return Ok(());
        }
        self.flush(layout)?;

        let key = layout.chunk_key(chunk_indices)?;
        self.chunk_indices = chunk_indices.to_vec();
        self.state = TileState::Unloaded;
        match layout.storage.get(&key)? {
            Some(encoded) => {
                self.decode(layout, encoded, &key)?;
                self.empty = false;
            }
            None => {
                self.empty = true;
            }
        }
        self.state = TileState::Clean;
        Ok(())
    }

    /// Make the chunk at `chunk_indices` the current tile without retrieving it, initialised to the fill value.
    ///
    /// Used when a write covers the whole chunk.
    ///
    /// # Errors
    /// Returns an error if flushing the previous tile fails.
    pub(crate) fn load_overwritten(
        &mut self,
        layout: &TileLayout,
        chunk_indices: &[u64],
    ) -> Result<(), ArrayError> {
        if !self.is_current(chunk_indices) {
            self.flush(layout)?;
            self.chunk_indices = chunk_indices.to_vec();
            self.state = TileState::Clean;
            self.empty = true;
        }
        self.materialize(layout);
        Ok(())
    }

    /// Fill an empty tile with the fill value (or zero) so it can be written to.
    pub(crate) fn materialize(&mut self, layout: &TileLayout) {
        if !self.empty {
            return;
        }
        let num_elements = layout.tile_num_elements();
        match &mut self.buffer {
            TileBuffer::Fixed(bytes) => {
                let fill = layout.fill_bytes_or_zero();
                bytes.clear();
                if fill.iter().all(|&byte| byte == 0) {
                    bytes.resize(num_elements * fill.len(), 0);
                } else {
                    bytes.reserve(num_elements * fill.len());
                    for _ in 0..num_elements {
                        bytes.extend_from_slice(&fill);
                    }
                }
            }
            TileBuffer::Values(values) => {
                values.clear();
                values.resize(num_elements, layout.fill_or_zero());
            }
        }
        self.empty = false;
    }

    /// Mark the current tile as modified.
    pub(crate) fn mark_dirty(&mut self) {
        debug_assert!(!self.empty);
        if self.state != TileState::Unloaded {
            self.state = TileState::Dirty;
        }
    }

    fn decode(
        &mut self,
        layout: &TileLayout,
        encoded: Vec<u8>,
        key: &StoreKey,
    ) -> Result<(), ArrayError> {
        let num_elements = layout.tile_num_elements();
        let native_size = layout.dtype.native_size();
        let decoded = layout
            .pipeline
            .decode(encoded, num_elements * native_size, key)?;
        self.raw = decoded;

        if layout.order == MemoryOrder::F {
            self.transposed.resize(self.raw.len(), 0);
            transpose_f_to_c(
                &self.raw,
                &mut self.transposed,
                &layout.block_shape,
                native_size,
            );
            std::mem::swap(&mut self.raw, &mut self.transposed);
        }

        let elts = layout.dtype.elts();
        match &mut self.buffer {
            TileBuffer::Fixed(bytes) => {
                if layout.dtype.is_plain_copy() {
                    std::mem::swap(bytes, &mut self.raw);
                } else {
                    let logical_size = layout.data_type().size();
                    bytes.clear();
                    bytes.resize(num_elements * logical_size, 0);
                    for (native, logical) in self
                        .raw
                        .chunks_exact(native_size)
                        .zip(bytes.chunks_exact_mut(logical_size))
                    {
                        decode_element(elts, native, logical, &mut self.warnings);
                    }
                }
            }
            TileBuffer::Values(values) => {
                let data_type = layout.data_type();
                values.clear();
                values.extend(self.raw.chunks_exact(native_size).map(|native| {
                    decode_element_value(data_type, elts, native, &mut self.warnings)
                }));
            }
        }
        Ok(())
    }

    /// Returns true if every element of the tile equals the fill value (or zero if there is no fill value).
    ///
    /// Tiles held as [`Value`]s are compared in their native encoding, so they must be encoded into `raw` first.
    fn is_fill(&self, layout: &TileLayout) -> bool {
        match &self.buffer {
            TileBuffer::Fixed(bytes) => {
                let fill = layout.fill_bytes_or_zero();
                if fill.iter().all(|&byte| byte == 0) {
                    bytes.iter().all(|&byte| byte == 0)
                } else {
                    bytes
                        .chunks_exact(fill.len())
                        .all(|element| element == fill.as_slice())
                }
            }
            TileBuffer::Values(_) => {
                let fill = layout.native_fill_or_zero();
                self.raw
                    .chunks_exact(fill.len())
                    .all(|element| element == fill.as_slice())
            }
        }
    }

    fn encode(&mut self, layout: &TileLayout) {
        let native_size = layout.dtype.native_size();
        let elts = layout.dtype.elts();
        match &self.buffer {
            TileBuffer::Fixed(bytes) => {
                self.raw.clear();
                if layout.dtype.is_plain_copy() {
                    self.raw.extend_from_slice(bytes);
                } else {
                    let logical_size = layout.data_type().size();
                    self.raw.resize(bytes.len() / logical_size * native_size, 0);
                    for (logical, native) in bytes
                        .chunks_exact(logical_size)
                        .zip(self.raw.chunks_exact_mut(native_size))
                    {
                        encode_element(elts, logical, native, &mut self.warnings);
                    }
                }
            }
            TileBuffer::Values(values) => {
                let data_type = layout.data_type();
                self.raw.clear();
                self.raw.resize(values.len() * native_size, 0);
                for (value, native) in values.iter().zip(self.raw.chunks_exact_mut(native_size)) {
                    encode_element_value(data_type, elts, value, native, &mut self.warnings);
                }
            }
        }

        if layout.order == MemoryOrder::F {
            self.transposed.resize(self.raw.len(), 0);
            transpose_c_to_f(
                &self.raw,
                &mut self.transposed,
                &layout.block_shape,
                native_size,
            );
            std::mem::swap(&mut self.raw, &mut self.transposed);
        }
    }

    /// Write the current tile to storage if it is dirty.
    ///
    /// A tile entirely equal to the fill value (or zero if there is no fill value) is erased from storage instead.
    ///
    /// # Errors
    /// Returns an error if encoding the tile or a storage operation fails.
    pub(crate) fn flush(&mut self, layout: &TileLayout) -> Result<(), ArrayError> {
        if !self.is_dirty() {
            return Ok(());
        }
        let key = layout.chunk_key(&self.chunk_indices)?;

        let values_encoded = matches!(self.buffer, TileBuffer::Values(_));
        if values_encoded {
            self.encode(layout);
        }
        if self.is_fill(layout) {
            if layout.storage.exists(&key)? {
                log::debug!("erasing chunk {key}, all elements equal the fill value");
                layout.storage.erase(&key)?;
            }
            self.empty = true;
            self.state = TileState::Clean;
            return Ok(());
        }

        if !values_encoded {
            self.encode(layout);
        }
        if layout.key_encoding.separator() == ChunkKeySeparator::Slash {
            layout.storage.create_dir_all(&key.parent())?;
        }
        let encoded = layout.pipeline.encode(&self.raw, &key)?;
        layout.storage.set(&key, &encoded)?;
        self.state = TileState::Clean;
        Ok(())
    }
}
