//! The strided read/write engine.
//!
//! A region is described per dimension by a `start` index, an element `count`, a `step` between
//! consecutive elements (possibly negative) and a `buffer_stride` in elements of the caller buffer.
//! Region element `k` lives at `origin + sum(k[i] * buffer_stride[i])` in the caller buffer, where
//! `origin` is the smallest offset that keeps every element of the region inside the buffer.
//!
//! The engine visits the chunks the region intersects one at a time, in C order, and for each chunk
//! copies the intersecting elements between the caller buffer and the current tile.

use super::{
    element::Element,
    tile_cache::{TileBuffer, TileCache, TileLayout},
    value::Value,
    ArrayError,
};

/// A region of an array and its layout in a caller buffer, normalised to non-negative steps.
#[derive(Debug)]
struct Region {
    start: Vec<u64>,
    count: Vec<usize>,
    step: Vec<u64>,
    buffer_stride: Vec<isize>,
    buffer_origin: isize,
}

impl Region {
    /// Validate a region of an array with `shape` and normalise negative steps.
    ///
    /// Returns [`None`] if the region is empty.
    fn new(
        shape: &[u64],
        start: &[u64],
        count: &[usize],
        step: &[i64],
        buffer_stride: &[isize],
        buffer_len: usize,
    ) -> Result<Option<Self>, ArrayError> {
        let dimensionality = shape.len();
        if start.len() != dimensionality
            || count.len() != dimensionality
            || step.len() != dimensionality
            || buffer_stride.len() != dimensionality
        {
            return Err(ArrayError::InvalidRegion(format!(
                "region dimensionality does not match the array dimensionality {dimensionality}"
            )));
        }
        if count.contains(&0) {
            return Ok(None);
        }

        let mut min_offset: isize = 0;
        let mut max_offset: isize = 0;
        for (&count, &stride) in count.iter().zip(buffer_stride) {
            let extent = isize::try_from(count - 1)
                .ok()
                .and_then(|last| last.checked_mul(stride))
                .ok_or_else(|| ArrayError::InvalidRegion("buffer stride overflow".to_string()))?;
            if extent < 0 {
                min_offset += extent;
            } else {
                max_offset += extent;
            }
        }
        let mut buffer_origin = -min_offset;
        let required = usize::try_from(max_offset - min_offset + 1).unwrap_or(usize::MAX);
        if required > buffer_len {
            return Err(ArrayError::InvalidBufferSize {
                required,
                actual: buffer_len,
            });
        }

        let mut region = Self {
            start: Vec::with_capacity(dimensionality),
            count: count.to_vec(),
            step: Vec::with_capacity(dimensionality),
            buffer_stride: buffer_stride.to_vec(),
            buffer_origin: 0,
        };
        for dim in 0..dimensionality {
            let last = (count[dim] - 1) as u64;
            let step_abs = step[dim].unsigned_abs();
            let span = last.checked_mul(step_abs).ok_or_else(|| {
                ArrayError::InvalidRegion(format!("step overflow on dimension {dim}"))
            })?;
            let first = if step[dim] < 0 {
                // Traverse forward from the last element, walking the caller buffer backwards.
                let first = start[dim].checked_sub(span).ok_or_else(|| {
                    ArrayError::InvalidRegion(format!(
                        "region starts before index 0 on dimension {dim}"
                    ))
                })?;
                buffer_origin += last as isize * buffer_stride[dim];
                region.buffer_stride[dim] = -buffer_stride[dim];
                first
            } else {
                start[dim]
            };
            let end = first.checked_add(span).filter(|&end| end < shape[dim]);
            if end.is_none() {
                return Err(ArrayError::InvalidRegion(format!(
                    "region exceeds the array shape {} on dimension {dim}",
                    shape[dim]
                )));
            }
            region.start.push(first);
            region.step.push(step_abs);
        }
        region.buffer_origin = buffer_origin;
        Ok(Some(region))
    }
}

/// The elements of a region along one dimension that fall in a single chunk.
#[derive(Copy, Clone, Debug)]
struct Run {
    /// The index of the first element within the chunk.
    tile_start: usize,
    /// The index of the first element within the region.
    region_start: usize,
    /// The number of elements.
    len: usize,
}

/// Split the region along `dim` into per-chunk runs.
fn runs(region: &Region, dim: usize, block_size: u64) -> Vec<(u64, Run)> {
    let start = region.start[dim];
    let step = region.step[dim];
    let count = region.count[dim];
    let mut runs = Vec::new();
    let mut k = 0;
    while k < count {
        let index = start + k as u64 * step;
        let chunk = index / block_size;
        let chunk_end = (chunk + 1) * block_size;
        let len = if step == 0 {
            count - k
        } else {
            usize::try_from((chunk_end - index).div_ceil(step))
                .unwrap_or(usize::MAX)
                .min(count - k)
        };
        runs.push((
            chunk,
            Run {
                tile_start: (index - chunk * block_size) as usize,
                region_start: k,
                len,
            },
        ));
        k += len;
    }
    runs
}

/// Row-major element strides of a tile.
fn tile_strides(block_shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; block_shape.len()];
    for dim in (0..block_shape.len().saturating_sub(1)).rev() {
        strides[dim] = strides[dim + 1] * block_shape[dim + 1];
    }
    strides
}

/// Visit every chunk the region intersects, with the runs of the region in that chunk.
fn for_each_chunk(
    region: &Region,
    layout: &TileLayout,
    mut f: impl FnMut(&[u64], &[Run]) -> Result<(), ArrayError>,
) -> Result<(), ArrayError> {
    let dimensionality = region.start.len();
    let per_dim: Vec<Vec<(u64, Run)>> = (0..dimensionality)
        .map(|dim| runs(region, dim, layout.block_shape[dim] as u64))
        .collect();
    let mut position = vec![0usize; dimensionality];
    let mut chunk_indices = vec![0u64; dimensionality];
    let mut chunk_runs = Vec::with_capacity(dimensionality);
    loop {
        chunk_runs.clear();
        for dim in 0..dimensionality {
            let (chunk, run) = per_dim[dim][position[dim]];
            chunk_indices[dim] = chunk;
            chunk_runs.push(run);
        }
        f(&chunk_indices, &chunk_runs)?;

        // Advance the chunk odometer, last dimension fastest.
        let mut dim = dimensionality;
        loop {
            if dim == 0 {
                return Ok(());
            }
            dim -= 1;
            position[dim] += 1;
            if position[dim] < per_dim[dim].len() {
                break;
            }
            position[dim] = 0;
        }
    }
}

/// A contiguous run of elements along the last dimension, as tile and buffer element indices.
#[derive(Copy, Clone, Debug)]
struct Span {
    tile_index: usize,
    tile_step: usize,
    buffer_index: usize,
    buffer_stride: isize,
    len: usize,
}

impl Span {
    fn tile_indices(self) -> impl Iterator<Item = usize> {
        (0..self.len).map(move |j| self.tile_index + j * self.tile_step)
    }

    fn buffer_indices(self) -> impl Iterator<Item = usize> {
        (0..self.len).map(move |j| (self.buffer_index as isize + j as isize * self.buffer_stride) as usize)
    }

    fn indices(self) -> impl Iterator<Item = (usize, usize)> {
        self.tile_indices().zip(self.buffer_indices())
    }

    /// Returns true if both the tile and the buffer elements are contiguous.
    fn is_contiguous(self) -> bool {
        (self.tile_step == 1 || self.len == 1) && (self.buffer_stride == 1 || self.len == 1)
    }
}

/// Visit the spans of the runs of a chunk, with the inner (last) dimension as the span.
fn for_each_span(
    region: &Region,
    tile_strides: &[usize],
    runs: &[Run],
    mut f: impl FnMut(Span),
) {
    let dimensionality = runs.len();
    if dimensionality == 0 {
        f(Span {
            tile_index: 0,
            tile_step: 1,
            buffer_index: region.buffer_origin as usize,
            buffer_stride: 1,
            len: 1,
        });
        return;
    }
    let inner = dimensionality - 1;
    let mut outer = vec![0usize; inner];
    loop {
        let mut tile_index = 0;
        let mut buffer_index = region.buffer_origin;
        for dim in 0..dimensionality {
            let j = if dim < inner { outer[dim] } else { 0 };
            let run = runs[dim];
            tile_index += (run.tile_start + j * region.step[dim] as usize) * tile_strides[dim];
            buffer_index += (run.region_start + j) as isize * region.buffer_stride[dim];
        }
        f(Span {
            tile_index,
            tile_step: region.step[inner] as usize * tile_strides[inner],
            buffer_index: buffer_index as usize,
            buffer_stride: region.buffer_stride[inner],
            len: runs[inner].len,
        });

        let mut dim = inner;
        loop {
            if dim == 0 {
                return;
            }
            dim -= 1;
            outer[dim] += 1;
            if outer[dim] < runs[dim].len {
                break;
            }
            outer[dim] = 0;
        }
    }
}

/// Returns true if the runs of a chunk cover every element of the chunk within the array `shape`.
fn covers_chunk(region: &Region, shape: &[u64], block_shape: &[usize], chunk_indices: &[u64], runs: &[Run]) -> bool {
    runs.iter().enumerate().all(|(dim, run)| {
        let block_size = block_shape[dim] as u64;
        let in_shape = (shape[dim] - chunk_indices[dim] * block_size).min(block_size);
        run.tile_start == 0 && (region.step[dim] == 1 || in_shape == 1) && run.len as u64 == in_shape
    })
}

/// Read a region into `buffer`.
///
/// # Errors
/// Returns an error if the region or buffer is invalid, a chunk cannot be retrieved or decoded, or an
/// element cannot be converted to `T`.
pub(crate) fn read<T: Element>(
    layout: &TileLayout,
    cache: &mut TileCache,
    shape: &[u64],
    start: &[u64],
    count: &[usize],
    step: &[i64],
    buffer_stride: &[isize],
    buffer: &mut [T],
) -> Result<(), ArrayError> {
    let Some(region) = Region::new(shape, start, count, step, buffer_stride, buffer.len())? else {
        return Ok(());
    };
    let data_type = layout.data_type();
    let element_size = data_type.size();
    let same_type = T::NUMERIC_TYPE.is_some() && T::NUMERIC_TYPE == data_type.numeric_type();
    let fill = T::from_value(&layout.fill_or_zero())?;
    let fill_is_zero = T::as_bytes(std::slice::from_ref(&fill))
        .is_some_and(|bytes| bytes.iter().all(|&byte| byte == 0));
    let strides = tile_strides(&layout.block_shape);

    for_each_chunk(&region, layout, |chunk_indices, runs| {
        cache.load(layout, chunk_indices)?;
        let mut result = Ok(());
        if cache.is_empty() {
            for_each_span(&region, &strides, runs, |span| {
                if span.is_contiguous() && fill_is_zero {
                    let elements = &mut buffer[span.buffer_index..span.buffer_index + span.len];
                    if let Some(bytes) = T::as_bytes_mut(elements) {
                        bytes.fill(0);
                        return;
                    }
                }
                for buffer_index in span.buffer_indices() {
                    buffer[buffer_index] = fill.clone();
                }
            });
            return Ok(());
        }

        match cache.buffer() {
            TileBuffer::Fixed(bytes) => for_each_span(&region, &strides, runs, |span| {
                if result.is_err() {
                    return;
                }
                if same_type {
                    if span.is_contiguous() {
                        let src = &bytes[span.tile_index * element_size
                            ..(span.tile_index + span.len) * element_size];
                        let elements =
                            &mut buffer[span.buffer_index..span.buffer_index + span.len];
                        if let Some(dst) = T::as_bytes_mut(elements) {
                            dst.copy_from_slice(src);
                            return;
                        }
                    }
                    for (tile_index, buffer_index) in span.indices() {
                        let src =
                            &bytes[tile_index * element_size..(tile_index + 1) * element_size];
                        if let Some(dst) =
                            T::as_bytes_mut(std::slice::from_mut(&mut buffer[buffer_index]))
                        {
                            dst.copy_from_slice(src);
                        }
                    }
                    return;
                }
                for (tile_index, buffer_index) in span.indices() {
                    let value = Value::from_logical_bytes(
                        data_type,
                        &bytes[tile_index * element_size..(tile_index + 1) * element_size],
                    );
                    match T::from_value(&value) {
                        Ok(element) => buffer[buffer_index] = element,
                        Err(err) => {
                            result = Err(err);
                            return;
                        }
                    }
                }
            }),
            TileBuffer::Values(values) => for_each_span(&region, &strides, runs, |span| {
                if result.is_err() {
                    return;
                }
                for (tile_index, buffer_index) in span.indices() {
                    match T::from_value(&values[tile_index]) {
                        Ok(element) => buffer[buffer_index] = element,
                        Err(err) => {
                            result = Err(err);
                            return;
                        }
                    }
                }
            }),
        }
        result
    })
}

/// Write a region from `buffer`.
///
/// # Errors
/// Returns an error if the region or buffer is invalid, a chunk cannot be retrieved, decoded or
/// flushed, or an element cannot be converted to the array data type.
#[allow(clippy::too_many_arguments)]
pub(crate) fn write<T: Element>(
    layout: &TileLayout,
    cache: &mut TileCache,
    shape: &[u64],
    start: &[u64],
    count: &[usize],
    step: &[i64],
    buffer_stride: &[isize],
    buffer: &[T],
) -> Result<(), ArrayError> {
    let Some(region) = Region::new(shape, start, count, step, buffer_stride, buffer.len())? else {
        return Ok(());
    };
    let data_type = layout.data_type();
    let element_size = data_type.size();
    let same_type = T::NUMERIC_TYPE.is_some() && T::NUMERIC_TYPE == data_type.numeric_type();
    let strides = tile_strides(&layout.block_shape);

    for_each_chunk(&region, layout, |chunk_indices, runs| {
        if covers_chunk(&region, shape, &layout.block_shape, chunk_indices, runs) {
            cache.load_overwritten(layout, chunk_indices)?;
        } else {
            cache.load(layout, chunk_indices)?;
            cache.materialize(layout);
        }

        let mut result = Ok(());
        match cache.buffer_mut() {
            TileBuffer::Fixed(bytes) => for_each_span(&region, &strides, runs, |span| {
                if result.is_err() {
                    return;
                }
                if same_type {
                    if span.is_contiguous() {
                        let elements = &buffer[span.buffer_index..span.buffer_index + span.len];
                        if let Some(src) = T::as_bytes(elements) {
                            bytes[span.tile_index * element_size
                                ..(span.tile_index + span.len) * element_size]
                                .copy_from_slice(src);
                            return;
                        }
                    }
                    for (tile_index, buffer_index) in span.indices() {
                        if let Some(src) = T::as_bytes(std::slice::from_ref(&buffer[buffer_index])) {
                            bytes[tile_index * element_size..(tile_index + 1) * element_size]
                                .copy_from_slice(src);
                        }
                    }
                    return;
                }
                for (tile_index, buffer_index) in span.indices() {
                    match buffer[buffer_index].to_value().conform(data_type) {
                        Ok(value) => value.write_logical_bytes(
                            data_type,
                            &mut bytes[tile_index * element_size..(tile_index + 1) * element_size],
                        ),
                        Err(err) => {
                            result = Err(err);
                            return;
                        }
                    }
                }
            }),
            TileBuffer::Values(values) => for_each_span(&region, &strides, runs, |span| {
                if result.is_err() {
                    return;
                }
                for (tile_index, buffer_index) in span.indices() {
                    match buffer[buffer_index].to_value().conform(data_type) {
                        Ok(value) => values[tile_index] = value,
                        Err(err) => {
                            result = Err(err);
                            return;
                        }
                    }
                }
            }),
        }
        cache.mark_dirty();
        result
    })
}
