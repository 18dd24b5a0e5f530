//! Chunk memory order transposition.
//!
//! Chunks are processed in row-major (C) order. Arrays with `"order": "F"` store their chunks in column-major order,
//! so the raw bytes of a chunk are transposed after decoding and before encoding.

use serde::{Deserialize, Serialize};

/// The memory order of the elements of a stored chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryOrder {
    /// Row-major order, the last dimension varies fastest.
    #[default]
    C,
    /// Column-major order, the first dimension varies fastest.
    F,
}

impl MemoryOrder {
    /// The metadata representation, `C` or `F`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::F => "F",
        }
    }
}

impl TryFrom<&str> for MemoryOrder {
    type Error = String;

    fn try_from(order: &str) -> Result<Self, Self::Error> {
        match order {
            "C" => Ok(Self::C),
            "F" => Ok(Self::F),
            _ => Err(format!("invalid memory order {order}")),
        }
    }
}

fn strides_c(shape: &[usize], element_size: usize) -> Vec<usize> {
    let mut strides = vec![element_size; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

fn strides_f(shape: &[usize], element_size: usize) -> Vec<usize> {
    let mut strides = vec![element_size; shape.len()];
    for i in 1..shape.len() {
        strides[i] = strides[i - 1] * shape[i - 1];
    }
    strides
}

fn copy_strided(
    src: &[u8],
    dst: &mut [u8],
    shape: &[usize],
    src_strides: &[usize],
    dst_strides: &[usize],
    element_size: usize,
) {
    let num_elements: usize = shape.iter().product();
    let mut indices = vec![0; shape.len()];
    for _ in 0..num_elements {
        let offset = |strides: &[usize]| -> usize {
            indices.iter().zip(strides).map(|(i, stride)| i * stride).sum()
        };
        let (src_offset, dst_offset) = (offset(src_strides), offset(dst_strides));
        dst[dst_offset..dst_offset + element_size]
            .copy_from_slice(&src[src_offset..src_offset + element_size]);
        // odometer increment, last dimension fastest
        for dim in (0..shape.len()).rev() {
            indices[dim] += 1;
            if indices[dim] < shape[dim] {
                break;
            }
            indices[dim] = 0;
        }
    }
}

/// Transpose the elements of a stored F ordered chunk of `shape` into C order.
///
/// # Panics
/// Panics if `src` or `dst` is smaller than the chunk.
pub fn transpose_f_to_c(src: &[u8], dst: &mut [u8], shape: &[usize], element_size: usize) {
    if shape.len() < 2 {
        dst.copy_from_slice(src);
        return;
    }
    copy_strided(
        src,
        dst,
        shape,
        &strides_f(shape, element_size),
        &strides_c(shape, element_size),
        element_size,
    );
}

/// Transpose the elements of a C ordered chunk of `shape` into F order for storage.
///
/// # Panics
/// Panics if `src` or `dst` is smaller than the chunk.
pub fn transpose_c_to_f(src: &[u8], dst: &mut [u8], shape: &[usize], element_size: usize) {
    if shape.len() < 2 {
        dst.copy_from_slice(src);
        return;
    }
    copy_strided(
        src,
        dst,
        shape,
        &strides_c(shape, element_size),
        &strides_f(shape, element_size),
        element_size,
    );
}
