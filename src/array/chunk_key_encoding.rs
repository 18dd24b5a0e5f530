//! Chunk keys.
//!
//! The key of a chunk joins its chunk grid indices with a [`ChunkKeySeparator`].
//! A zero-dimensional array has a single chunk with the key `0`.
//!
//! Chunks are stored relative to a [`StorePrefix`] that depends on the metadata dialect:
//!  - Zarr V2: the directory of the array, e.g. `group/array/0.1`.
//!  - V3: a parallel data tree, e.g. `data/root/group/array/c0/1`.

use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::storage::{StoreKey, StoreKeyError, StorePrefix};

/// A chunk key separator.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Serialize, Deserialize)]
pub enum ChunkKeySeparator {
    /// The slash '/' character.
    #[display("/")]
    #[serde(rename = "/")]
    Slash,
    /// The dot '.' character.
    #[display(".")]
    #[serde(rename = ".")]
    Dot,
}

impl ChunkKeySeparator {
    /// The separator as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Slash => "/",
            Self::Dot => ".",
        }
    }
}

impl TryFrom<&str> for ChunkKeySeparator {
    type Error = String;

    fn try_from(separator: &str) -> Result<Self, Self::Error> {
        match separator {
            "/" => Ok(Self::Slash),
            "." => Ok(Self::Dot),
            _ => Err(format!(
                "chunk key separator {separator} must be a `.` or `/`"
            )),
        }
    }
}

/// Maps chunk grid indices to store keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkKeyEncoding {
    prefix: StorePrefix,
    key_prefix: &'static str,
    separator: ChunkKeySeparator,
}

impl ChunkKeyEncoding {
    /// Create a chunk key encoding for chunks stored directly under `prefix`.
    #[must_use]
    pub const fn new(prefix: StorePrefix, separator: ChunkKeySeparator) -> Self {
        Self {
            prefix,
            key_prefix: "",
            separator,
        }
    }

    /// Create a chunk key encoding for chunks stored under `prefix` with a `c` in front of the chunk indices.
    #[must_use]
    pub const fn new_with_c_prefix(prefix: StorePrefix, separator: ChunkKeySeparator) -> Self {
        Self {
            prefix,
            key_prefix: "c",
            separator,
        }
    }

    /// The chunk key separator.
    #[must_use]
    pub const fn separator(&self) -> ChunkKeySeparator {
        self.separator
    }

    /// The store prefix of the chunks.
    #[must_use]
    pub const fn prefix(&self) -> &StorePrefix {
        &self.prefix
    }

    /// Encode chunk grid indices without the store prefix, e.g. `0.1` for `[0, 1]`.
    #[must_use]
    pub fn encode(&self, chunk_indices: &[u64]) -> String {
        if chunk_indices.is_empty() {
            "0".to_string()
        } else {
            chunk_indices.iter().join(self.separator.as_str())
        }
    }

    /// The store key of the chunk at `chunk_indices`.
    ///
    /// # Errors
    /// Returns [`StoreKeyError`] if the key is not a valid store key.
    pub fn key(&self, chunk_indices: &[u64]) -> Result<StoreKey, StoreKeyError> {
        self.prefix.key(&format!(
            "{}{}",
            self.key_prefix,
            self.encode(chunk_indices)
        ))
    }
}
