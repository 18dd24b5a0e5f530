use thiserror::Error;

use crate::{
    node::{NodeNameError, NodePathError},
    storage::{StorageError, StoreKey, StoreKeyError, StorePrefixError},
};

use super::{codec::CodecError, data_type::UnsupportedDataTypeError};

/// An array or group error.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A data type token is unrecognised, or the data type cannot be encoded.
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedDataTypeError),
    /// A codec is not registered or one of its transforms failed.
    #[error("codec {stage} failed{}: {source}", key.as_ref().map(|key| format!(" for chunk {key}")).unwrap_or_default())]
    CodecFailure {
        /// The identifier of the failing codec.
        stage: String,
        /// The chunk being encoded or decoded, if any.
        key: Option<StoreKey>,
        /// The codec error.
        source: CodecError,
    },
    /// A decoded chunk does not have the expected size.
    #[error("chunk {key} decoded to {size} bytes, expected {expected}")]
    CorruptChunk {
        /// The chunk key.
        key: StoreKey,
        /// The decoded size.
        size: usize,
        /// The expected size.
        expected: usize,
    },
    /// A metadata document is structurally invalid.
    #[error("invalid metadata: {_0}")]
    InvalidMetadata(String),
    /// A storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// An attribute with 2 or more dimensions was requested.
    #[error("attributes with {_0} dimensions are not supported")]
    UnsupportedRank(usize),
    /// A mutation was attempted on an array or group that was not opened for update.
    #[error("the array or group is not writable")]
    NotWritable,
    /// The requested region is not within the array, or its parameters are inconsistent.
    #[error("invalid region: {_0}")]
    InvalidRegion(String),
    /// A caller buffer does not hold the requested region.
    #[error("the buffer of {actual} elements does not hold the region, which spans {required} elements")]
    InvalidBufferSize {
        /// The number of elements required.
        required: usize,
        /// The number of elements in the buffer.
        actual: usize,
    },
    /// A value cannot be converted to the requested type.
    #[error("incompatible element type: {_0}")]
    IncompatibleElementType(String),
    /// An array or group does not exist.
    #[error("node {_0} not found")]
    NodeNotFound(String),
    /// An array or group already exists.
    #[error("node {_0} already exists")]
    NodeExists(String),
    /// An invalid node name.
    #[error(transparent)]
    InvalidNodeName(#[from] NodeNameError),
    /// An invalid node path.
    #[error(transparent)]
    InvalidNodePath(#[from] NodePathError),
}

impl From<StoreKeyError> for ArrayError {
    fn from(err: StoreKeyError) -> Self {
        Self::StorageError(err.into())
    }
}

impl From<StorePrefixError> for ArrayError {
    fn from(err: StorePrefixError) -> Self {
        Self::StorageError(err.into())
    }
}

/// Receives errors that cannot be returned to a caller, such as failures to flush when an array or group is dropped.
pub trait ErrorSink: Send + Sync {
    /// Report an error.
    fn report(&self, error: &ArrayError);
}

/// An [`ErrorSink`] that logs errors with [`log::error!`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, error: &ArrayError) {
        log::error!("{error}");
    }
}
