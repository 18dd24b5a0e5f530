//! Storage: the byte-addressable key/value interface chunks and metadata documents are read from and written to.
//!
//! A store is split into three capabilities:
//!  - [`ReadableStorageTraits`]: read a value and stat a key,
//!  - [`WritableStorageTraits`]: write and delete a value, and create a "directory",
//!  - [`ListableStorageTraits`]: list the keys and sub-prefixes under a prefix.
//!
//! [`MemoryStore`](store::MemoryStore) and [`FilesystemStore`](store::FilesystemStore) implement all three.
//!
//! Storage calls block until completion. Stores must tolerate concurrent readers, but there is no coordination between writers.

pub mod store;
mod store_key;
mod store_prefix;

use std::sync::Arc;

use thiserror::Error;

pub use store_key::{StoreKey, StoreKeyError, StoreKeys};
pub use store_prefix::{StorePrefix, StorePrefixError, StorePrefixes};

/// Bytes which may or may not be present in a store.
pub type MaybeBytes = Option<Vec<u8>>;

/// [`Arc`] wrapped readable, writable, and listable storage.
pub type ReadableWritableListableStorage = Arc<dyn ReadableWritableListableStorageTraits>;

/// Readable storage traits.
pub trait ReadableStorageTraits: Send + Sync {
    /// Retrieve the value (bytes) associated with a given [`StoreKey`].
    ///
    /// Returns [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError>;

    /// Return the size in bytes of the value at `key`, or [`None`] if the key is not found.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError>;

    /// Returns true if a value exists at `key`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn exists(&self, key: &StoreKey) -> Result<bool, StorageError> {
        Ok(self.size_key(key)?.is_some())
    }
}

/// Writable storage traits.
pub trait WritableStorageTraits: Send + Sync {
    /// Store bytes at a [`StoreKey`], replacing any existing value.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on failure to store.
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError>;

    /// Erase a [`StoreKey`].
    ///
    /// Succeeds if the key does not exist.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Create the "directory" `prefix` and all of its parents.
    ///
    /// Stores without a notion of directories do nothing.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn create_dir_all(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        let _ = prefix;
        Ok(())
    }
}

/// Listable storage traits.
pub trait ListableStorageTraits: Send + Sync {
    /// List the keys and prefixes directly under `prefix`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError>;
}

/// A supertrait of [`ReadableStorageTraits`], [`WritableStorageTraits`] and [`ListableStorageTraits`].
pub trait ReadableWritableListableStorageTraits:
    ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

impl<T> ReadableWritableListableStorageTraits for T where
    T: ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits + ?Sized
{
}

/// [`StoreKeys`] and [`StorePrefixes`].
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct StoreKeysPrefixes {
    keys: StoreKeys,
    prefixes: StorePrefixes,
}

impl StoreKeysPrefixes {
    /// Create a new [`StoreKeysPrefixes`].
    #[must_use]
    pub fn new(keys: StoreKeys, prefixes: StorePrefixes) -> Self {
        Self { keys, prefixes }
    }

    /// Returns the keys.
    #[must_use]
    pub const fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// Returns the prefixes.
    #[must_use]
    pub const fn prefixes(&self) -> &StorePrefixes {
        &self.prefixes
    }
}

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only store.
    #[error("a write operation was attempted on a read only store")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An invalid store prefix.
    #[error(transparent)]
    InvalidStorePrefix(#[from] StorePrefixError),
    /// An invalid store key.
    #[error(transparent)]
    InvalidStoreKey(#[from] StoreKeyError),
    /// The requested method is not supported.
    #[error("{0}")]
    Unsupported(String),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

/// Retrieve and parse the JSON document at `key`, or [`None`] if the key is not found.
///
/// # Errors
/// Returns a [`StorageError`] if the value cannot be retrieved or is not valid JSON.
pub fn get_json<TStorage: ReadableStorageTraits + ?Sized>(
    storage: &TStorage,
    key: &StoreKey,
) -> Result<Option<serde_json::Value>, StorageError> {
    match storage.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StorageError::Other(format!("error parsing JSON at {key}: {err}"))),
        None => Ok(None),
    }
}

/// Serialise `value` as pretty-printed JSON and store it at `key`.
///
/// # Errors
/// Returns a [`StorageError`] if the value cannot be serialised or stored.
pub fn set_json<TStorage: WritableStorageTraits + ?Sized>(
    storage: &TStorage,
    key: &StoreKey,
    value: &serde_json::Value,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| StorageError::Other(format!("error serialising JSON for {key}: {err}")))?;
    storage.set(key, &bytes)
}
