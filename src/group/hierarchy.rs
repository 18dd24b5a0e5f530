use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use crate::{
    array::ArrayError,
    metadata::{v2::ZMETADATA, ConsolidatedMetadata},
    storage::{ReadableWritableListableStorage, StoreKey},
};

use super::HierarchyOptions;

/// The metadata dialect of a hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ZarrVersion {
    /// Zarr V2: `.zarray`, `.zgroup` and `.zattrs` documents.
    V2,
    /// The pre-release V3 layout: a `zarr.json` entry point with documents under `meta/root`.
    V3,
}

#[derive(Debug, Default)]
struct ConsolidatedState {
    metadata: Option<ConsolidatedMetadata>,
    modified: bool,
}

/// The context shared by every array and group of a hierarchy: the store, the dialect, the options, and the
/// consolidated metadata (if any).
///
/// If a hierarchy has consolidated metadata, metadata documents are read from it rather than from the store, and
/// every metadata write updates it. The `.zmetadata` document is written on [`flush`](Hierarchy::flush) and when
/// the hierarchy is dropped.
pub struct Hierarchy {
    storage: ReadableWritableListableStorage,
    version: ZarrVersion,
    options: HierarchyOptions,
    consolidated: Mutex<ConsolidatedState>,
}

impl std::fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hierarchy")
            .field("version", &self.version)
            .field("options", &self.options)
            .field("consolidated", &self.has_consolidated_metadata())
            .finish_non_exhaustive()
    }
}

impl Hierarchy {
    pub(crate) fn new(
        storage: ReadableWritableListableStorage,
        version: ZarrVersion,
        options: HierarchyOptions,
        consolidated: Option<ConsolidatedMetadata>,
    ) -> Self {
        Self {
            storage,
            version,
            options,
            consolidated: Mutex::new(ConsolidatedState {
                metadata: consolidated,
                modified: false,
            }),
        }
    }

    /// The store.
    #[must_use]
    pub fn storage(&self) -> &ReadableWritableListableStorage {
        &self.storage
    }

    /// The metadata dialect.
    #[must_use]
    pub const fn version(&self) -> ZarrVersion {
        self.version
    }

    /// The options.
    #[must_use]
    pub const fn options(&self) -> &HierarchyOptions {
        &self.options
    }

    /// Returns true if the hierarchy has consolidated metadata.
    #[must_use]
    pub fn has_consolidated_metadata(&self) -> bool {
        self.consolidated.lock().metadata.is_some()
    }

    pub(crate) fn check_updatable(&self) -> Result<(), ArrayError> {
        if self.options.updatable() {
            Ok(())
        } else {
            Err(ArrayError::NotWritable)
        }
    }

    /// Read the metadata document at `key`, or [`None`] if it does not exist.
    pub(crate) fn read_json(&self, key: &StoreKey) -> Result<Option<JsonValue>, ArrayError> {
        if let Some(consolidated) = &self.consolidated.lock().metadata {
            return Ok(consolidated.get(key.as_str()).cloned());
        }
        self.storage
            .get(key)?
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|err| {
                    ArrayError::InvalidMetadata(format!("{key} is not valid JSON: {err}"))
                })
            })
            .transpose()
    }

    /// Returns true if the metadata document at `key` exists.
    pub(crate) fn exists_json(&self, key: &StoreKey) -> Result<bool, ArrayError> {
        if let Some(consolidated) = &self.consolidated.lock().metadata {
            return Ok(consolidated.get(key.as_str()).is_some());
        }
        Ok(self.storage.exists(key)?)
    }

    /// The names of the children of the node at `prefix` with a metadata `document`, if the hierarchy has consolidated metadata.
    pub(crate) fn consolidated_children(&self, prefix: &str, document: &str) -> Option<Vec<String>> {
        self.consolidated
            .lock()
            .metadata
            .as_ref()
            .map(|consolidated| consolidated.children(prefix, document))
    }

    /// Write the metadata document at `key`.
    pub(crate) fn write_json(&self, key: &StoreKey, document: JsonValue) -> Result<(), ArrayError> {
        self.check_updatable()?;
        log::debug!("writing metadata {key}");
        crate::storage::set_json(self.storage.as_ref(), key, &document)?;
        let mut consolidated = self.consolidated.lock();
        if let Some(metadata) = &mut consolidated.metadata {
            metadata.set(key.as_str(), document);
            consolidated.modified = true;
        }
        Ok(())
    }

    /// Write the consolidated metadata if it has been modified.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the `.zmetadata` document cannot be written.
    pub fn flush(&self) -> Result<(), ArrayError> {
        let mut consolidated = self.consolidated.lock();
        if !consolidated.modified {
            return Ok(());
        }
        if let Some(metadata) = &consolidated.metadata {
            let document = serde_json::to_value(metadata)
                .map_err(|err| ArrayError::InvalidMetadata(err.to_string()))?;
            let key = StoreKey::new(ZMETADATA)?;
            log::debug!("writing consolidated metadata {key}");
            crate::storage::set_json(self.storage.as_ref(), &key, &document)?;
        }
        consolidated.modified = false;
        Ok(())
    }
}

impl Drop for Hierarchy {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            self.options.error_sink().report(&err);
        }
    }
}
