//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::array::StringFormat;

/// Global configuration options.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
/// These are defaults only, used when a value is not set explicitly on an [`ArrayBuilder`](crate::array::ArrayBuilder)
/// or in [`HierarchyOptions`](crate::group::HierarchyOptions).
///
/// ## Default Block Size Limit
/// > default: `256`
///
/// The block size of a new array along its last two dimensions is the dimension size capped at this limit.
/// Other dimensions have a block size of 1. One-dimensional arrays use their full size.
///
/// ## Use Consolidated Metadata
/// > default: [`true`]
///
/// If enabled, opening a Zarr V2 hierarchy reads every metadata document from `.zmetadata` when it is present.
///
/// ## Create Consolidated Metadata
/// > default: [`true`]
///
/// If enabled, creating or updating a Zarr V2 hierarchy also maintains its `.zmetadata` document.
///
/// ## Default String Format
/// > default: [`StringFormat::Ascii`]
///
/// The native encoding of new fixed-length string arrays (`|S{n}` or `<U{n}`).
#[derive(Debug)]
pub struct Config {
    default_block_size_limit: u64,
    use_consolidated_metadata: bool,
    create_consolidated_metadata: bool,
    default_string_format: StringFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_block_size_limit: 256,
            use_consolidated_metadata: true,
            create_consolidated_metadata: true,
            default_string_format: StringFormat::Ascii,
        }
    }
}

impl Config {
    /// Get the [default block size limit](#default-block-size-limit) configuration.
    #[must_use]
    pub fn default_block_size_limit(&self) -> u64 {
        self.default_block_size_limit
    }

    /// Set the [default block size limit](#default-block-size-limit) configuration.
    ///
    /// A limit of zero is treated as one.
    pub fn set_default_block_size_limit(&mut self, limit: u64) {
        self.default_block_size_limit = limit.max(1);
    }

    /// Get the [use consolidated metadata](#use-consolidated-metadata) configuration.
    #[must_use]
    pub fn use_consolidated_metadata(&self) -> bool {
        self.use_consolidated_metadata
    }

    /// Set the [use consolidated metadata](#use-consolidated-metadata) configuration.
    pub fn set_use_consolidated_metadata(&mut self, use_consolidated_metadata: bool) {
        self.use_consolidated_metadata = use_consolidated_metadata;
    }

    /// Get the [create consolidated metadata](#create-consolidated-metadata) configuration.
    #[must_use]
    pub fn create_consolidated_metadata(&self) -> bool {
        self.create_consolidated_metadata
    }

    /// Set the [create consolidated metadata](#create-consolidated-metadata) configuration.
    pub fn set_create_consolidated_metadata(&mut self, create_consolidated_metadata: bool) {
        self.create_consolidated_metadata = create_consolidated_metadata;
    }

    /// Get the [default string format](#default-string-format) configuration.
    #[must_use]
    pub fn default_string_format(&self) -> StringFormat {
        self.default_string_format
    }

    /// Set the [default string format](#default-string-format) configuration.
    pub fn set_default_string_format(&mut self, string_format: StringFormat) {
        self.default_string_format = string_format;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}
