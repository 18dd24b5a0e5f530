//! Plugin utilities for codec extension points.
//!
//! A [`Plugin`] creates objects from [`CodecMetadata`] (an identifier and a configuration).
//!
//! Plugins are registered at compile time using the [inventory] crate.
//! They seed [`CodecRegistry::with_registered_codecs`](crate::array::codec::CodecRegistry::with_registered_codecs);
//! the registry, not the plugin list, is what arrays consult at runtime.

use thiserror::Error;

use crate::array::codec::CodecMetadata;

/// A plugin.
pub struct Plugin<TPlugin> {
    /// the identifier of the plugin.
    identifier: &'static str,
    /// Create an implementation of this plugin from metadata.
    create_fn: fn(metadata: &CodecMetadata) -> Result<TPlugin, PluginCreateError>,
}

/// An invalid plugin metadata error.
#[derive(Debug, Error)]
#[error("{plugin_type} {identifier} is unsupported with configuration: {metadata}")]
pub struct PluginMetadataInvalidError {
    identifier: &'static str,
    plugin_type: &'static str,
    metadata: String,
}

impl PluginMetadataInvalidError {
    /// Create a new [`PluginMetadataInvalidError`].
    #[must_use]
    pub fn new(identifier: &'static str, plugin_type: &'static str, metadata: &CodecMetadata) -> Self {
        Self {
            identifier,
            plugin_type,
            metadata: metadata.to_v2_json().to_string(),
        }
    }
}

/// A plugin creation error.
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum PluginCreateError {
    /// An unsupported plugin.
    #[error("{plugin_type} {name} is not supported")]
    Unsupported { name: String, plugin_type: String },
    /// Invalid metadata.
    #[error(transparent)]
    MetadataInvalid(#[from] PluginMetadataInvalidError),
    /// Other
    #[error("{_0}")]
    Other(String),
}

impl From<&str> for PluginCreateError {
    fn from(err_string: &str) -> Self {
        Self::Other(err_string.to_string())
    }
}

impl From<String> for PluginCreateError {
    fn from(err_string: String) -> Self {
        Self::Other(err_string)
    }
}

impl<TPlugin> Plugin<TPlugin> {
    /// Create a new plugin for registration.
    pub const fn new(
        identifier: &'static str,
        create_fn: fn(metadata: &CodecMetadata) -> Result<TPlugin, PluginCreateError>,
    ) -> Self {
        Self {
            identifier,
            create_fn,
        }
    }

    /// Create a `TPlugin` plugin from `metadata`.
    ///
    /// # Errors
    /// Returns a [`PluginCreateError`] if the configuration is invalid.
    pub fn create(&self, metadata: &CodecMetadata) -> Result<TPlugin, PluginCreateError> {
        (self.create_fn)(metadata)
    }

    /// Returns the identifier of the plugin.
    #[must_use]
    pub const fn identifier(&self) -> &'static str {
        self.identifier
    }

    /// Returns the create function of the plugin.
    #[must_use]
    pub(crate) const fn create_fn(
        &self,
    ) -> fn(metadata: &CodecMetadata) -> Result<TPlugin, PluginCreateError> {
        self.create_fn
    }
}
