use std::sync::Arc;

use crate::{
    array::{codec::CodecRegistry, ErrorSink, LogErrorSink},
    config::global_config,
};

/// Options for opening or creating a hierarchy.
#[derive(Clone)]
pub struct HierarchyOptions {
    codec_registry: Arc<CodecRegistry>,
    error_sink: Arc<dyn ErrorSink>,
    updatable: bool,
    use_consolidated_metadata: bool,
    create_consolidated_metadata: bool,
}

impl std::fmt::Debug for HierarchyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyOptions")
            .field("codec_registry", &self.codec_registry)
            .field("updatable", &self.updatable)
            .field("use_consolidated_metadata", &self.use_consolidated_metadata)
            .field(
                "create_consolidated_metadata",
                &self.create_consolidated_metadata,
            )
            .finish_non_exhaustive()
    }
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        let config = global_config();
        Self {
            codec_registry: Arc::new(CodecRegistry::with_registered_codecs()),
            error_sink: Arc::new(LogErrorSink),
            updatable: false,
            use_consolidated_metadata: config.use_consolidated_metadata(),
            create_consolidated_metadata: config.create_consolidated_metadata(),
        }
    }
}

impl HierarchyOptions {
    /// The codec registry used to resolve compressors and filters.
    #[must_use]
    pub fn codec_registry(&self) -> &CodecRegistry {
        &self.codec_registry
    }

    /// Set the codec registry.
    pub fn set_codec_registry(&mut self, codec_registry: CodecRegistry) -> &mut Self {
        self.codec_registry = Arc::new(codec_registry);
        self
    }

    /// The sink of errors that cannot be returned, such as flush failures when an array or group is dropped.
    #[must_use]
    pub fn error_sink(&self) -> &dyn ErrorSink {
        self.error_sink.as_ref()
    }

    /// Set the error sink.
    pub fn set_error_sink(&mut self, error_sink: Arc<dyn ErrorSink>) -> &mut Self {
        self.error_sink = error_sink;
        self
    }

    /// Returns true if arrays and groups can be modified.
    #[must_use]
    pub fn updatable(&self) -> bool {
        self.updatable
    }

    /// Set whether arrays and groups can be modified.
    ///
    /// A created hierarchy is always updatable.
    pub fn set_updatable(&mut self, updatable: bool) -> &mut Self {
        self.updatable = updatable;
        self
    }

    /// Get the [use consolidated metadata](crate::config::Config#use-consolidated-metadata) configuration.
    #[must_use]
    pub fn use_consolidated_metadata(&self) -> bool {
        self.use_consolidated_metadata
    }

    /// Set the [use consolidated metadata](crate::config::Config#use-consolidated-metadata) configuration.
    pub fn set_use_consolidated_metadata(&mut self, use_consolidated_metadata: bool) -> &mut Self {
        self.use_consolidated_metadata = use_consolidated_metadata;
        self
    }

    /// Get the [create consolidated metadata](crate::config::Config#create-consolidated-metadata) configuration.
    #[must_use]
    pub fn create_consolidated_metadata(&self) -> bool {
        self.create_consolidated_metadata
    }

    /// Set the [create consolidated metadata](crate::config::Config#create-consolidated-metadata) configuration.
    pub fn set_create_consolidated_metadata(
        &mut self,
        create_consolidated_metadata: bool,
    ) -> &mut Self {
        self.create_consolidated_metadata = create_consolidated_metadata;
        self
    }
}
