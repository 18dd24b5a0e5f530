//! Chunk codecs.
//!
//! The raw (native, C or F ordered) bytes of a chunk pass through a [`CodecPipeline`] before they are stored:
//! the filters in listed order, then the compressor.
//! Decoding applies the compressor, then the filters in reverse order.
//!
//! Codecs are resolved by identifier through a [`CodecRegistry`].
//! The registry is an explicit object passed to a hierarchy, so tests and applications can register their own codecs.
//! [`CodecRegistry::with_registered_codecs`] contains every codec registered at compile time with [`inventory`]:
//!  - `blosc` (feature `blosc`),
//!  - `delta`,
//!  - `gzip` and `zlib` (feature `gzip`),
//!  - `zstd` (feature `zstd`).

#[cfg(feature = "blosc")]
mod blosc;
mod delta;
#[cfg(feature = "gzip")]
mod gzip;
#[cfg(feature = "zstd")]
mod zstd;

#[cfg(feature = "blosc")]
pub use blosc::{BloscCodec, BloscCodecConfiguration};
pub use delta::DeltaCodec;
#[cfg(feature = "gzip")]
pub use gzip::{GzipCodec, ZlibCodec};
#[cfg(feature = "zstd")]
pub use self::zstd::ZstdCodec;

use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::{
    plugin::{Plugin, PluginCreateError, PluginMetadataInvalidError},
    storage::StoreKey,
};

use super::ArrayError;

/// A codec plugin.
pub type CodecPlugin = Plugin<Arc<dyn CodecTraits>>;
inventory::collect!(CodecPlugin);

/// Configuration keys that are bookkeeping of other implementations and are not written back to metadata.
const INTERNAL_CONFIGURATION_KEYS: [&str; 3] = ["num_threads", "typesize", "header"];

/// The prefix of a V3 codec identifier URI.
const V3_CODEC_PREFIX: &str = "https://purl.org/zarr/spec/codec/";

/// The suffix of a V3 codec identifier URI.
const V3_CODEC_SUFFIX: &str = "/1.0";

/// A codec identifier and its configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecMetadata {
    id: String,
    configuration: Map<String, JsonValue>,
}

impl CodecMetadata {
    /// Create codec metadata from an identifier and a configuration.
    #[must_use]
    pub fn new(id: impl Into<String>, configuration: Map<String, JsonValue>) -> Self {
        Self {
            id: id.into(),
            configuration,
        }
    }

    /// Create codec metadata with an identifier and a serializable configuration.
    ///
    /// # Errors
    /// Returns [`serde_json::Error`] if `configuration` does not serialise to a JSON object.
    pub fn new_with_serializable_configuration<T: serde::Serialize>(
        id: &str,
        configuration: &T,
    ) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(configuration)? {
            JsonValue::Object(configuration) => Ok(Self::new(id, configuration)),
            _ => Err(serde::ser::Error::custom(
                "the configuration is not a JSON object",
            )),
        }
    }

    /// The codec identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The codec configuration.
    #[must_use]
    pub const fn configuration(&self) -> &Map<String, JsonValue> {
        &self.configuration
    }

    /// Deserialise the configuration, ignoring internal bookkeeping keys.
    ///
    /// # Errors
    /// Returns [`PluginCreateError::MetadataInvalid`] if the configuration does not match `T`.
    pub fn to_configuration<T: DeserializeOwned>(
        &self,
        identifier: &'static str,
    ) -> Result<T, PluginCreateError> {
        serde_json::from_value(JsonValue::Object(self.stripped_configuration())).map_err(|_| {
            PluginMetadataInvalidError::new(identifier, "codec", self).into()
        })
    }

    fn stripped_configuration(&self) -> Map<String, JsonValue> {
        self.configuration
            .iter()
            .filter(|(key, _)| !INTERNAL_CONFIGURATION_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Parse a Zarr V2 codec document, `{"id": <id>, <configuration>...}`.
    ///
    /// # Errors
    /// Returns an error message if the document is not an object with a string `id`.
    pub fn from_v2_json(json: &JsonValue) -> Result<Self, String> {
        let object = json
            .as_object()
            .ok_or_else(|| format!("codec {json} is not an object"))?;
        let id = object
            .get("id")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| format!("codec {json} has no id"))?;
        let configuration = object
            .iter()
            .filter(|(key, _)| key.as_str() != "id")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Self::new(id, configuration))
    }

    /// Serialise to a Zarr V2 codec document. Internal bookkeeping keys are stripped.
    #[must_use]
    pub fn to_v2_json(&self) -> JsonValue {
        let mut object = Map::new();
        object.insert("id".to_string(), JsonValue::String(self.id.clone()));
        object.extend(self.stripped_configuration());
        JsonValue::Object(object)
    }

    /// Parse a V3 `compressor` document, `{"codec": <uri>, "configuration": {...}}`.
    ///
    /// # Errors
    /// Returns an error message if the document is malformed.
    pub fn from_v3_json(json: &JsonValue) -> Result<Self, String> {
        let codec = json
            .get("codec")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| format!("compressor {json} has no codec"))?;
        let id = codec
            .strip_prefix(V3_CODEC_PREFIX)
            .and_then(|codec| codec.strip_suffix(V3_CODEC_SUFFIX))
            .ok_or_else(|| format!("unrecognised codec {codec}"))?;
        let configuration = match json.get("configuration") {
            None | Some(JsonValue::Null) => Map::new(),
            Some(JsonValue::Object(configuration)) => configuration.clone(),
            Some(configuration) => {
                return Err(format!("codec configuration {configuration} is not an object"))
            }
        };
        Ok(Self::new(id, configuration))
    }

    /// Serialise to a V3 `compressor` document.
    #[must_use]
    pub fn to_v3_json(&self) -> JsonValue {
        serde_json::json!({
            "codec": format!("{V3_CODEC_PREFIX}{}{V3_CODEC_SUFFIX}", self.id),
            "configuration": self.stripped_configuration(),
        })
    }
}

/// A codec error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The codec could not be created.
    #[error(transparent)]
    Unsupported(#[from] PluginCreateError),
    /// Other
    #[error("{_0}")]
    Other(String),
}

impl From<&str> for CodecError {
    fn from(err_string: &str) -> Self {
        Self::Other(err_string.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err_string: String) -> Self {
        Self::Other(err_string)
    }
}

/// Codec traits.
pub trait CodecTraits: Send + Sync + std::fmt::Debug {
    /// The metadata of the codec, written to array metadata.
    fn create_metadata(&self) -> CodecMetadata;

    /// Encode bytes.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes. `decoded_size` is the expected size of the fully decoded chunk.
    ///
    /// # Errors
    /// Returns [`CodecError`] if a codec fails.
    fn decode(&self, encoded_value: Vec<u8>, decoded_size: usize) -> Result<Vec<u8>, CodecError>;
}

type CodecCreateFn =
    Arc<dyn Fn(&CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError> + Send + Sync>;

/// A registry of codecs, keyed by identifier.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: BTreeMap<String, CodecCreateFn>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

impl CodecRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every codec registered at compile time.
    #[must_use]
    pub fn with_registered_codecs() -> Self {
        let mut registry = Self::new();
        for plugin in inventory::iter::<CodecPlugin> {
            registry.register(plugin.identifier(), plugin.create_fn());
        }
        registry
    }

    /// Register a codec, replacing any codec with the same identifier.
    pub fn register<F>(&mut self, identifier: &str, create_fn: F)
    where
        F: Fn(&CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError>
            + Send
            + Sync
            + 'static,
    {
        self.codecs
            .insert(identifier.to_string(), Arc::new(create_fn));
    }

    /// Returns true if a codec with `identifier` is registered.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.codecs.contains_key(identifier)
    }

    /// The registered codec identifiers.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    /// Create a codec from `metadata`.
    ///
    /// # Errors
    /// Returns [`PluginCreateError::Unsupported`] if the codec is not registered, or another error if its configuration is invalid.
    pub fn create(&self, metadata: &CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError> {
        let create_fn =
            self.codecs
                .get(metadata.id())
                .ok_or_else(|| PluginCreateError::Unsupported {
                    name: metadata.id().to_string(),
                    plugin_type: "codec".to_string(),
                })?;
        create_fn(metadata)
    }
}

/// A resolved codec and its metadata.
#[derive(Clone, Debug)]
struct PipelineStage {
    metadata: CodecMetadata,
    codec: Arc<dyn CodecTraits>,
}

impl PipelineStage {
    fn new(registry: &CodecRegistry, metadata: CodecMetadata) -> Result<Self, ArrayError> {
        let codec = registry
            .create(&metadata)
            .map_err(|err| ArrayError::CodecFailure {
                stage: metadata.id().to_string(),
                key: None,
                source: err.into(),
            })?;
        Ok(Self { metadata, codec })
    }

    fn failure(&self, key: &StoreKey, source: CodecError) -> ArrayError {
        ArrayError::CodecFailure {
            stage: self.metadata.id().to_string(),
            key: Some(key.clone()),
            source,
        }
    }
}

/// An optional compressor and an ordered list of filters.
#[derive(Clone, Debug, Default)]
pub struct CodecPipeline {
    compressor: Option<PipelineStage>,
    filters: Vec<PipelineStage>,
}

impl CodecPipeline {
    /// Create a pipeline, resolving every codec through `registry`.
    ///
    /// # Errors
    /// Returns [`ArrayError::CodecFailure`] if a codec is not registered or its configuration is invalid.
    pub fn new(
        registry: &CodecRegistry,
        compressor: Option<CodecMetadata>,
        filters: Vec<CodecMetadata>,
    ) -> Result<Self, ArrayError> {
        Ok(Self {
            compressor: compressor
                .map(|compressor| PipelineStage::new(registry, compressor))
                .transpose()?,
            filters: filters
                .into_iter()
                .map(|filter| PipelineStage::new(registry, filter))
                .collect::<Result<_, _>>()?,
        })
    }

    /// The compressor metadata.
    #[must_use]
    pub fn compressor(&self) -> Option<&CodecMetadata> {
        self.compressor.as_ref().map(|stage| &stage.metadata)
    }

    /// The filter metadata, in encoding order.
    pub fn filters(&self) -> impl Iterator<Item = &CodecMetadata> {
        self.filters.iter().map(|stage| &stage.metadata)
    }

    /// Returns true if the pipeline has no compressor and no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compressor.is_none() && self.filters.is_empty()
    }

    /// Encode the raw bytes of the chunk at `key`: the filters in order, then the compressor.
    ///
    /// The raw bytes are borrowed unchanged if the pipeline is empty.
    ///
    /// # Errors
    /// Returns [`ArrayError::CodecFailure`] naming the failing stage and `key`.
    pub fn encode<'a>(&self, bytes: &'a [u8], key: &StoreKey) -> Result<Cow<'a, [u8]>, ArrayError> {
        let mut bytes = Cow::Borrowed(bytes);
        for stage in self.filters.iter().chain(&self.compressor) {
            bytes = Cow::Owned(
                stage
                    .codec
                    .encode(&bytes)
                    .map_err(|err| stage.failure(key, err))?,
            );
        }
        Ok(bytes)
    }

    /// Decode the stored bytes of the chunk at `key`: the compressor, then the filters in reverse order.
    ///
    /// # Errors
    /// Returns [`ArrayError::CodecFailure`] naming the failing stage and `key`, or
    /// [`ArrayError::CorruptChunk`] if the decoded size is not `decoded_size`.
    pub fn decode(
        &self,
        bytes: Vec<u8>,
        decoded_size: usize,
        key: &StoreKey,
    ) -> Result<Vec<u8>, ArrayError> {
        let mut bytes = bytes;
        for stage in self.compressor.iter().chain(self.filters.iter().rev()) {
            bytes = stage
                .codec
                .decode(bytes, decoded_size)
                .map_err(|err| stage.failure(key, err))?;
        }
        if bytes.len() == decoded_size {
            Ok(bytes)
        } else {
            Err(ArrayError::CorruptChunk {
                key: key.clone(),
                size: bytes.len(),
                expected: decoded_size,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug)]
    struct RecordingCodec {
        id: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl CodecTraits for RecordingCodec {
        fn create_metadata(&self) -> CodecMetadata {
            CodecMetadata::new(self.id.clone(), Map::new())
        }

        fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
            self.log.lock().unwrap().push(format!("encode {}", self.id));
            Ok(decoded_value.to_vec())
        }

        fn decode(&self, encoded_value: Vec<u8>, _decoded_size: usize) -> Result<Vec<u8>, CodecError> {
            self.log.lock().unwrap().push(format!("decode {}", self.id));
            if self.id == "truncate" {
                Ok(encoded_value[1..].to_vec())
            } else {
                Ok(encoded_value)
            }
        }
    }

    fn registry(log: &Arc<Mutex<Vec<String>>>) -> CodecRegistry {
        let mut registry = CodecRegistry::new();
        for id in ["f1", "f2", "z", "truncate"] {
            let log = log.clone();
            registry.register(id, move |metadata| {
                Ok(Arc::new(RecordingCodec {
                    id: metadata.id().to_string(),
                    log: log.clone(),
                }) as Arc<dyn CodecTraits>)
            });
        }
        registry
    }

    #[test]
    fn codec_metadata_v2() {
        let json = serde_json::json!({"id": "blosc", "cname": "lz4", "typesize": 4, "num_threads": 2});
        let metadata = CodecMetadata::from_v2_json(&json).unwrap();
        assert_eq!(metadata.id(), "blosc");
        assert_eq!(metadata.to_v2_json(), serde_json::json!({"id": "blosc", "cname": "lz4"}));
        assert!(CodecMetadata::from_v2_json(&serde_json::json!({"level": 1})).is_err());
    }

    #[test]
    fn codec_metadata_v3() {
        let json = serde_json::json!({
            "codec": "https://purl.org/zarr/spec/codec/gzip/1.0",
            "configuration": {"level": 5}
        });
        let metadata = CodecMetadata::from_v3_json(&json).unwrap();
        assert_eq!(metadata.id(), "gzip");
        assert_eq!(metadata.to_v3_json(), json);
        assert!(CodecMetadata::from_v3_json(&serde_json::json!({"codec": "gzip"})).is_err());
    }

    #[test]
    fn codec_pipeline_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&log);
        let pipeline = CodecPipeline::new(
            &registry,
            Some(CodecMetadata::new("z", Map::new())),
            vec![
                CodecMetadata::new("f1", Map::new()),
                CodecMetadata::new("f2", Map::new()),
            ],
        )
        .unwrap();
        let key = StoreKey::new("0.0").unwrap();
        let encoded = pipeline.encode(&[1, 2, 3], &key).unwrap();
        let decoded = pipeline.decode(encoded.into_owned(), 3, &key).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["encode f1", "encode f2", "encode z", "decode z", "decode f2", "decode f1"]
        );
    }

    #[test]
    fn codec_pipeline_errors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&log);
        let err = CodecPipeline::new(&registry, Some(CodecMetadata::new("unknown", Map::new())), vec![])
            .unwrap_err();
        assert!(matches!(err, ArrayError::CodecFailure { ref stage, .. } if stage == "unknown"));

        let pipeline =
            CodecPipeline::new(&registry, Some(CodecMetadata::new("truncate", Map::new())), vec![])
                .unwrap();
        let key = StoreKey::new("1").unwrap();
        let err = pipeline.decode(vec![0; 4], 4, &key).unwrap_err();
        assert!(matches!(err, ArrayError::CorruptChunk { size: 3, expected: 4, .. }));
    }

    #[test]
    fn codec_registry_registered() {
        let registry = CodecRegistry::with_registered_codecs();
        #[cfg(feature = "gzip")]
        assert!(registry.contains("gzip") && registry.contains("zlib"));
        #[cfg(feature = "zstd")]
        assert!(registry.contains("zstd"));
        assert_eq!(registry.contains("blosc"), cfg!(feature = "blosc"));
        assert!(registry.contains("delta"));
        assert!(!registry.contains("lzma"));
    }
}
