//! The `zstd` codec.
//!
//! The configuration is `{"level": <int>}`; `level` defaults to 1.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::plugin::PluginCreateError;

use super::{CodecError, CodecMetadata, CodecPlugin, CodecTraits};

const IDENTIFIER: &str = "zstd";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, create_codec_zstd)
}

fn create_codec_zstd(metadata: &CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError> {
    let configuration: ZstdCodecConfiguration = metadata.to_configuration(IDENTIFIER)?;
    Ok(Arc::new(ZstdCodec::new(configuration.level)))
}

const fn default_level() -> i32 {
    1
}

/// Configuration parameters for the `zstd` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
struct ZstdCodecConfiguration {
    #[serde(default = "default_level")]
    level: i32,
}

/// A `zstd` codec implementation.
#[derive(Clone, Debug)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Create a new `zstd` codec with a compression level.
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level }
    }
}

impl CodecTraits for ZstdCodec {
    fn create_metadata(&self) -> CodecMetadata {
        let configuration = ZstdCodecConfiguration { level: self.level };
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, serde_json::Map::new()))
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(decoded_value, self.level).map_err(CodecError::IOError)
    }

    fn decode(&self, encoded_value: Vec<u8>, _decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(encoded_value.as_slice()).map_err(CodecError::IOError)
    }
}
