//! The `gzip` and `zlib` codecs.
//!
//! Both apply deflate compression with `flate2`, with a gzip or a zlib header respectively.
//! The configuration is `{"level": <0-9>}`.

use std::{
    io::{Cursor, Read},
    sync::Arc,
};

use flate2::bufread::{GzDecoder, GzEncoder, ZlibDecoder, ZlibEncoder};
use serde::{Deserialize, Serialize};

use crate::plugin::PluginCreateError;

use super::{CodecError, CodecMetadata, CodecPlugin, CodecTraits};

const GZIP_IDENTIFIER: &str = "gzip";
const ZLIB_IDENTIFIER: &str = "zlib";

// Register the codecs.
inventory::submit! {
    CodecPlugin::new(GZIP_IDENTIFIER, create_codec_gzip)
}
inventory::submit! {
    CodecPlugin::new(ZLIB_IDENTIFIER, create_codec_zlib)
}

fn create_codec_gzip(metadata: &CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError> {
    let configuration: DeflateConfiguration = metadata.to_configuration(GZIP_IDENTIFIER)?;
    Ok(Arc::new(GzipCodec::new(configuration.level)?))
}

fn create_codec_zlib(metadata: &CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError> {
    let configuration: DeflateConfiguration = metadata.to_configuration(ZLIB_IDENTIFIER)?;
    Ok(Arc::new(ZlibCodec::new(configuration.level)?))
}

const fn default_level() -> u32 {
    6
}

/// Configuration parameters for the `gzip` and `zlib` codecs.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
struct DeflateConfiguration {
    #[serde(default = "default_level")]
    level: u32,
}

fn compression(level: u32) -> Result<flate2::Compression, PluginCreateError> {
    if level <= 9 {
        Ok(flate2::Compression::new(level))
    } else {
        Err(PluginCreateError::Other(format!(
            "deflate compression level {level} is not in [0, 9]"
        )))
    }
}

fn deflate_metadata(identifier: &str, compression: flate2::Compression) -> CodecMetadata {
    let mut configuration = serde_json::Map::new();
    configuration.insert("level".to_string(), compression.level().into());
    CodecMetadata::new(identifier, configuration)
}

/// A `gzip` codec implementation.
#[derive(Clone, Debug)]
pub struct GzipCodec {
    compression: flate2::Compression,
}

impl GzipCodec {
    /// Create a new `gzip` codec.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if `level` is not in `[0, 9]`.
    pub fn new(level: u32) -> Result<Self, PluginCreateError> {
        Ok(Self {
            compression: compression(level)?,
        })
    }
}

impl CodecTraits for GzipCodec {
    fn create_metadata(&self) -> CodecMetadata {
        deflate_metadata(GZIP_IDENTIFIER, self.compression)
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(decoded_value, self.compression);
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(&self, encoded_value: Vec<u8>, decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::with_capacity(decoded_size);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// A `zlib` codec implementation.
#[derive(Clone, Debug)]
pub struct ZlibCodec {
    compression: flate2::Compression,
}

impl ZlibCodec {
    /// Create a new `zlib` codec.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if `level` is not in `[0, 9]`.
    pub fn new(level: u32) -> Result<Self, PluginCreateError> {
        Ok(Self {
            compression: compression(level)?,
        })
    }
}

impl CodecTraits for ZlibCodec {
    fn create_metadata(&self) -> CodecMetadata {
        deflate_metadata(ZLIB_IDENTIFIER, self.compression)
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(decoded_value, self.compression);
        let mut out: Vec<u8> = Vec::new();
        encoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decode(&self, encoded_value: Vec<u8>, decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut decoder = ZlibDecoder::new(Cursor::new(encoded_value));
        let mut out: Vec<u8> = Vec::with_capacity(decoded_size);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::array::codec::CodecRegistry;

    fn metadata(json: serde_json::Value) -> CodecMetadata {
        CodecMetadata::from_v2_json(&json).unwrap()
    }

    #[test]
    fn codec_gzip_round_trip() {
        let bytes: Vec<u8> = (0..128u8).collect();
        let codec = GzipCodec::new(5).unwrap();
        let encoded = codec.encode(&bytes).unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
        assert_eq!(codec.decode(encoded, bytes.len()).unwrap(), bytes);
    }

    #[test]
    fn codec_zlib_round_trip() {
        let bytes: Vec<u8> = (0..128u8).rev().collect();
        let codec = ZlibCodec::new(1).unwrap();
        let encoded = codec.encode(&bytes).unwrap();
        assert_eq!(codec.decode(encoded, bytes.len()).unwrap(), bytes);
    }

    #[test]
    fn codec_gzip_configuration() {
        let registry = CodecRegistry::with_registered_codecs();
        let codec = registry
            .create(&metadata(json!({"id": "gzip", "level": 1})))
            .unwrap();
        assert_eq!(
            codec.create_metadata().to_v2_json(),
            json!({"id": "gzip", "level": 1})
        );
        let codec = registry.create(&metadata(json!({"id": "zlib"}))).unwrap();
        assert_eq!(
            codec.create_metadata().to_v2_json(),
            json!({"id": "zlib", "level": 6})
        );
        assert!(registry
            .create(&metadata(json!({"id": "gzip", "level": 10})))
            .is_err());
        assert!(registry
            .create(&metadata(json!({"id": "gzip", "level": -1})))
            .is_err());
    }

    #[test]
    fn codec_gzip_corrupt() {
        let codec = GzipCodec::new(5).unwrap();
        assert!(codec.decode(vec![1, 2, 3], 3).is_err());
    }
}
