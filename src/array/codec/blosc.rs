//! The `blosc` codec.
//!
//! It uses the [blosc](https://www.blosc.org/) container format.
//!
//! The configuration is `{"cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0}`:
//!  - `cname` is one of `blosclz`, `lz4`, `lz4hc`, `snappy`, `zlib` or `zstd`,
//!  - `clevel` is from 0 to 9,
//!  - `shuffle` is `0` (none), `1` (byte), `2` (bit) or `-1` (bit for 1 byte elements, byte otherwise),
//!  - `blocksize` is chosen automatically if `0`.
//!
//! The shuffle element size is the `typesize` configuration key, which arrays set from their data type and is not written to metadata.

use std::{
    ffi::{c_int, c_void, CString},
    sync::Arc,
};

use blosc_sys::{
    blosc_cbuffer_validate, blosc_compress_ctx, blosc_decompress_ctx, blosc_get_complib_info,
};
use serde::{Deserialize, Serialize};

use crate::plugin::PluginCreateError;

use super::{CodecError, CodecMetadata, CodecPlugin, CodecTraits};

const IDENTIFIER: &str = "blosc";

/// The size of a blosc header, the most that compression can add to the input.
const BLOSC_MAX_OVERHEAD: usize = 16;

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, create_codec_blosc)
}

fn create_codec_blosc(metadata: &CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError> {
    let configuration: BloscCodecConfiguration = metadata.to_configuration(IDENTIFIER)?;
    let typesize = metadata
        .configuration()
        .get("typesize")
        .and_then(serde_json::Value::as_u64)
        .map_or(1, |typesize| usize::try_from(typesize).unwrap_or(1));
    Ok(Arc::new(BloscCodec::new(configuration, typesize)?))
}

const fn default_clevel() -> u8 {
    5
}

const fn default_shuffle() -> i8 {
    1
}

/// Configuration parameters for the `blosc` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct BloscCodecConfiguration {
    /// The compressor.
    pub cname: String,
    /// The compression level.
    #[serde(default = "default_clevel")]
    pub clevel: u8,
    /// The shuffle mode.
    #[serde(default = "default_shuffle")]
    pub shuffle: i8,
    /// The compression block size, automatic if `0`.
    #[serde(default)]
    pub blocksize: usize,
}

/// A `blosc` codec implementation.
#[derive(Clone, Debug)]
pub struct BloscCodec {
    configuration: BloscCodecConfiguration,
    cname: CString,
    typesize: usize,
}

impl BloscCodec {
    /// Create a new `blosc` codec shuffling elements of `typesize` bytes.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if the compressor is not supported, or the level or shuffle mode is out of range.
    pub fn new(
        configuration: BloscCodecConfiguration,
        typesize: usize,
    ) -> Result<Self, PluginCreateError> {
        if configuration.clevel > 9 {
            return Err(PluginCreateError::Other(format!(
                "blosc clevel {} is not in 0..=9",
                configuration.clevel
            )));
        }
        if !(-1..=2).contains(&configuration.shuffle) {
            return Err(PluginCreateError::Other(format!(
                "blosc shuffle {} is not supported",
                configuration.shuffle
            )));
        }
        let cname = CString::new(configuration.cname.as_str())
            .map_err(|_| PluginCreateError::Other("invalid blosc cname".to_string()))?;

        // Check that the compressor is available
        let support = unsafe {
            blosc_get_complib_info(
                cname.as_ptr(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if support < 0 {
            return Err(PluginCreateError::Other(format!(
                "compressor {} is not supported",
                configuration.cname
            )));
        }

        Ok(Self {
            configuration,
            cname,
            typesize: typesize.max(1),
        })
    }

    fn shuffle_mode(&self) -> c_int {
        match self.configuration.shuffle {
            -1 if self.typesize == 1 => 2,
            -1 => 1,
            shuffle => c_int::from(shuffle),
        }
    }
}

impl CodecTraits for BloscCodec {
    fn create_metadata(&self) -> CodecMetadata {
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &self.configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, serde_json::Map::new()))
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        let destsize = decoded_value.len() + BLOSC_MAX_OVERHEAD;
        let mut dest: Vec<u8> = Vec::with_capacity(destsize);
        let size = unsafe {
            blosc_compress_ctx(
                c_int::from(self.configuration.clevel),
                self.shuffle_mode(),
                self.typesize,
                decoded_value.len(),
                decoded_value.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                destsize,
                self.cname.as_ptr(),
                self.configuration.blocksize,
                1,
            )
        };
        match usize::try_from(size) {
            Ok(size) if size > 0 => {
                unsafe { dest.set_len(size) };
                Ok(dest)
            }
            _ => Err(CodecError::Other(format!(
                "blosc compression failed with code {size}"
            ))),
        }
    }

    fn decode(&self, encoded_value: Vec<u8>, _decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        let mut destsize: usize = 0;
        let valid = unsafe {
            blosc_cbuffer_validate(
                encoded_value.as_ptr().cast::<c_void>(),
                encoded_value.len(),
                std::ptr::addr_of_mut!(destsize),
            )
        } == 0;
        if !valid {
            return Err(CodecError::from("blosc encoded value is invalid"));
        }
        let mut dest: Vec<u8> = Vec::with_capacity(destsize);
        let size = unsafe {
            blosc_decompress_ctx(
                encoded_value.as_ptr().cast::<c_void>(),
                dest.as_mut_ptr().cast::<c_void>(),
                destsize,
                1,
            )
        };
        match usize::try_from(size) {
            Ok(size) if size == destsize => {
                unsafe { dest.set_len(size) };
                Ok(dest)
            }
            _ => Err(CodecError::Other(format!(
                "blosc decompression failed with code {size}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::array::codec::CodecRegistry;

    fn configuration(json: serde_json::Value) -> BloscCodecConfiguration {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn codec_blosc_round_trip() {
        let elements: Vec<u16> = (0..512).collect();
        let bytes: Vec<u8> = elements.iter().flat_map(|value| value.to_le_bytes()).collect();
        for shuffle in [-1, 0, 1, 2] {
            let codec = BloscCodec::new(
                configuration(json!({"cname": "lz4", "clevel": 5, "shuffle": shuffle})),
                2,
            )
            .unwrap();
            let encoded = codec.encode(&bytes).unwrap();
            if shuffle != 0 {
                assert!(encoded.len() < bytes.len());
            }
            assert_eq!(codec.decode(encoded, bytes.len()).unwrap(), bytes);
        }
    }

    #[test]
    fn codec_blosc_configuration() {
        let registry = CodecRegistry::with_registered_codecs();
        let metadata = CodecMetadata::from_v2_json(
            &json!({"id": "blosc", "cname": "zstd", "clevel": 3, "shuffle": 2, "blocksize": 0, "typesize": 4}),
        )
        .unwrap();
        let codec = registry.create(&metadata).unwrap();
        assert_eq!(
            codec.create_metadata().to_v2_json(),
            json!({"id": "blosc", "cname": "zstd", "clevel": 3, "shuffle": 2, "blocksize": 0})
        );
        for invalid in [
            json!({"id": "blosc", "cname": "unknown"}),
            json!({"id": "blosc", "cname": "lz4", "clevel": 10}),
            json!({"id": "blosc", "cname": "lz4", "shuffle": 3}),
        ] {
            let metadata = CodecMetadata::from_v2_json(&invalid).unwrap();
            assert!(registry.create(&metadata).is_err());
        }
    }

    #[test]
    fn codec_blosc_corrupt() {
        let codec = BloscCodec::new(configuration(json!({"cname": "blosclz"})), 1).unwrap();
        assert!(codec.decode(vec![1, 2, 3], 16).is_err());
    }
}
