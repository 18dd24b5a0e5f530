//! The `delta` filter.
//!
//! Each element is replaced by its difference with the previous element, which helps a compressor on slowly varying data.
//! The configuration is `{"dtype": "<i4"}`, the native type of the elements.
//! `astype`, if present, must equal `dtype`.
//! Integer differences wrap around.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::plugin::PluginCreateError;

use super::{CodecError, CodecMetadata, CodecPlugin, CodecTraits};

const IDENTIFIER: &str = "delta";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, create_codec_delta)
}

fn create_codec_delta(metadata: &CodecMetadata) -> Result<Arc<dyn CodecTraits>, PluginCreateError> {
    let configuration: DeltaCodecConfiguration = metadata.to_configuration(IDENTIFIER)?;
    if let Some(astype) = &configuration.astype {
        if *astype != configuration.dtype {
            return Err(PluginCreateError::Other(format!(
                "delta astype {astype} differs from dtype {}",
                configuration.dtype
            )));
        }
    }
    Ok(Arc::new(DeltaCodec::new(&configuration.dtype)?))
}

/// Configuration parameters for the `delta` filter.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
struct DeltaCodecConfiguration {
    dtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    astype: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DeltaType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

/// Apply `$op` in place to the elements of `$bytes`, read as `$ty` in the given byte order.
macro_rules! delta_elements {
    ($bytes:expr, $ty:ty, $big_endian:expr, $op:ident) => {{
        const SIZE: usize = std::mem::size_of::<$ty>();
        let read = |bytes: &[u8]| -> $ty {
            let mut array = [0u8; SIZE];
            array.copy_from_slice(bytes);
            if $big_endian {
                <$ty>::from_be_bytes(array)
            } else {
                <$ty>::from_le_bytes(array)
            }
        };
        let write = |value: $ty| -> [u8; SIZE] {
            if $big_endian {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            }
        };
        let mut previous: Option<$ty> = None;
        for element in $bytes.chunks_exact_mut(SIZE) {
            let value = read(element);
            let (output, next) = match previous {
                None => (value, value),
                Some(previous) => $op!(value, previous),
            };
            element.copy_from_slice(&write(output));
            previous = Some(next);
        }
    }};
}

// (difference, previous input)
macro_rules! encode_int {
    ($value:expr, $previous:expr) => {
        ($value.wrapping_sub($previous), $value)
    };
}

// (sum, previous output)
macro_rules! decode_int {
    ($value:expr, $previous:expr) => {{
        let sum = $value.wrapping_add($previous);
        (sum, sum)
    }};
}

macro_rules! encode_float {
    ($value:expr, $previous:expr) => {
        ($value - $previous, $value)
    };
}

macro_rules! decode_float {
    ($value:expr, $previous:expr) => {{
        let sum = $value + $previous;
        (sum, sum)
    }};
}

/// A `delta` filter implementation.
#[derive(Clone, Debug)]
pub struct DeltaCodec {
    dtype: String,
    delta_type: DeltaType,
    big_endian: bool,
}

impl DeltaCodec {
    /// Create a new `delta` filter for elements of the native type `dtype`, e.g. `<i4`.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if `dtype` is not a 1, 2, 4 or 8 byte integer or a 4 or 8 byte float.
    pub fn new(dtype: &str) -> Result<Self, PluginCreateError> {
        let (big_endian, token) = match dtype.as_bytes().first() {
            Some(b'>') => (true, &dtype[1..]),
            Some(b'<' | b'|' | b'=') => (false, &dtype[1..]),
            _ => (false, dtype),
        };
        let delta_type = match token {
            "i1" => DeltaType::I8,
            "u1" => DeltaType::U8,
            "i2" => DeltaType::I16,
            "u2" => DeltaType::U16,
            "i4" => DeltaType::I32,
            "u4" => DeltaType::U32,
            "i8" => DeltaType::I64,
            "u8" => DeltaType::U64,
            "f4" => DeltaType::F32,
            "f8" => DeltaType::F64,
            _ => {
                return Err(PluginCreateError::Other(format!(
                    "delta dtype {dtype} is not supported"
                )))
            }
        };
        Ok(Self {
            dtype: dtype.to_string(),
            delta_type,
            big_endian,
        })
    }

    const fn element_size(&self) -> usize {
        match self.delta_type {
            DeltaType::I8 | DeltaType::U8 => 1,
            DeltaType::I16 | DeltaType::U16 => 2,
            DeltaType::I32 | DeltaType::U32 | DeltaType::F32 => 4,
            DeltaType::I64 | DeltaType::U64 | DeltaType::F64 => 8,
        }
    }

    fn check_size(&self, bytes: &[u8]) -> Result<(), CodecError> {
        if bytes.len() % self.element_size() == 0 {
            Ok(())
        } else {
            Err(CodecError::Other(format!(
                "{} bytes is not a multiple of the {} element size",
                bytes.len(),
                self.dtype
            )))
        }
    }
}

impl CodecTraits for DeltaCodec {
    fn create_metadata(&self) -> CodecMetadata {
        let configuration = DeltaCodecConfiguration {
            dtype: self.dtype.clone(),
            astype: None,
        };
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, serde_json::Map::new()))
    }

    fn encode(&self, decoded_value: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.check_size(decoded_value)?;
        let mut bytes = decoded_value.to_vec();
        let big_endian = self.big_endian;
        match self.delta_type {
            DeltaType::I8 => delta_elements!(bytes, i8, big_endian, encode_int),
            DeltaType::U8 => delta_elements!(bytes, u8, big_endian, encode_int),
            DeltaType::I16 => delta_elements!(bytes, i16, big_endian, encode_int),
            DeltaType::U16 => delta_elements!(bytes, u16, big_endian, encode_int),
            DeltaType::I32 => delta_elements!(bytes, i32, big_endian, encode_int),
            DeltaType::U32 => delta_elements!(bytes, u32, big_endian, encode_int),
            DeltaType::I64 => delta_elements!(bytes, i64, big_endian, encode_int),
            DeltaType::U64 => delta_elements!(bytes, u64, big_endian, encode_int),
            DeltaType::F32 => delta_elements!(bytes, f32, big_endian, encode_float),
            DeltaType::F64 => delta_elements!(bytes, f64, big_endian, encode_float),
        }
        Ok(bytes)
    }

    fn decode(&self, encoded_value: Vec<u8>, _decoded_size: usize) -> Result<Vec<u8>, CodecError> {
        self.check_size(&encoded_value)?;
        let mut bytes = encoded_value;
        let big_endian = self.big_endian;
        match self.delta_type {
            DeltaType::I8 => delta_elements!(bytes, i8, big_endian, decode_int),
            DeltaType::U8 => delta_elements!(bytes, u8, big_endian, decode_int),
            DeltaType::I16 => delta_elements!(bytes, i16, big_endian, decode_int),
            DeltaType::U16 => delta_elements!(bytes, u16, big_endian, decode_int),
            DeltaType::I32 => delta_elements!(bytes, i32, big_endian, decode_int),
            DeltaType::U32 => delta_elements!(bytes, u32, big_endian, decode_int),
            DeltaType::I64 => delta_elements!(bytes, i64, big_endian, decode_int),
            DeltaType::U64 => delta_elements!(bytes, u64, big_endian, decode_int),
            DeltaType::F32 => delta_elements!(bytes, f32, big_endian, decode_float),
            DeltaType::F64 => delta_elements!(bytes, f64, big_endian, decode_float),
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::array::codec::CodecRegistry;

    #[test]
    fn codec_delta_integers() {
        let codec = DeltaCodec::new("<i2").unwrap();
        let elements: [i16; 5] = [10, 12, 9, i16::MAX, i16::MIN];
        let bytes: Vec<u8> = elements.iter().flat_map(|value| value.to_le_bytes()).collect();
        let encoded = codec.encode(&bytes).unwrap();
        let differences: Vec<i16> = encoded
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(differences, vec![10, 2, -3, i16::MAX - 9, 1]);
        assert_eq!(codec.decode(encoded, bytes.len()).unwrap(), bytes);
    }

    #[test]
    fn codec_delta_big_endian_float() {
        let codec = DeltaCodec::new(">f8").unwrap();
        let elements = [1.5f64, 2.0, -0.5];
        let bytes: Vec<u8> = elements.iter().flat_map(|value| value.to_be_bytes()).collect();
        let encoded = codec.encode(&bytes).unwrap();
        assert_eq!(encoded[8..16], 0.5f64.to_be_bytes());
        assert_eq!(encoded[16..], (-2.5f64).to_be_bytes());
        assert_eq!(codec.decode(encoded, bytes.len()).unwrap(), bytes);
    }

    #[test]
    fn codec_delta_configuration() {
        let registry = CodecRegistry::with_registered_codecs();
        let metadata = CodecMetadata::from_v2_json(&json!({"id": "delta", "dtype": "<u4"})).unwrap();
        let codec = registry.create(&metadata).unwrap();
        assert_eq!(codec.create_metadata(), metadata);
        assert!(codec.encode(&[0, 1, 2]).is_err());

        let metadata =
            CodecMetadata::from_v2_json(&json!({"id": "delta", "dtype": "<i4", "astype": "<i2"}))
                .unwrap();
        assert!(registry.create(&metadata).is_err());
        let metadata = CodecMetadata::from_v2_json(&json!({"id": "delta", "dtype": "<c8"})).unwrap();
        assert!(registry.create(&metadata).is_err());
        let metadata = CodecMetadata::from_v2_json(&json!({"id": "delta"})).unwrap();
        assert!(registry.create(&metadata).is_err());
    }
}
