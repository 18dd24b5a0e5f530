use serde_json::Value as JsonValue;

use super::{
    align_offset, CompoundComponent, CompoundType, DataType, DtypeElt, NativeType, NumericType,
    UnsupportedDataTypeError,
};

/// The native encoding of new string arrays.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StringFormat {
    /// Fixed-width byte strings (`|S{n}`).
    #[default]
    Ascii,
    /// Fixed-width UCS-4 strings (`<U{n}`).
    Unicode,
}

/// A native dtype resolved to its logical data type and per-field conversion descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeDtype {
    data_type: DataType,
    elts: Vec<DtypeElt>,
}

/// A parsed native type token such as `<f4`.
struct Token {
    endianness: Option<char>,
    kind: char,
    size: usize,
}

fn needs_byte_swapping(endianness: Option<char>, kind: char, size: usize) -> bool {
    let applies = (size > 1 && kind != 'S') || kind == 'U';
    applies
        && match endianness {
            Some('<') => cfg!(target_endian = "big"),
            Some('>') => cfg!(target_endian = "little"),
            _ => false,
        }
}

fn unsupported(dtype: &JsonValue) -> UnsupportedDataTypeError {
    UnsupportedDataTypeError::from(dtype.to_string())
}

fn token_v2(string: &str) -> Option<Token> {
    let mut chars = string.chars();
    let endianness = chars.next()?;
    let kind = chars.next()?;
    let size = chars.as_str().parse::<usize>().ok()?;
    matches!(endianness, '<' | '>' | '|').then_some(Token {
        endianness: Some(endianness),
        kind,
        size,
    })
}

fn token_v3(string: &str) -> Option<Token> {
    match string {
        "bool" => Some(Token {
            endianness: None,
            kind: 'b',
            size: 1,
        }),
        "u1" | "i1" => Some(Token {
            endianness: None,
            kind: string.chars().next()?,
            size: 1,
        }),
        _ => {
            let token = token_v2(string)?;
            // complex and string types have no v3 encoding
            matches!(token.kind, 'b' | 'i' | 'u' | 'f').then_some(token)
        }
    }
}

/// The alignment of a native dtype within a compound.
fn alignment(dtype: &JsonValue) -> usize {
    match dtype {
        JsonValue::String(string) => token_v2(string).map_or(1, |token| match token.kind {
            'S' | 'U' => std::mem::size_of::<usize>(),
            'c' => token.size / 2,
            _ => token.size.max(1),
        }),
        JsonValue::Array(fields) => fields
            .iter()
            .filter_map(|field| field.as_array().and_then(|field| field.get(1)))
            .map(alignment)
            .max()
            .unwrap_or(1),
        _ => 1,
    }
}

fn leaf(token: &Token, elts: &mut Vec<DtypeElt>) -> Option<DataType> {
    let (native_type, approx, data_type) = match (token.kind, token.size) {
        ('b', 1) => (NativeType::Boolean, false, NumericType::UInt8.into()),
        ('u', 1) => (NativeType::UnsignedInt, false, NumericType::UInt8.into()),
        ('i', 1) => (NativeType::SignedInt, true, NumericType::Int16.into()),
        ('i', 2) => (NativeType::SignedInt, false, NumericType::Int16.into()),
        ('i', 4) => (NativeType::SignedInt, false, NumericType::Int32.into()),
        ('i', 8) => (NativeType::SignedInt, true, NumericType::Float64.into()),
        ('u', 2) => (NativeType::UnsignedInt, false, NumericType::UInt16.into()),
        ('u', 4) => (NativeType::UnsignedInt, false, NumericType::UInt32.into()),
        ('u', 8) => (NativeType::UnsignedInt, true, NumericType::Float64.into()),
        ('f', 2) => (NativeType::IeeeFloat, true, NumericType::Float32.into()),
        ('f', 4) => (NativeType::IeeeFloat, false, NumericType::Float32.into()),
        ('f', 8) => (NativeType::IeeeFloat, false, NumericType::Float64.into()),
        ('c', 8) => (NativeType::ComplexIeeeFloat, false, NumericType::Complex64.into()),
        ('c', 16) => (NativeType::ComplexIeeeFloat, false, NumericType::Complex128.into()),
        ('S', 1..=999) => (
            NativeType::StringAscii,
            false,
            DataType::String {
                max_length: Some(token.size),
            },
        ),
        ('U', 1..=999) => (
            NativeType::StringUnicode,
            false,
            DataType::String {
                max_length: Some(token.size),
            },
        ),
        _ => return None,
    };
    let native_size = if token.kind == 'U' {
        token.size * 4
    } else {
        token.size
    };
    let native_offset = super::dtype_elt::native_element_size(elts);
    elts.push(DtypeElt::new(
        native_type,
        native_offset,
        native_size,
        needs_byte_swapping(token.endianness, token.kind, token.size),
        approx,
        data_type.clone(),
    ));
    Some(data_type)
}

fn parse_v2_recursive(dtype: &JsonValue, elts: &mut Vec<DtypeElt>) -> Option<DataType> {
    match dtype {
        JsonValue::String(string) => leaf(&token_v2(string)?, elts),
        JsonValue::Array(fields) if !fields.is_empty() => {
            let mut offset = 0;
            let mut alignment_max = 1;
            let mut components = Vec::with_capacity(fields.len());
            for field in fields {
                let [JsonValue::String(name), field_dtype] = field.as_array()?.as_slice() else {
                    return None;
                };
                let data_type = parse_v2_recursive(field_dtype, elts)?;
                let alignment = alignment(field_dtype);
                alignment_max = alignment_max.max(alignment);
                offset = align_offset(offset, alignment);
                let size = data_type.size();
                components.push(CompoundComponent::new(name.clone(), offset, data_type));
                offset += size;
            }
            CompoundType::new(align_offset(offset, alignment_max), components)
                .ok()
                .map(DataType::Compound)
        }
        _ => None,
    }
}

/// Assign logical offsets to `elts` from the layout of `data_type`, in depth-first leaf order.
fn set_logical_offsets<'a>(
    data_type: &DataType,
    base_offset: usize,
    elts: &mut impl Iterator<Item = &'a mut DtypeElt>,
) {
    if let DataType::Compound(compound) = data_type {
        for component in compound.components() {
            set_logical_offsets(
                component.data_type(),
                base_offset + component.offset(),
                elts,
            );
        }
    } else if let Some(elt) = elts.next() {
        elt.set_logical_offset(base_offset);
    }
}

impl NativeDtype {
    fn new(data_type: DataType, mut elts: Vec<DtypeElt>) -> Self {
        set_logical_offsets(&data_type, 0, &mut elts.iter_mut());
        Self { data_type, elts }
    }

    /// Parse a Zarr V2 `dtype`: a type token string such as `<i4`, `|S10` or `>U8`, or a list of `[name, dtype]` fields.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if the dtype is malformed or has an unsupported token.
    pub fn parse_v2(dtype: &JsonValue) -> Result<Self, UnsupportedDataTypeError> {
        let mut elts = Vec::new();
        let data_type = parse_v2_recursive(dtype, &mut elts).ok_or_else(|| unsupported(dtype))?;
        Ok(Self::new(data_type, elts))
    }

    /// Parse a V3 `data_type`, which is limited to booleans, integers and floats.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if the data type is not supported.
    pub fn parse_v3(dtype: &JsonValue) -> Result<Self, UnsupportedDataTypeError> {
        let mut elts = Vec::new();
        let data_type = dtype
            .as_str()
            .and_then(token_v3)
            .and_then(|token| leaf(&token, &mut elts))
            .ok_or_else(|| unsupported(dtype))?;
        Ok(Self::new(data_type, elts))
    }

    /// Build the Zarr V2 `dtype` of a new array with logical `data_type`.
    ///
    /// Multi-byte types are little-endian. The compound layout of `data_type` is preserved as its logical layout.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if `data_type` has no native encoding, such as an unbounded string or a 64-bit integer.
    pub fn build_v2(
        data_type: &DataType,
        string_format: StringFormat,
    ) -> Result<(JsonValue, Self), UnsupportedDataTypeError> {
        let dtype = dtype_v2(data_type, string_format)?;
        let parsed = Self::parse_v2(&dtype)?;
        Ok((dtype, Self::new(data_type.clone(), parsed.elts)))
    }

    /// Build the V3 `data_type` of a new array with numeric logical `data_type`.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if `data_type` is not a non-complex numeric type with a native encoding.
    pub fn build_v3(data_type: &DataType) -> Result<(JsonValue, Self), UnsupportedDataTypeError> {
        let dtype = match data_type.numeric_type() {
            Some(NumericType::UInt8) => "u1",
            Some(NumericType::Int16) => "<i2",
            Some(NumericType::UInt16) => "<u2",
            Some(NumericType::Int32) => "<i4",
            Some(NumericType::UInt32) => "<u4",
            Some(NumericType::Float32) => "<f4",
            Some(NumericType::Float64) => "<f8",
            _ => return Err(UnsupportedDataTypeError::from(data_type.to_string())),
        };
        let dtype = JsonValue::String(dtype.to_string());
        let parsed = Self::parse_v3(&dtype)?;
        Ok((dtype, parsed))
    }

    /// The logical data type.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// The per-field conversion descriptors.
    #[must_use]
    pub fn elts(&self) -> &[DtypeElt] {
        &self.elts
    }

    /// The size of a native element in bytes.
    #[must_use]
    pub fn native_size(&self) -> usize {
        super::dtype_elt::native_element_size(&self.elts)
    }

    /// The size of the numeric parts of an element: the element size of a number, half of it for a complex number,
    /// and `1` for strings and compound types.
    #[must_use]
    pub fn component_size(&self) -> usize {
        match self.elts.as_slice() {
            [elt] => match elt.native_type() {
                NativeType::ComplexIeeeFloat => elt.native_size() / 2,
                NativeType::StringAscii | NativeType::StringUnicode => 1,
                _ => elt.native_size(),
            },
            _ => 1,
        }
    }

    /// Returns true if converting between the native and logical encodings is a plain copy.
    #[must_use]
    pub fn is_plain_copy(&self) -> bool {
        !self.data_type.has_string()
            && super::dtype_elt::is_plain_copy(&self.elts, self.data_type.size())
    }
}

fn dtype_v2(
    data_type: &DataType,
    string_format: StringFormat,
) -> Result<JsonValue, UnsupportedDataTypeError> {
    let token = match data_type {
        DataType::Numeric(numeric_type) => match numeric_type {
            NumericType::UInt8 => "|u1".to_string(),
            NumericType::Int16 => "<i2".to_string(),
            NumericType::UInt16 => "<u2".to_string(),
            NumericType::Int32 => "<i4".to_string(),
            NumericType::UInt32 => "<u4".to_string(),
            NumericType::Float32 => "<f4".to_string(),
            NumericType::Float64 => "<f8".to_string(),
            NumericType::Complex64 => "<c8".to_string(),
            NumericType::Complex128 => "<c16".to_string(),
            NumericType::Int8 | NumericType::UInt64 | NumericType::Int64 => {
                return Err(UnsupportedDataTypeError::from(data_type.to_string()))
            }
        },
        DataType::String {
            max_length: Some(max_length),
        } if *max_length > 0 => match string_format {
            StringFormat::Ascii => format!("|S{max_length}"),
            StringFormat::Unicode => format!("<U{max_length}"),
        },
        DataType::String { .. } => {
            return Err(UnsupportedDataTypeError::from(format!(
                "{data_type} (unbounded strings have no native encoding)"
            )))
        }
        DataType::Compound(compound) => {
            return compound
                .components()
                .iter()
                .map(|component| {
                    Ok(serde_json::json!([
                        component.name(),
                        dtype_v2(component.data_type(), string_format)?
                    ]))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array);
        }
    };
    Ok(JsonValue::String(token))
}
