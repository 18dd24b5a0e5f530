use half::f16;

use crate::array::value::{Number, Value};

use super::{DataType, NumericType};

/// The largest integer magnitude below which every integer is exactly representable as a [`f64`].
const F64_EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53

/// The kind of a primitive field in the native (stored) encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// A one byte boolean.
    Boolean,
    /// An unsigned integer of 1, 2, 4 or 8 bytes.
    UnsignedInt,
    /// A signed integer of 1, 2, 4 or 8 bytes.
    SignedInt,
    /// An IEEE 754 float of 2, 4 or 8 bytes.
    IeeeFloat,
    /// A pair of IEEE 754 floats of 4 or 8 bytes each.
    ComplexIeeeFloat,
    /// A fixed-width, zero padded byte string.
    StringAscii,
    /// A fixed-width, zero padded UCS-4 string.
    StringUnicode,
}

/// Describes how one primitive field of an element is converted between its native and logical layouts.
///
/// An element of a compound type has one [`DtypeElt`] per leaf field, in depth-first component order.
/// Native offsets are packed, logical offsets follow the (aligned) logical layout of the data type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DtypeElt {
    native_type: NativeType,
    native_offset: usize,
    native_size: usize,
    need_byte_swapping: bool,
    is_approximation: bool,
    logical_type: DataType,
    logical_offset: usize,
    logical_size: usize,
}

/// Tracks the lossy conversion warnings already emitted for an array, so each is emitted at most once.
#[derive(Debug, Default)]
pub struct ConversionWarnings {
    float16_precision: bool,
    int64_precision: bool,
}

impl ConversionWarnings {
    fn float16_precision_lost(&mut self, value: f32) {
        if !self.float16_precision {
            self.float16_precision = true;
            log::warn!("value {value} cannot be exactly represented as a float16, precision has been lost");
        }
    }

    fn int64_precision_lost(&mut self, value: f64) {
        if !self.int64_precision {
            self.int64_precision = true;
            log::warn!("value {value} of an 8-byte integer element is not exactly representable as a float64, precision has been lost");
        }
    }
}

impl DtypeElt {
    /// Create a descriptor for a leaf field at `native_offset`.
    ///
    /// The logical offset is initially zero and is set when the enclosing layout is known.
    pub(crate) fn new(
        native_type: NativeType,
        native_offset: usize,
        native_size: usize,
        need_byte_swapping: bool,
        is_approximation: bool,
        logical_type: DataType,
    ) -> Self {
        let logical_size = logical_type.size();
        Self {
            native_type,
            native_offset,
            native_size,
            need_byte_swapping,
            is_approximation,
            logical_type,
            logical_offset: 0,
            logical_size,
        }
    }

    pub(crate) fn set_logical_offset(&mut self, logical_offset: usize) {
        self.logical_offset = logical_offset;
    }

    /// The native type.
    #[must_use]
    pub const fn native_type(&self) -> NativeType {
        self.native_type
    }

    /// The byte offset of the field in the native element.
    #[must_use]
    pub const fn native_offset(&self) -> usize {
        self.native_offset
    }

    /// The size of the field in the native element.
    #[must_use]
    pub const fn native_size(&self) -> usize {
        self.native_size
    }

    /// Returns true if the native byte order differs from the platform byte order.
    #[must_use]
    pub const fn need_byte_swapping(&self) -> bool {
        self.need_byte_swapping
    }

    /// Returns true if the logical type only approximates the native type.
    #[must_use]
    pub const fn is_approximation(&self) -> bool {
        self.is_approximation
    }

    /// The logical type of the field (numeric or string).
    #[must_use]
    pub const fn logical_type(&self) -> &DataType {
        &self.logical_type
    }

    /// The byte offset of the field in the logical element.
    #[must_use]
    pub const fn logical_offset(&self) -> usize {
        self.logical_offset
    }

    /// The size of the field in the logical element.
    #[must_use]
    pub const fn logical_size(&self) -> usize {
        self.logical_size
    }

    /// Returns true if decoding and encoding the field is a plain copy of its bytes.
    #[must_use]
    pub fn is_plain_copy(&self) -> bool {
        !self.need_byte_swapping
            && !self.is_approximation
            && self.native_size == self.logical_size
            && self.native_offset == self.logical_offset
            && !matches!(
                self.native_type,
                NativeType::StringAscii | NativeType::StringUnicode
            )
    }

    /// Copy the native field to a native-endian scratch buffer, swapping bytes per component if required.
    fn native_ne_bytes(&self, native: &[u8]) -> [u8; 16] {
        let mut bytes = [0; 16];
        let size = self.native_size;
        bytes[..size].copy_from_slice(&native[self.native_offset..self.native_offset + size]);
        if self.need_byte_swapping {
            swap_components(&mut bytes[..size], self.component_size());
        }
        bytes
    }

    fn component_size(&self) -> usize {
        match self.native_type {
            NativeType::ComplexIeeeFloat => self.native_size / 2,
            NativeType::StringUnicode => 4,
            _ => self.native_size,
        }
    }

    /// Decode a numeric field of a native element into its logical value.
    ///
    /// # Panics
    /// Panics if `native` does not hold the field.
    #[must_use]
    pub fn decode_number(&self, native: &[u8], warnings: &mut ConversionWarnings) -> Number {
        let bytes = self.native_ne_bytes(native);
        let bytes = &bytes[..];
        match (self.native_type, self.native_size) {
            (NativeType::Boolean | NativeType::UnsignedInt, 1) => Number::UInt8(bytes[0]),
            (NativeType::SignedInt, 1) => {
                Number::Int16(i16::from(i8::from_ne_bytes([bytes[0]])))
            }
            (NativeType::SignedInt, 2) => Number::from_ne_bytes(NumericType::Int16, bytes),
            (NativeType::SignedInt, 4) => Number::from_ne_bytes(NumericType::Int32, bytes),
            (NativeType::UnsignedInt, 2) => Number::from_ne_bytes(NumericType::UInt16, bytes),
            (NativeType::UnsignedInt, 4) => Number::from_ne_bytes(NumericType::UInt32, bytes),
            (NativeType::SignedInt, 8) => {
                let value = Number::from_ne_bytes(NumericType::Int64, bytes).to_f64();
                if value.abs() > F64_EXACT_INTEGER_LIMIT {
                    warnings.int64_precision_lost(value);
                }
                Number::Float64(value)
            }
            (NativeType::UnsignedInt, 8) => {
                let value = Number::from_ne_bytes(NumericType::UInt64, bytes).to_f64();
                if value > F64_EXACT_INTEGER_LIMIT {
                    warnings.int64_precision_lost(value);
                }
                Number::Float64(value)
            }
            (NativeType::IeeeFloat, 2) => {
                Number::Float32(f16::from_ne_bytes([bytes[0], bytes[1]]).to_f32())
            }
            (NativeType::IeeeFloat, 4) => Number::from_ne_bytes(NumericType::Float32, bytes),
            (NativeType::IeeeFloat, _) => Number::from_ne_bytes(NumericType::Float64, bytes),
            (NativeType::ComplexIeeeFloat, 8) => {
                Number::from_ne_bytes(NumericType::Complex64, bytes)
            }
            (NativeType::ComplexIeeeFloat, _) => {
                Number::from_ne_bytes(NumericType::Complex128, bytes)
            }
            _ => Number::zero(self.logical_type.numeric_type().unwrap_or(NumericType::UInt8)),
        }
    }

    /// Encode a logical number into the numeric field of a native element.
    ///
    /// The number is first converted to the logical type of the field.
    ///
    /// # Panics
    /// Panics if `native` does not hold the field.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode_number(
        &self,
        number: Number,
        native: &mut [u8],
        warnings: &mut ConversionWarnings,
    ) {
        let mut bytes = [0u8; 16];
        match (self.native_type, self.native_size) {
            (NativeType::Boolean | NativeType::UnsignedInt, 1) => {
                number.cast(NumericType::UInt8).write_ne_bytes(&mut bytes);
            }
            (NativeType::SignedInt, 1) => {
                number.cast(NumericType::Int8).write_ne_bytes(&mut bytes);
            }
            (NativeType::SignedInt, 2) => number.cast(NumericType::Int16).write_ne_bytes(&mut bytes),
            (NativeType::SignedInt, 4) => number.cast(NumericType::Int32).write_ne_bytes(&mut bytes),
            (NativeType::UnsignedInt, 2) => {
                number.cast(NumericType::UInt16).write_ne_bytes(&mut bytes);
            }
            (NativeType::UnsignedInt, 4) => {
                number.cast(NumericType::UInt32).write_ne_bytes(&mut bytes);
            }
            (NativeType::SignedInt | NativeType::UnsignedInt, 8) => {
                let value = number.to_f64();
                if value.abs() > F64_EXACT_INTEGER_LIMIT {
                    warnings.int64_precision_lost(value);
                }
                let target = if self.native_type == NativeType::SignedInt {
                    NumericType::Int64
                } else {
                    NumericType::UInt64
                };
                number.cast(target).write_ne_bytes(&mut bytes);
            }
            (NativeType::IeeeFloat, 2) => {
                let value = number.to_f64() as f32;
                let half = f16::from_f32(value);
                if !value.is_nan() && half.to_f32() != value {
                    warnings.float16_precision_lost(value);
                }
                bytes[..2].copy_from_slice(&half.to_ne_bytes());
            }
            (NativeType::IeeeFloat, 4) => {
                number.cast(NumericType::Float32).write_ne_bytes(&mut bytes);
            }
            (NativeType::IeeeFloat, _) => {
                number.cast(NumericType::Float64).write_ne_bytes(&mut bytes);
            }
            (NativeType::ComplexIeeeFloat, 8) => {
                number.cast(NumericType::Complex64).write_ne_bytes(&mut bytes);
            }
            (NativeType::ComplexIeeeFloat, _) => {
                number.cast(NumericType::Complex128).write_ne_bytes(&mut bytes);
            }
            _ => {}
        }
        let size = self.native_size;
        if self.need_byte_swapping {
            swap_components(&mut bytes[..size], self.component_size());
        }
        native[self.native_offset..self.native_offset + size].copy_from_slice(&bytes[..size]);
    }

    /// Decode a string field of a native element.
    ///
    /// The string ends at the first zero byte (or zero code point).
    ///
    /// # Panics
    /// Panics if `native` does not hold the field.
    #[must_use]
    pub fn decode_string(&self, native: &[u8]) -> String {
        let field = &native[self.native_offset..self.native_offset + self.native_size];
        if self.native_type == NativeType::StringUnicode {
            field
                .chunks_exact(4)
                .map(|code_point| {
                    let mut code_point = [code_point[0], code_point[1], code_point[2], code_point[3]];
                    if self.need_byte_swapping {
                        code_point.reverse();
                    }
                    u32::from_ne_bytes(code_point)
                })
                .take_while(|code_point| *code_point != 0)
                .map(|code_point| char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        } else {
            let length = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
            String::from_utf8_lossy(&field[..length]).into_owned()
        }
    }

    /// Encode a string into a string field of a native element, truncating and zero padding to the field width.
    ///
    /// A null string is encoded as all zero bytes.
    ///
    /// # Panics
    /// Panics if `native` does not hold the field.
    pub fn encode_string(&self, string: Option<&str>, native: &mut [u8]) {
        let field = &mut native[self.native_offset..self.native_offset + self.native_size];
        field.fill(0);
        let Some(string) = string else {
            return;
        };
        if self.native_type == NativeType::StringUnicode {
            for (code_point, out) in string.chars().zip(field.chunks_exact_mut(4)) {
                let mut bytes = u32::from(code_point).to_ne_bytes();
                if self.need_byte_swapping {
                    bytes.reverse();
                }
                out.copy_from_slice(&bytes);
            }
        } else {
            let length = string.len().min(field.len());
            field[..length].copy_from_slice(&string.as_bytes()[..length]);
        }
    }

    /// Decode the field into a [`Value`].
    #[must_use]
    pub fn decode_value(&self, native: &[u8], warnings: &mut ConversionWarnings) -> Value {
        match self.native_type {
            NativeType::StringAscii | NativeType::StringUnicode => {
                Value::String(Some(self.decode_string(native)))
            }
            _ => Value::Number(self.decode_number(native, warnings)),
        }
    }

    /// Encode a [`Value`] into the field. Strings are converted to numbers and vice versa.
    pub fn encode_value(&self, value: &Value, native: &mut [u8], warnings: &mut ConversionWarnings) {
        match (self.native_type, value) {
            (NativeType::StringAscii | NativeType::StringUnicode, Value::String(string)) => {
                self.encode_string(string.as_deref(), native);
            }
            (NativeType::StringAscii | NativeType::StringUnicode, Value::Number(number)) => {
                self.encode_string(Some(&number.to_string()), native);
            }
            (_, Value::Number(number)) => self.encode_number(*number, native, warnings),
            (_, value) => {
                let number = value
                    .conform(&self.logical_type)
                    .ok()
                    .and_then(|value| value.as_number().copied())
                    .unwrap_or(Number::UInt8(0));
                self.encode_number(number, native, warnings);
            }
        }
    }
}

fn swap_components(bytes: &mut [u8], component_size: usize) {
    if component_size > 1 {
        for component in bytes.chunks_exact_mut(component_size) {
            component.reverse();
        }
    }
}

/// The size of a native element described by `elts`.
#[must_use]
pub fn native_element_size(elts: &[DtypeElt]) -> usize {
    elts.last()
        .map_or(0, |elt| elt.native_offset() + elt.native_size())
}

/// Returns true if the native and logical layouts described by `elts` are identical, for a logical element of `logical_size` bytes.
#[must_use]
pub fn is_plain_copy(elts: &[DtypeElt], logical_size: usize) -> bool {
    native_element_size(elts) == logical_size && elts.iter().all(DtypeElt::is_plain_copy)
}

/// Decode a native element into the logical layout, for data types without strings.
pub fn decode_element(
    elts: &[DtypeElt],
    native: &[u8],
    logical: &mut [u8],
    warnings: &mut ConversionWarnings,
) {
    for elt in elts {
        let number = elt.decode_number(native, warnings);
        number.write_ne_bytes(&mut logical[elt.logical_offset()..]);
    }
}

/// Encode an element from the logical layout into the native layout, for data types without strings.
pub fn encode_element(
    elts: &[DtypeElt],
    logical: &[u8],
    native: &mut [u8],
    warnings: &mut ConversionWarnings,
) {
    for elt in elts {
        if let Some(numeric_type) = elt.logical_type().numeric_type() {
            let number = Number::from_ne_bytes(numeric_type, &logical[elt.logical_offset()..]);
            elt.encode_number(number, native, warnings);
        }
    }
}

/// Decode a native element into a [`Value`] of `data_type`.
#[must_use]
pub fn decode_element_value(
    data_type: &DataType,
    elts: &[DtypeElt],
    native: &[u8],
    warnings: &mut ConversionWarnings,
) -> Value {
    let mut elts = elts.iter();
    decode_value_recursive(data_type, &mut elts, native, warnings)
}

fn decode_value_recursive<'a>(
    data_type: &DataType,
    elts: &mut impl Iterator<Item = &'a DtypeElt>,
    native: &[u8],
    warnings: &mut ConversionWarnings,
) -> Value {
    match data_type {
        DataType::Compound(compound) => Value::Compound(
            compound
                .components()
                .iter()
                .map(|component| {
                    decode_value_recursive(component.data_type(), elts, native, warnings)
                })
                .collect(),
        ),
        _ => elts
            .next()
            .map_or_else(|| Value::zero(data_type), |elt| elt.decode_value(native, warnings)),
    }
}

/// Encode a [`Value`] of `data_type` into a native element.
pub fn encode_element_value(
    data_type: &DataType,
    elts: &[DtypeElt],
    value: &Value,
    native: &mut [u8],
    warnings: &mut ConversionWarnings,
) {
    let mut elts = elts.iter();
    encode_value_recursive(data_type, &mut elts, value, native, warnings);
}

fn encode_value_recursive<'a>(
    data_type: &DataType,
    elts: &mut impl Iterator<Item = &'a DtypeElt>,
    value: &Value,
    native: &mut [u8],
    warnings: &mut ConversionWarnings,
) {
    match (data_type, value) {
        (DataType::Compound(compound), Value::Compound(values)) => {
            for (component, value) in compound.components().iter().zip(values) {
                encode_value_recursive(component.data_type(), elts, value, native, warnings);
            }
        }
        (DataType::Compound(compound), _) => {
            for component in compound.components() {
                let zero = Value::zero(component.data_type());
                encode_value_recursive(component.data_type(), elts, &zero, native, warnings);
            }
        }
        (_, value) => {
            if let Some(elt) = elts.next() {
                elt.encode_value(value, native, warnings);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use num::complex::Complex32;

    use super::*;

    fn elt(native_type: NativeType, size: usize, swap: bool, approx: bool, logical: NumericType) -> DtypeElt {
        DtypeElt::new(native_type, 0, size, swap, approx, logical.into())
    }

    #[test]
    fn decode_widened() {
        let mut warnings = ConversionWarnings::default();
        let i1 = elt(NativeType::SignedInt, 1, false, true, NumericType::Int16);
        assert_eq!(i1.decode_number(&[0xFF], &mut warnings), Number::Int16(-1));

        let f2 = elt(NativeType::IeeeFloat, 2, false, true, NumericType::Float32);
        let native = f16::from_f32(1.5).to_ne_bytes();
        assert_eq!(f2.decode_number(&native, &mut warnings), Number::Float32(1.5));

        let u8 = elt(NativeType::UnsignedInt, 8, false, true, NumericType::Float64);
        let native = 1234u64.to_ne_bytes();
        assert_eq!(u8.decode_number(&native, &mut warnings), Number::Float64(1234.0));
    }

    #[test]
    fn encode_narrowed() {
        let mut warnings = ConversionWarnings::default();
        let i1 = elt(NativeType::SignedInt, 1, false, true, NumericType::Int16);
        let mut native = [0u8; 1];
        i1.encode_number(Number::Int16(-200), &mut native, &mut warnings);
        assert_eq!(native[0] as i8, i8::MIN);

        let f2 = elt(NativeType::IeeeFloat, 2, false, true, NumericType::Float32);
        let mut native = [0u8; 2];
        f2.encode_number(Number::Float32(0.1), &mut native, &mut warnings);
        assert!(warnings.float16_precision);
        f2.encode_number(Number::Float32(f32::INFINITY), &mut native, &mut warnings);
        assert_eq!(f16::from_ne_bytes(native), f16::INFINITY);
    }

    #[test]
    fn byte_swapping() {
        let mut warnings = ConversionWarnings::default();
        let swapped = elt(NativeType::SignedInt, 4, true, false, NumericType::Int32);
        let native = 0x0102_0304i32.to_ne_bytes();
        let mut reversed = native;
        reversed.reverse();
        assert_eq!(
            swapped.decode_number(&reversed, &mut warnings),
            Number::Int32(0x0102_0304)
        );

        let complex = elt(NativeType::ComplexIeeeFloat, 8, true, false, NumericType::Complex64);
        let mut native = [0u8; 8];
        complex.encode_number(
            Number::Complex64(Complex32::new(1.0, -2.0)),
            &mut native,
            &mut warnings,
        );
        let mut re = 1.0f32.to_ne_bytes();
        re.reverse();
        assert_eq!(&native[..4], &re);
        assert_eq!(
            complex.decode_number(&native, &mut warnings),
            Number::Complex64(Complex32::new(1.0, -2.0))
        );
    }

    #[test]
    fn int64_precision_warning() {
        let mut warnings = ConversionWarnings::default();
        let i8 = elt(NativeType::SignedInt, 8, false, true, NumericType::Float64);
        let native = (i64::MAX).to_ne_bytes();
        let _ = i8.decode_number(&native, &mut warnings);
        assert!(warnings.int64_precision);
    }

    #[test]
    fn strings() {
        let ascii = DtypeElt::new(
            NativeType::StringAscii,
            0,
            4,
            false,
            false,
            DataType::String {
                max_length: Some(4),
            },
        );
        let mut native = [0xAAu8; 4];
        ascii.encode_string(Some("abcdef"), &mut native);
        assert_eq!(&native, b"abcd");
        assert_eq!(ascii.decode_string(&native), "abcd");
        ascii.encode_string(Some("ab"), &mut native);
        assert_eq!(&native, b"ab\0\0");
        assert_eq!(ascii.decode_string(&native), "ab");
        ascii.encode_string(None, &mut native);
        assert_eq!(ascii.decode_string(&native), "");

        let unicode = DtypeElt::new(
            NativeType::StringUnicode,
            0,
            8,
            true,
            false,
            DataType::String {
                max_length: Some(2),
            },
        );
        let mut native = [0u8; 8];
        unicode.encode_string(Some("é€x"), &mut native);
        assert_eq!(unicode.decode_string(&native), "é€");
    }
}
