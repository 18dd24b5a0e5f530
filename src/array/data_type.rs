//! Logical data types.
//!
//! A [`DataType`] is the in-memory, application-facing type of an array element.
//! It is one of
//!  - a [`NumericType`],
//!  - a string, or
//!  - a compound of named components, each at a byte offset and with its own [`DataType`].
//!
//! The on-disk ("native") encoding of an element is described separately by a list of [`DtypeElt`], one per primitive field.
//! The logical and native encodings can differ in size and byte order; see [`DtypeElt`] for the rules.

mod dtype_elt;
mod native_dtype;

use derive_more::From;
use thiserror::Error;

pub use dtype_elt::{ConversionWarnings, DtypeElt, NativeType};
pub(crate) use dtype_elt::{
    decode_element, decode_element_value, encode_element, encode_element_value,
};
pub use native_dtype::{NativeDtype, StringFormat};

/// The size in bytes of a string in the logical layout of a compound.
pub const LOGICAL_STRING_SIZE: usize = std::mem::size_of::<usize>();

/// A numeric type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[rustfmt::skip]
pub enum NumericType {
    /// `uint8` Integer in `[0, 2^8-1]`.
    UInt8,
    /// `int8` Integer in `[-2^7, 2^7-1]`. Buffer type only.
    Int8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    UInt16,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    Int16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    UInt32,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    Int32,
    /// `uint64` Integer in `[0, 2^64-1]`. Buffer type only.
    UInt64,
    /// `int64` Integer in `[-2^63, 2^63-1]`. Buffer type only.
    Int64,
    /// `float32` IEEE 754 single-precision floating point.
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    Float64,
    /// `complex64` real and imaginary components are each IEEE 754 single-precision floating point.
    Complex64,
    /// `complex128` real and imaginary components are each IEEE 754 double-precision floating point.
    Complex128,
}

impl NumericType {
    /// The size of the type in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    /// Returns true for integer types.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        !matches!(
            self,
            Self::Float32 | Self::Float64 | Self::Complex64 | Self::Complex128
        )
    }

    /// Returns true for real or complex floating point types.
    #[must_use]
    pub const fn is_floating_point(&self) -> bool {
        !self.is_integer()
    }

    /// Returns true for complex types.
    #[must_use]
    pub const fn is_complex(&self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Returns true if the type can be the logical type of an array element.
    ///
    /// 8-bit signed and 64-bit integers only occur as caller buffer types: the corresponding native types are
    /// widened to `int16` and approximated by `float64`.
    #[must_use]
    pub const fn is_logical(&self) -> bool {
        !matches!(self, Self::Int8 | Self::UInt64 | Self::Int64)
    }

    /// The name of the type, e.g. `uint8`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::UInt64 => "uint64",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
        }
    }
}

impl std::fmt::Display for NumericType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A logical data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, From)]
pub enum DataType {
    /// A number.
    Numeric(NumericType),
    /// A string of at most `max_length` bytes when encoded natively, or unbounded if [`None`].
    String {
        /// The maximum length.
        max_length: Option<usize>,
    },
    /// A compound of named components.
    Compound(CompoundType),
}

/// A component of a [`CompoundType`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompoundComponent {
    name: String,
    offset: usize,
    data_type: DataType,
}

impl CompoundComponent {
    /// Create a new compound component.
    #[must_use]
    pub fn new(name: impl Into<String>, offset: usize, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            offset,
            data_type,
        }
    }

    /// The name of the component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The byte offset of the component in the logical layout of the compound.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The data type of the component.
    #[must_use]
    pub const fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

/// A compound data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompoundType {
    size: usize,
    components: Vec<CompoundComponent>,
}

impl CompoundType {
    /// Create a compound type with an explicit layout.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if there are no components or a component does not fit in `size`.
    pub fn new(
        size: usize,
        components: Vec<CompoundComponent>,
    ) -> Result<Self, UnsupportedDataTypeError> {
        if components.is_empty() {
            return Err("compound type with no components".to_string().into());
        }
        for component in &components {
            if component.offset + component.data_type.size() > size {
                return Err(format!(
                    "compound component {} at offset {} does not fit in {size} bytes",
                    component.name, component.offset
                )
                .into());
            }
        }
        Ok(Self { size, components })
    }

    /// Create a compound type from named component types, inserting padding so each component is aligned.
    ///
    /// # Errors
    /// Returns [`UnsupportedDataTypeError`] if there are no components.
    pub fn new_aligned(
        components: impl IntoIterator<Item = (String, DataType)>,
    ) -> Result<Self, UnsupportedDataTypeError> {
        let mut offset = 0;
        let mut alignment_max = 1;
        let components: Vec<CompoundComponent> = components
            .into_iter()
            .map(|(name, data_type)| {
                let alignment = data_type.alignment();
                alignment_max = alignment_max.max(alignment);
                offset = align_offset(offset, alignment);
                let component = CompoundComponent::new(name, offset, data_type);
                offset += component.data_type.size();
                component
            })
            .collect();
        Self::new(align_offset(offset, alignment_max), components)
    }

    /// The logical size of the compound in bytes, including padding.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The components of the compound.
    #[must_use]
    pub fn components(&self) -> &[CompoundComponent] {
        &self.components
    }
}

/// Round `offset` up to a multiple of `alignment`.
#[must_use]
pub(crate) const fn align_offset(offset: usize, alignment: usize) -> usize {
    offset + (alignment - (offset % alignment)) % alignment
}

impl DataType {
    /// The size of the logical type in bytes.
    ///
    /// Strings are held out of line and occupy [`LOGICAL_STRING_SIZE`] bytes in a compound layout.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Numeric(numeric_type) => numeric_type.size(),
            Self::String { .. } => LOGICAL_STRING_SIZE,
            Self::Compound(compound) => compound.size(),
        }
    }

    /// The alignment of the logical type in bytes.
    #[must_use]
    pub fn alignment(&self) -> usize {
        match self {
            Self::Numeric(NumericType::Complex64) => 4,
            Self::Numeric(NumericType::Complex128) => 8,
            Self::Numeric(numeric_type) => numeric_type.size().min(LOGICAL_STRING_SIZE),
            Self::String { .. } => LOGICAL_STRING_SIZE,
            Self::Compound(compound) => compound
                .components()
                .iter()
                .map(|component| component.data_type().alignment())
                .max()
                .unwrap_or(1),
        }
    }

    /// Returns the numeric type if this is a numeric data type.
    #[must_use]
    pub const fn numeric_type(&self) -> Option<NumericType> {
        if let Self::Numeric(numeric_type) = self {
            Some(*numeric_type)
        } else {
            None
        }
    }

    /// Returns true if the type is or contains a string.
    ///
    /// Elements of such types cannot be held as plain bytes in memory.
    #[must_use]
    pub fn has_string(&self) -> bool {
        match self {
            Self::Numeric(_) => false,
            Self::String { .. } => true,
            Self::Compound(compound) => compound
                .components()
                .iter()
                .any(|component| component.data_type().has_string()),
        }
    }

    /// A short name for the data type, e.g. `float32`, `string` or `compound`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Numeric(numeric_type) => numeric_type.name(),
            Self::String { .. } => "string",
            Self::Compound(_) => "compound",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String {
                max_length: Some(max_length),
            } => write!(f, "string({max_length})"),
            Self::Compound(compound) => {
                write!(f, "compound(")?;
                for (i, component) in compound.components().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", component.name(), component.data_type())?;
                }
                write!(f, ")")
            }
            _ => f.write_str(self.name()),
        }
    }
}

/// An unsupported data type error.
#[derive(Debug, Error, From)]
#[error("unsupported data type {_0}")]
pub struct UnsupportedDataTypeError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_sizes() {
        assert_eq!(DataType::Numeric(NumericType::UInt8).size(), 1);
        assert_eq!(DataType::Numeric(NumericType::Complex128).size(), 16);
        assert_eq!(
            DataType::String {
                max_length: Some(10)
            }
            .size(),
            LOGICAL_STRING_SIZE
        );
        assert!(!NumericType::Int64.is_logical());
        assert!(NumericType::Float32.is_floating_point());
        assert!(NumericType::Complex64.is_complex());
    }

    #[test]
    fn compound_aligned_layout() {
        let compound = CompoundType::new_aligned([
            ("a".to_string(), NumericType::UInt8.into()),
            ("b".to_string(), NumericType::Int32.into()),
            ("c".to_string(), NumericType::Int16.into()),
        ])
        .unwrap();
        let offsets: Vec<usize> = compound.components().iter().map(|c| c.offset()).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(compound.size(), 12);
        assert_eq!(DataType::Compound(compound).alignment(), 4);
    }

    #[test]
    fn compound_invalid() {
        assert!(CompoundType::new(0, vec![]).is_err());
        assert!(CompoundType::new(
            2,
            vec![CompoundComponent::new("x", 0, NumericType::Int32.into())]
        )
        .is_err());
    }

    #[test]
    fn data_type_display() {
        let compound = CompoundType::new_aligned([
            ("x".to_string(), NumericType::Float64.into()),
            (
                "s".to_string(),
                DataType::String {
                    max_length: Some(4),
                },
            ),
        ])
        .unwrap();
        assert!(DataType::Compound(compound.clone()).has_string());
        assert_eq!(
            DataType::Compound(compound).to_string(),
            "compound(x: float64, s: string(4))"
        );
    }
}
