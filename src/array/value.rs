//! Element values.
//!
//! [`Number`] and [`Value`] are closed sum types over every scalar kind an element can hold.
//! They are the common currency between caller buffers, fill values and the per-field conversion of [`DtypeElt`](crate::array::data_type::DtypeElt).

use num::complex::{Complex32, Complex64};

use super::{
    data_type::{DataType, NumericType},
    ArrayError,
};

/// A numeric value of any [`NumericType`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    /// `uint8`
    UInt8(u8),
    /// `int8`
    Int8(i8),
    /// `uint16`
    UInt16(u16),
    /// `int16`
    Int16(i16),
    /// `uint32`
    UInt32(u32),
    /// `int32`
    Int32(i32),
    /// `uint64`
    UInt64(u64),
    /// `int64`
    Int64(i64),
    /// `float32`
    Float32(f32),
    /// `float64`
    Float64(f64),
    /// `complex64`
    Complex64(Complex32),
    /// `complex128`
    Complex128(Complex64),
}

fn bytes_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0; N];
    array.copy_from_slice(&bytes[..N]);
    array
}

macro_rules! clamp_integer {
    ( $value:expr, $type:ty, $variant:ident ) => {{
        let clamped = $value.clamp(i128::from(<$type>::MIN), i128::from(<$type>::MAX));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Number::$variant(clamped as $type)
    }};
}

impl Number {
    /// The numeric type of the value.
    #[must_use]
    pub const fn numeric_type(&self) -> NumericType {
        match self {
            Self::UInt8(_) => NumericType::UInt8,
            Self::Int8(_) => NumericType::Int8,
            Self::UInt16(_) => NumericType::UInt16,
            Self::Int16(_) => NumericType::Int16,
            Self::UInt32(_) => NumericType::UInt32,
            Self::Int32(_) => NumericType::Int32,
            Self::UInt64(_) => NumericType::UInt64,
            Self::Int64(_) => NumericType::Int64,
            Self::Float32(_) => NumericType::Float32,
            Self::Float64(_) => NumericType::Float64,
            Self::Complex64(_) => NumericType::Complex64,
            Self::Complex128(_) => NumericType::Complex128,
        }
    }

    /// The zero value of `numeric_type`.
    #[must_use]
    pub fn zero(numeric_type: NumericType) -> Self {
        Self::UInt8(0).cast(numeric_type)
    }

    /// Read a value of `numeric_type` from native-endian `bytes`.
    ///
    /// # Panics
    /// Panics if `bytes` is shorter than the size of `numeric_type`.
    #[must_use]
    pub fn from_ne_bytes(numeric_type: NumericType, bytes: &[u8]) -> Self {
        match numeric_type {
            NumericType::UInt8 => Self::UInt8(bytes[0]),
            NumericType::Int8 => Self::Int8(i8::from_ne_bytes(bytes_array(bytes))),
            NumericType::UInt16 => Self::UInt16(u16::from_ne_bytes(bytes_array(bytes))),
            NumericType::Int16 => Self::Int16(i16::from_ne_bytes(bytes_array(bytes))),
            NumericType::UInt32 => Self::UInt32(u32::from_ne_bytes(bytes_array(bytes))),
            NumericType::Int32 => Self::Int32(i32::from_ne_bytes(bytes_array(bytes))),
            NumericType::UInt64 => Self::UInt64(u64::from_ne_bytes(bytes_array(bytes))),
            NumericType::Int64 => Self::Int64(i64::from_ne_bytes(bytes_array(bytes))),
            NumericType::Float32 => Self::Float32(f32::from_ne_bytes(bytes_array(bytes))),
            NumericType::Float64 => Self::Float64(f64::from_ne_bytes(bytes_array(bytes))),
            NumericType::Complex64 => Self::Complex64(Complex32::new(
                f32::from_ne_bytes(bytes_array(bytes)),
                f32::from_ne_bytes(bytes_array(&bytes[4..])),
            )),
            NumericType::Complex128 => Self::Complex128(Complex64::new(
                f64::from_ne_bytes(bytes_array(bytes)),
                f64::from_ne_bytes(bytes_array(&bytes[8..])),
            )),
        }
    }

    /// Write the value to `bytes` in native-endian order.
    ///
    /// # Panics
    /// Panics if `bytes` is shorter than the size of the value.
    pub fn write_ne_bytes(&self, bytes: &mut [u8]) {
        match self {
            Self::UInt8(v) => bytes[0] = *v,
            Self::Int8(v) => bytes[..1].copy_from_slice(&v.to_ne_bytes()),
            Self::UInt16(v) => bytes[..2].copy_from_slice(&v.to_ne_bytes()),
            Self::Int16(v) => bytes[..2].copy_from_slice(&v.to_ne_bytes()),
            Self::UInt32(v) => bytes[..4].copy_from_slice(&v.to_ne_bytes()),
            Self::Int32(v) => bytes[..4].copy_from_slice(&v.to_ne_bytes()),
            Self::UInt64(v) => bytes[..8].copy_from_slice(&v.to_ne_bytes()),
            Self::Int64(v) => bytes[..8].copy_from_slice(&v.to_ne_bytes()),
            Self::Float32(v) => bytes[..4].copy_from_slice(&v.to_ne_bytes()),
            Self::Float64(v) => bytes[..8].copy_from_slice(&v.to_ne_bytes()),
            Self::Complex64(v) => {
                bytes[..4].copy_from_slice(&v.re.to_ne_bytes());
                bytes[4..8].copy_from_slice(&v.im.to_ne_bytes());
            }
            Self::Complex128(v) => {
                bytes[..8].copy_from_slice(&v.re.to_ne_bytes());
                bytes[8..16].copy_from_slice(&v.im.to_ne_bytes());
            }
        }
    }

    /// The value as an integer, if it is an integer.
    fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::UInt8(v) => Some(i128::from(v)),
            Self::Int8(v) => Some(i128::from(v)),
            Self::UInt16(v) => Some(i128::from(v)),
            Self::Int16(v) => Some(i128::from(v)),
            Self::UInt32(v) => Some(i128::from(v)),
            Self::Int32(v) => Some(i128::from(v)),
            Self::UInt64(v) => Some(i128::from(v)),
            Self::Int64(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// The value as a [`f64`]. Complex values return their real part.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        match *self {
            Self::UInt8(v) => f64::from(v),
            Self::Int8(v) => f64::from(v),
            Self::UInt16(v) => f64::from(v),
            Self::Int16(v) => f64::from(v),
            Self::UInt32(v) => f64::from(v),
            Self::Int32(v) => f64::from(v),
            Self::UInt64(v) => v as f64,
            Self::Int64(v) => v as f64,
            Self::Float32(v) => f64::from(v),
            Self::Float64(v) => v,
            Self::Complex64(v) => f64::from(v.re),
            Self::Complex128(v) => v.re,
        }
    }

    /// The value as a double precision complex number.
    #[must_use]
    pub fn to_complex128(&self) -> Complex64 {
        match *self {
            Self::Complex64(v) => Complex64::new(f64::from(v.re), f64::from(v.im)),
            Self::Complex128(v) => v,
            _ => Complex64::new(self.to_f64(), 0.0),
        }
    }

    /// Returns true if every component of the value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        let complex = self.to_complex128();
        complex.re == 0.0 && complex.im == 0.0
    }

    /// Convert the value to `numeric_type`.
    ///
    /// Floating point values are rounded to the nearest integer when converted to an integer type and `NaN` becomes zero.
    /// Integer conversions saturate at the bounds of the target type.
    /// A complex value converted to a real type keeps its real part.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cast(self, numeric_type: NumericType) -> Self {
        if self.numeric_type() == numeric_type {
            return self;
        }
        match numeric_type {
            NumericType::Float32 => Self::Float32(self.to_f64() as f32),
            NumericType::Float64 => Self::Float64(self.to_f64()),
            NumericType::Complex64 => {
                let complex = self.to_complex128();
                Self::Complex64(Complex32::new(complex.re as f32, complex.im as f32))
            }
            NumericType::Complex128 => Self::Complex128(self.to_complex128()),
            integer_type => {
                // float to int `as` casts saturate, NaN maps to zero
                let value = self
                    .as_i128()
                    .unwrap_or_else(|| self.to_f64().round() as i128);
                match integer_type {
                    NumericType::UInt8 => clamp_integer!(value, u8, UInt8),
                    NumericType::Int8 => clamp_integer!(value, i8, Int8),
                    NumericType::UInt16 => clamp_integer!(value, u16, UInt16),
                    NumericType::Int16 => clamp_integer!(value, i16, Int16),
                    NumericType::UInt32 => clamp_integer!(value, u32, UInt32),
                    NumericType::Int32 => clamp_integer!(value, i32, Int32),
                    NumericType::UInt64 => clamp_integer!(value, u64, UInt64),
                    _ => clamp_integer!(value, i64, Int64),
                }
            }
        }
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UInt8(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Complex64(v) => write!(f, "{v}"),
            Self::Complex128(v) => write!(f, "{v}"),
        }
    }
}

/// The value of one array element.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A number.
    Number(Number),
    /// A string, or [`None`] for a null string.
    String(Option<String>),
    /// The component values of a compound, in component order.
    Compound(Vec<Value>),
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        Self::Number(number)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Number(Number::Float64(number))
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Self::Number(Number::Int32(number))
    }
}

impl From<&str> for Value {
    fn from(string: &str) -> Self {
        Self::String(Some(string.to_string()))
    }
}

impl Value {
    /// The all-zero value of `data_type`: zero numbers and null strings.
    #[must_use]
    pub fn zero(data_type: &DataType) -> Self {
        match data_type {
            DataType::Numeric(numeric_type) => Self::Number(Number::zero(*numeric_type)),
            DataType::String { .. } => Self::String(None),
            DataType::Compound(compound) => Self::Compound(
                compound
                    .components()
                    .iter()
                    .map(|component| Self::zero(component.data_type()))
                    .collect(),
            ),
        }
    }

    /// Returns the number if this is a numeric value.
    #[must_use]
    pub const fn as_number(&self) -> Option<&Number> {
        if let Self::Number(number) = self {
            Some(number)
        } else {
            None
        }
    }

    /// Convert the value so that it is an instance of `data_type`.
    ///
    /// Numbers are cast, numbers and strings convert into each other, and compound values are conformed component-wise.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleElementType`] if the value cannot represent `data_type`.
    pub fn conform(&self, data_type: &DataType) -> Result<Self, ArrayError> {
        match (self, data_type) {
            (Self::Number(number), DataType::Numeric(numeric_type)) => {
                Ok(Self::Number(number.cast(*numeric_type)))
            }
            (Self::String(string), DataType::Numeric(numeric_type)) => {
                let number = string
                    .as_deref()
                    .map_or(Ok(0.0), |string| string.trim().parse::<f64>())
                    .map_err(|_| {
                        ArrayError::IncompatibleElementType(format!(
                            "{string:?} is not a number"
                        ))
                    })?;
                Ok(Self::Number(Number::Float64(number).cast(*numeric_type)))
            }
            (Self::String(string), DataType::String { .. }) => Ok(Self::String(string.clone())),
            (Self::Number(number), DataType::String { .. }) => {
                Ok(Self::String(Some(number.to_string())))
            }
            (Self::Compound(values), DataType::Compound(compound))
                if values.len() == compound.components().len() =>
            {
                values
                    .iter()
                    .zip(compound.components())
                    .map(|(value, component)| value.conform(component.data_type()))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Compound)
            }
            _ => Err(ArrayError::IncompatibleElementType(format!(
                "cannot convert {self:?} to {data_type}"
            ))),
        }
    }

    /// Read a value of `data_type` from its logical byte layout.
    ///
    /// `data_type` must not contain strings.
    #[must_use]
    pub fn from_logical_bytes(data_type: &DataType, bytes: &[u8]) -> Self {
        match data_type {
            DataType::Numeric(numeric_type) => {
                Self::Number(Number::from_ne_bytes(*numeric_type, bytes))
            }
            DataType::String { .. } => Self::String(None),
            DataType::Compound(compound) => Self::Compound(
                compound
                    .components()
                    .iter()
                    .map(|component| {
                        Self::from_logical_bytes(
                            component.data_type(),
                            &bytes[component.offset()..],
                        )
                    })
                    .collect(),
            ),
        }
    }

    /// Write the value to the logical byte layout of `data_type`.
    ///
    /// The value should conform to `data_type`; mismatched parts are written as zero bytes.
    pub fn write_logical_bytes(&self, data_type: &DataType, bytes: &mut [u8]) {
        match (self, data_type) {
            (Self::Number(number), DataType::Numeric(numeric_type)) => {
                number.cast(*numeric_type).write_ne_bytes(bytes);
            }
            (Self::Compound(values), DataType::Compound(compound)) => {
                for (value, component) in values.iter().zip(compound.components()) {
                    value.write_logical_bytes(
                        component.data_type(),
                        &mut bytes[component.offset()..],
                    );
                }
            }
            _ => bytes[..data_type.size()].fill(0),
        }
    }

    /// Return the logical bytes of the value for `data_type`.
    #[must_use]
    pub fn to_logical_bytes(&self, data_type: &DataType) -> Vec<u8> {
        let mut bytes = vec![0; data_type.size()];
        self.write_logical_bytes(data_type, &mut bytes);
        bytes
    }
}
