use num::complex::{Complex32, Complex64};

use super::{
    data_type::NumericType,
    value::{Number, Value},
    ArrayError,
};

/// A trait representing the element type of a caller buffer passed to [`Array::read`](crate::array::Array::read) and [`Array::write`](crate::array::Array::write).
///
/// Elements convert to and from the logical [`Value`] of an array element.
/// Numeric conversions follow [`Number::cast`].
pub trait Element: Sized + Clone {
    /// The numeric type of the element, if it is a plain number.
    const NUMERIC_TYPE: Option<NumericType>;

    /// Convert a logical value into an element.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleElementType`] if the value cannot be represented.
    fn from_value(value: &Value) -> Result<Self, ArrayError>;

    /// Convert the element into a logical value.
    fn to_value(&self) -> Value;

    /// View a slice of elements as native-endian bytes, if the element is plain old data.
    #[must_use]
    fn as_bytes(_elements: &[Self]) -> Option<&[u8]> {
        None
    }

    /// View a mutable slice of elements as native-endian bytes, if the element is plain old data.
    #[must_use]
    fn as_bytes_mut(_elements: &mut [Self]) -> Option<&mut [u8]> {
        None
    }
}

fn number_of(value: &Value) -> Result<Number, ArrayError> {
    match value {
        Value::Number(number) => Ok(*number),
        Value::String(string) => Value::String(string.clone())
            .conform(&NumericType::Float64.into())
            .map(|value| value.as_number().copied().unwrap_or(Number::Float64(0.0))),
        Value::Compound(_) => Err(ArrayError::IncompatibleElementType(
            "a compound value cannot be converted to a number".to_string(),
        )),
    }
}

macro_rules! impl_element_pod {
    ($raw_type:ty, $numeric_type:ident) => {
        impl Element for $raw_type {
            const NUMERIC_TYPE: Option<NumericType> = Some(NumericType::$numeric_type);

            fn from_value(value: &Value) -> Result<Self, ArrayError> {
                match number_of(value)?.cast(NumericType::$numeric_type) {
                    Number::$numeric_type(element) => Ok(element),
                    number => Err(ArrayError::IncompatibleElementType(format!(
                        "{number} is not a {}",
                        NumericType::$numeric_type
                    ))),
                }
            }

            fn to_value(&self) -> Value {
                Value::Number(Number::$numeric_type(*self))
            }

            fn as_bytes(elements: &[Self]) -> Option<&[u8]> {
                Some(bytemuck::cast_slice(elements))
            }

            fn as_bytes_mut(elements: &mut [Self]) -> Option<&mut [u8]> {
                Some(bytemuck::cast_slice_mut(elements))
            }
        }
    };
}

impl_element_pod!(u8, UInt8);
impl_element_pod!(i8, Int8);
impl_element_pod!(u16, UInt16);
impl_element_pod!(i16, Int16);
impl_element_pod!(u32, UInt32);
impl_element_pod!(i32, Int32);
impl_element_pod!(u64, UInt64);
impl_element_pod!(i64, Int64);
impl_element_pod!(f32, Float32);
impl_element_pod!(f64, Float64);
impl_element_pod!(Complex32, Complex64);
impl_element_pod!(Complex64, Complex128);

impl Element for bool {
    const NUMERIC_TYPE: Option<NumericType> = None;

    fn from_value(value: &Value) -> Result<Self, ArrayError> {
        Ok(!number_of(value)?.is_zero())
    }

    fn to_value(&self) -> Value {
        Value::Number(Number::UInt8(u8::from(*self)))
    }
}

impl Element for Option<String> {
    const NUMERIC_TYPE: Option<NumericType> = None;

    fn from_value(value: &Value) -> Result<Self, ArrayError> {
        match value {
            Value::String(string) => Ok(string.clone()),
            Value::Number(number) => Ok(Some(number.to_string())),
            Value::Compound(_) => Err(ArrayError::IncompatibleElementType(
                "a compound value cannot be converted to a string".to_string(),
            )),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Element for Value {
    const NUMERIC_TYPE: Option<NumericType> = None;

    fn from_value(value: &Value) -> Result<Self, ArrayError> {
        Ok(value.clone())
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_conversions() {
        assert_eq!(u8::from_value(&Value::Number(Number::Float64(3.7))).unwrap(), 4);
        assert_eq!(i16::from_value(&Value::from("-12")).unwrap(), -12);
        assert!(f32::from_value(&Value::Compound(vec![])).is_err());
        assert!(bool::from_value(&Value::Number(Number::Int32(2))).unwrap());
        assert_eq!(
            Option::<String>::from_value(&Value::Number(Number::Int16(5))).unwrap(),
            Some("5".to_string())
        );
        assert_eq!(
            Complex32::from_value(&Value::Number(Number::Float32(1.0))).unwrap(),
            Complex32::new(1.0, 0.0)
        );
    }

    #[test]
    fn element_bytes() {
        let elements = [1u16, 2];
        assert_eq!(u16::as_bytes(&elements).unwrap().len(), 4);
        assert!(bool::as_bytes(&[true]).is_none());
    }
}
