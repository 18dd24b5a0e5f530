//! Fill values.
//!
//! The fill value of an array is the logical value of every element of a chunk that is absent from storage.

use base64::{prelude::BASE64_STANDARD, Engine};
use serde_json::Value as JsonValue;

use super::{
    data_type::{
        decode_element_value, encode_element_value, ConversionWarnings, DataType, NativeDtype,
        NativeType,
    },
    value::{Number, Value},
    ArrayError,
};

/// The fill value of an array, held in logical encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct FillValue {
    value: Value,
    logical_bytes: Option<Vec<u8>>,
}

fn invalid(json: &JsonValue) -> ArrayError {
    ArrayError::InvalidMetadata(format!("invalid fill_value {json}"))
}

impl FillValue {
    /// Create a fill value of `data_type` from `value`.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleElementType`] if `value` cannot be converted to `data_type`.
    pub fn new(value: &Value, data_type: &DataType) -> Result<Self, ArrayError> {
        let value = value.conform(data_type)?;
        let logical_bytes =
            (!data_type.has_string()).then(|| value.to_logical_bytes(data_type));
        Ok(Self {
            value,
            logical_bytes,
        })
    }

    /// The fill value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// The logical bytes of the fill value, or [`None`] if the data type contains strings.
    #[must_use]
    pub fn logical_bytes(&self) -> Option<&[u8]> {
        self.logical_bytes.as_deref()
    }

    /// The fill value as a [`f64`], if the data type is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_number().map(Number::to_f64)
    }

    /// Returns true if the fill value is numeric and zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.value.as_number().is_some_and(Number::is_zero)
    }

    /// Parse the `fill_value` of an array metadata document.
    ///
    /// Numbers (and numeric strings) are accepted for numeric types, `"NaN"`, `"Infinity"` and `"-Infinity"` for floating point types,
    /// and base64 of the native encoding for string and compound types.
    /// A single-element list is treated as its element.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidMetadata`] if the fill value does not match the data type.
    pub fn from_json(json: &JsonValue, dtype: &NativeDtype) -> Result<Option<Self>, ArrayError> {
        let json = match json {
            JsonValue::Array(values) if values.len() == 1 => &values[0],
            json => json,
        };
        let data_type = dtype.data_type();
        let value = match (json, data_type) {
            (JsonValue::Null, _) => return Ok(None),
            (JsonValue::Bool(value), DataType::Numeric(_)) => {
                Value::Number(Number::UInt8(u8::from(*value)))
            }
            (JsonValue::Number(number), DataType::Numeric(_)) => {
                let number = if let Some(number) = number.as_i64() {
                    Number::Int64(number)
                } else if let Some(number) = number.as_u64() {
                    Number::UInt64(number)
                } else {
                    Number::Float64(number.as_f64().ok_or_else(|| invalid(json))?)
                };
                Value::Number(number)
            }
            (JsonValue::String(string), DataType::Numeric(numeric_type)) => {
                let special = match string.as_str() {
                    "NaN" => Some(f64::NAN),
                    "Infinity" => Some(f64::INFINITY),
                    "-Infinity" => Some(f64::NEG_INFINITY),
                    _ => None,
                };
                if let Some(special) = special {
                    if !matches!(
                        numeric_type,
                        super::NumericType::Float32 | super::NumericType::Float64
                    ) {
                        return Err(invalid(json));
                    }
                    Value::Number(Number::Float64(special))
                } else {
                    // numeric values serialised as strings are tolerated
                    let number = string.trim().parse::<f64>().map_err(|_| invalid(json))?;
                    Value::Number(Number::Float64(number))
                }
            }
            (JsonValue::String(string), DataType::String { .. } | DataType::Compound(_)) => {
                let native = BASE64_STANDARD
                    .decode(string)
                    .map_err(|_| invalid(json))?;
                decode_native_fill_value(&native, dtype).ok_or_else(|| invalid(json))?
            }
            _ => return Err(invalid(json)),
        };
        Self::new(&value, data_type).map(Some)
    }

    /// Serialise the fill value for an array metadata document.
    #[must_use]
    pub fn to_json(fill_value: Option<&Self>, dtype: &NativeDtype) -> JsonValue {
        let Some(fill_value) = fill_value else {
            return JsonValue::Null;
        };
        match (&fill_value.value, dtype.data_type()) {
            (Value::Number(number), DataType::Numeric(numeric_type)) => {
                let value = number.to_f64();
                if value.is_nan() {
                    JsonValue::from("NaN")
                } else if value == f64::INFINITY {
                    JsonValue::from("Infinity")
                } else if value == f64::NEG_INFINITY {
                    JsonValue::from("-Infinity")
                } else if numeric_type.is_integer() {
                    match number.cast(super::NumericType::Int64) {
                        Number::Int64(value) => JsonValue::from(value),
                        _ => JsonValue::Null,
                    }
                } else {
                    JsonValue::from(value)
                }
            }
            (Value::String(None), DataType::String { .. }) => JsonValue::Null,
            (value, data_type) => {
                let mut native = vec![0; dtype.native_size()];
                encode_element_value(
                    data_type,
                    dtype.elts(),
                    value,
                    &mut native,
                    &mut ConversionWarnings::default(),
                );
                if let (Value::String(Some(string)), [elt]) = (value, dtype.elts()) {
                    if elt.native_type() == NativeType::StringAscii {
                        native.truncate(string.len().min(native.len()));
                    }
                }
                JsonValue::from(BASE64_STANDARD.encode(native))
            }
        }
    }
}

fn decode_native_fill_value(native: &[u8], dtype: &NativeDtype) -> Option<Value> {
    let native_size = dtype.native_size();
    let mut warnings = ConversionWarnings::default();
    match dtype.data_type() {
        DataType::String { .. } => {
            // ascii fill values may be shorter than the native width
            let mut padded = native.to_vec();
            if padded.len() > native_size {
                let is_ascii = dtype
                    .elts()
                    .first()
                    .is_some_and(|elt| elt.native_type() == NativeType::StringAscii);
                if !is_ascii {
                    return None;
                }
                let string = String::from_utf8_lossy(&padded)
                    .trim_end_matches('\0')
                    .to_string();
                return Some(Value::String(Some(string)));
            }
            padded.resize(native_size, 0);
            Some(decode_element_value(
                dtype.data_type(),
                dtype.elts(),
                &padded,
                &mut warnings,
            ))
        }
        data_type => (native.len() == native_size).then(|| {
            decode_element_value(data_type, dtype.elts(), native, &mut warnings)
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fill_value_numeric() {
        let dtype = NativeDtype::parse_v2(&json!("<i4")).unwrap();
        let fill = FillValue::from_json(&json!(-3), &dtype).unwrap().unwrap();
        assert_eq!(fill.value(), &Value::Number(Number::Int32(-3)));
        assert_eq!(fill.logical_bytes(), Some(&(-3i32).to_ne_bytes()[..]));
        assert_eq!(FillValue::to_json(Some(&fill), &dtype), json!(-3));

        let fill = FillValue::from_json(&json!("42"), &dtype).unwrap().unwrap();
        assert_eq!(fill.as_f64(), Some(42.0));
        assert!(FillValue::from_json(&json!("NaN"), &dtype).is_err());
        assert!(FillValue::from_json(&json!({}), &dtype).is_err());
        assert!(FillValue::from_json(&json!(null), &dtype).unwrap().is_none());
        assert_eq!(FillValue::to_json(None, &dtype), json!(null));

        let fill = FillValue::from_json(&json!([7]), &dtype).unwrap().unwrap();
        assert_eq!(fill.as_f64(), Some(7.0));
    }

    #[test]
    fn fill_value_float_sentinels() {
        let dtype = NativeDtype::parse_v2(&json!("<f4")).unwrap();
        for sentinel in ["NaN", "Infinity", "-Infinity"] {
            let fill = FillValue::from_json(&json!(sentinel), &dtype).unwrap().unwrap();
            assert_eq!(FillValue::to_json(Some(&fill), &dtype), json!(sentinel));
        }
        let fill = FillValue::from_json(&json!(1.5), &dtype).unwrap().unwrap();
        assert_eq!(fill.value(), &Value::Number(Number::Float32(1.5)));
        assert_eq!(FillValue::to_json(Some(&fill), &dtype), json!(1.5));
    }

    #[test]
    fn fill_value_string() {
        let dtype = NativeDtype::parse_v2(&json!("|S4")).unwrap();
        let fill = FillValue::from_json(&json!("YWI="), &dtype).unwrap().unwrap();
        assert_eq!(fill.value(), &Value::from("ab"));
        assert!(fill.logical_bytes().is_none());
        assert_eq!(FillValue::to_json(Some(&fill), &dtype), json!("YWI="));
        assert!(FillValue::from_json(&json!(3), &dtype).is_err());
        assert!(FillValue::from_json(&json!("not base64!"), &dtype).is_err());
    }

    #[test]
    fn fill_value_compound() {
        let dtype = NativeDtype::parse_v2(&json!([["a", "|u1"], ["b", "<i2"]])).unwrap();
        let fill = FillValue::new(
            &Value::Compound(vec![
                Value::Number(Number::UInt8(1)),
                Value::Number(Number::Int16(-1)),
            ]),
            dtype.data_type(),
        )
        .unwrap();
        let json = FillValue::to_json(Some(&fill), &dtype);
        assert_eq!(json, json!(BASE64_STANDARD.encode([1, 0xFF, 0xFF])));
        assert_eq!(FillValue::from_json(&json, &dtype).unwrap(), Some(fill));
        assert!(FillValue::from_json(&json!("AQ=="), &dtype).is_err());
    }
}
