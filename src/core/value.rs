// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Property value type system.
//!
//! Every node property and metadata entry holds a [`PropertyValue`]. The
//! variants cover the scalar and array types found in vendor headers; values
//! whose layout no handler understands are carried as [`PropertyValue::Opaque`]
//! so that they survive a decode/encode cycle untouched.

use serde::{Deserialize, Serialize};

/// Tagged scalar or array value attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    // Boolean
    Bool(bool),

    // Signed integers
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),

    // Unsigned integers
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),

    // Floating point
    Float32(f32),
    Float64(f64),

    // String (UTF-8)
    String(String),

    // Raw bytes
    Bytes(Vec<u8>),

    /// Timestamp as nanoseconds since Unix epoch
    Timestamp(i64),

    // Homogeneous or nested array
    Array(Vec<PropertyValue>),

    /// Value kept verbatim because its type code or shape is not understood
    Opaque {
        /// Vendor type code
        type_code: i8,
        /// Dimensions as stored
        dims: Vec<u16>,
        /// Raw payload
        bytes: Vec<u8>,
    },

    // Unset value
    Null,
}

impl PropertyValue {
    // ========================================================================
    // Type Checking Predicates
    // ========================================================================

    /// Check if this value is a numeric type (integers or floats).
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Check if this value is an integer type (signed or unsigned).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PropertyValue::Int8(_)
                | PropertyValue::Int16(_)
                | PropertyValue::Int32(_)
                | PropertyValue::Int64(_)
                | PropertyValue::UInt8(_)
                | PropertyValue::UInt16(_)
                | PropertyValue::UInt32(_)
                | PropertyValue::UInt64(_)
        )
    }

    /// Check if this value is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, PropertyValue::Float32(_) | PropertyValue::Float64(_))
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    // ========================================================================
    // Type Conversion Methods
    // ========================================================================

    /// Try to convert this value to f64 (for numeric values only).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int8(v) => Some(*v as f64),
            PropertyValue::Int16(v) => Some(*v as f64),
            PropertyValue::Int32(v) => Some(*v as f64),
            PropertyValue::Int64(v) => Some(*v as f64),
            PropertyValue::UInt8(v) => Some(*v as f64),
            PropertyValue::UInt16(v) => Some(*v as f64),
            PropertyValue::UInt32(v) => Some(*v as f64),
            PropertyValue::UInt64(v) => Some(*v as f64),
            PropertyValue::Float32(v) => Some(*v as f64),
            PropertyValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to convert this value to i64 (for integer types only).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Bool(v) => Some(*v as i64),
            PropertyValue::Int8(v) => Some(*v as i64),
            PropertyValue::Int16(v) => Some(*v as i64),
            PropertyValue::Int32(v) => Some(*v as i64),
            PropertyValue::Int64(v) => Some(*v),
            PropertyValue::UInt8(v) => Some(*v as i64),
            PropertyValue::UInt16(v) => Some(*v as i64),
            PropertyValue::UInt32(v) => Some(*v as i64),
            PropertyValue::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get the inner string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the inner array.
    pub fn as_array(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Interpret the value as a list of strings.
    ///
    /// A single string is returned as a one-element list.
    pub fn as_strings(&self) -> Option<Vec<String>> {
        match self {
            PropertyValue::String(s) => Some(vec![s.clone()]),
            PropertyValue::Array(arr) => arr
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    /// Interpret the value as a flat list of numbers.
    ///
    /// A numeric scalar is returned as a one-element list; nested arrays are
    /// flattened in storage order.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            PropertyValue::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for item in arr {
                    out.extend(item.as_f64_vec()?);
                }
                Some(out)
            }
            other => other.as_f64().map(|v| vec![v]),
        }
    }

    /// Get the type name of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int8(_) => "int8",
            PropertyValue::Int16(_) => "int16",
            PropertyValue::Int32(_) => "int32",
            PropertyValue::Int64(_) => "int64",
            PropertyValue::UInt8(_) => "uint8",
            PropertyValue::UInt16(_) => "uint16",
            PropertyValue::UInt32(_) => "uint32",
            PropertyValue::UInt64(_) => "uint64",
            PropertyValue::Float32(_) => "float32",
            PropertyValue::Float64(_) => "float64",
            PropertyValue::String(_) => "string",
            PropertyValue::Bytes(_) => "bytes",
            PropertyValue::Timestamp(_) => "timestamp",
            PropertyValue::Array(_) => "array",
            PropertyValue::Opaque { .. } => "opaque",
            PropertyValue::Null => "null",
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int8(v) => write!(f, "{v}"),
            PropertyValue::Int16(v) => write!(f, "{v}"),
            PropertyValue::Int32(v) => write!(f, "{v}"),
            PropertyValue::Int64(v) => write!(f, "{v}"),
            PropertyValue::UInt8(v) => write!(f, "{v}"),
            PropertyValue::UInt16(v) => write!(f, "{v}"),
            PropertyValue::UInt32(v) => write!(f, "{v}"),
            PropertyValue::UInt64(v) => write!(f, "{v}"),
            PropertyValue::Float32(v) => write!(f, "{v}"),
            PropertyValue::Float64(v) => write!(f, "{v}"),
            PropertyValue::String(s) => write!(f, "{s:?}"),
            PropertyValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            PropertyValue::Timestamp(nanos) => write!(f, "@{nanos}ns"),
            PropertyValue::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            PropertyValue::Opaque {
                type_code,
                dims,
                bytes,
            } => write!(
                f,
                "<opaque type {type_code} dims {dims:?}: {} bytes>",
                bytes.len()
            ),
            PropertyValue::Null => write!(f, "null"),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
);

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        PropertyValue::Array(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(PropertyValue::Int16(-3).as_f64(), Some(-3.0));
        assert_eq!(PropertyValue::Float32(1.5).as_f64(), Some(1.5));
        assert_eq!(PropertyValue::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(PropertyValue::String("x".into()).as_f64(), None);
    }

    #[test]
    fn test_as_strings() {
        let single = PropertyValue::from("LASI");
        assert_eq!(single.as_strings(), Some(vec!["LASI".to_string()]));

        let labels = PropertyValue::from(vec!["LASI", "RASI"]);
        assert_eq!(
            labels.as_strings(),
            Some(vec!["LASI".to_string(), "RASI".to_string()])
        );

        let mixed = PropertyValue::Array(vec![PropertyValue::from("a"), PropertyValue::Int8(1)]);
        assert_eq!(mixed.as_strings(), None);
    }

    #[test]
    fn test_as_f64_vec_flattens_nested() {
        let nested = PropertyValue::Array(vec![
            PropertyValue::from(vec![0.0f32, 1.5]),
            PropertyValue::from(vec![0.0f32, 2.5]),
        ]);
        assert_eq!(nested.as_f64_vec(), Some(vec![0.0, 1.5, 0.0, 2.5]));
        assert_eq!(PropertyValue::Int16(7).as_f64_vec(), Some(vec![7.0]));
    }

    #[test]
    fn test_opaque_survives_serde() {
        let value = PropertyValue::Opaque {
            type_code: 3,
            dims: vec![2, 2],
            bytes: vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
        };
        let json = serde_json::to_string(&value).unwrap();
        let back: PropertyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        assert_eq!(value.type_name(), "opaque");
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::from(vec![1i16, 2]).to_string(), "[1, 2]");
        assert_eq!(PropertyValue::from("mm").to_string(), "\"mm\"");
        assert_eq!(PropertyValue::Bytes(vec![0xab]).to_string(), "0xab");
    }
}
