//! Typed value access
//!
//! Converts native values to and from the little-endian wire encoding of a
//! parameter, using the type tag and byte length from its descriptor.

use serde::{Deserialize, Serialize};

use super::{DataType, ParamDescriptor};
use crate::protocol::CommandError;

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Scalar numeric value
    Scalar(f64),
    /// Homogeneous array of values
    Array(Vec<f64>),
}

impl Value {
    /// Get as scalar, returning None if not a scalar
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// All contained numbers, in order
    pub fn values(&self) -> &[f64] {
        match self {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Array(v) => v,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(v)
    }
}

/// Encode a value for writing into `param`.
///
/// Every element must be finite and representable by the wire type; NaN is
/// rejected along with infinities.
pub fn encode_value(param: &ParamDescriptor, value: &Value) -> Result<Vec<u8>, CommandError> {
    if !param.is_writable() {
        return Err(CommandError::NotWritable(param.name.clone()));
    }
    let data_type = DataType::from_tag(param.type_tag).ok_or_else(|| CommandError::UnknownDataType {
        param: param.name.clone(),
        tag: param.type_tag,
    })?;

    let expected = param.element_count();
    let values = value.values();
    if values.len() != expected {
        return Err(CommandError::LengthMismatch {
            param: param.name.clone(),
            expected,
            actual: values.len(),
        });
    }

    let mut out = Vec::with_capacity(param.byte_length);
    for &v in values {
        let fits = match data_type.integer_range() {
            Some((min, max)) => v.fract() == 0.0 && v >= min && v <= max,
            None => v.is_finite() && (data_type != DataType::F32 || v.abs() <= f32::MAX as f64),
        };
        if !fits {
            return Err(CommandError::ValueOutOfRange {
                param: param.name.clone(),
                value: v,
            });
        }
        data_type.write_le(&mut out, v);
    }
    Ok(out)
}

/// Decode the wire bytes of `param`.
///
/// `bytes` must hold at least `param.byte_length` bytes; payload sizes are
/// checked by the response parser before decoding.
pub fn decode_value(param: &ParamDescriptor, bytes: &[u8]) -> Value {
    let data_type = param.data_type();
    let size = data_type.size_bytes();
    let values: Vec<f64> = bytes[..param.element_count() * size]
        .chunks_exact(size)
        .map(|chunk| data_type.read_le(chunk))
        .collect();

    if param.is_array() {
        Value::Array(values)
    } else {
        Value::Scalar(values.first().copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Access;

    fn param(type_tag: u8, byte_length: usize, access: Access) -> ParamDescriptor {
        ParamDescriptor {
            name: "Test".to_string(),
            number: 3,
            type_tag,
            access,
            byte_length,
        }
    }

    #[test]
    fn test_scalar_encoding() {
        let p = param(0x02, 2, Access::ReadWrite);
        assert_eq!(encode_value(&p, &Value::Scalar(0x1234 as f64)).unwrap(), vec![0x34, 0x12]);
        assert_eq!(decode_value(&p, &[0x34, 0x12]), Value::Scalar(4660.0));
    }

    #[test]
    fn test_float_encoding() {
        let p = param(0x06, 4, Access::ReadWrite);
        let bytes = encode_value(&p, &Value::Scalar(1.5)).unwrap();
        assert_eq!(bytes, 1.5f32.to_le_bytes().to_vec());
        assert_eq!(decode_value(&p, &bytes), Value::Scalar(1.5));
    }

    #[test]
    fn test_array_encoding() {
        let p = param(0x83, 6, Access::ReadWrite);
        let value = Value::Array(vec![-1.0, 0.0, 300.0]);
        let bytes = encode_value(&p, &value).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x00, 0x00, 0x2C, 0x01]);
        assert_eq!(decode_value(&p, &bytes), value);
    }

    #[test]
    fn test_read_only_rejected() {
        let p = param(0x00, 1, Access::ReadOnly);
        assert!(matches!(
            encode_value(&p, &Value::Scalar(1.0)),
            Err(CommandError::NotWritable(_))
        ));
    }

    #[test]
    fn test_count_mismatch() {
        let p = param(0x86, 8, Access::ReadWrite);
        let err = encode_value(&p, &Value::Array(vec![1.0, 2.0, 3.0])).unwrap_err();
        assert!(matches!(
            err,
            CommandError::LengthMismatch { expected: 2, actual: 3, .. }
        ));
        assert!(encode_value(&p, &Value::Scalar(1.0)).is_err());
    }

    #[test]
    fn test_out_of_range() {
        let p = param(0x00, 1, Access::ReadWrite);
        assert!(matches!(
            encode_value(&p, &Value::Scalar(256.0)),
            Err(CommandError::ValueOutOfRange { .. })
        ));
        assert!(encode_value(&p, &Value::Scalar(1.5)).is_err());
        assert!(encode_value(&p, &Value::Scalar(-1.0)).is_err());
        assert_eq!(encode_value(&p, &Value::Scalar(255.0)).unwrap(), vec![0xFF]);
    }

    #[test]
    fn test_f32_overflow_rejected() {
        let p = param(0x06, 4, Access::ReadWrite);
        assert!(matches!(
            encode_value(&p, &Value::Scalar(1e300)),
            Err(CommandError::ValueOutOfRange { .. })
        ));
        assert!(encode_value(&p, &Value::Scalar(f32::MAX as f64)).is_ok());

        let wide = param(0x07, 8, Access::ReadWrite);
        assert_eq!(encode_value(&wide, &Value::Scalar(1e300)).unwrap(), 1e300f64.to_le_bytes().to_vec());
    }

    #[test]
    fn test_non_finite_rejected() {
        for tag in [0x06, 0x07] {
            let p = param(tag, if tag == 0x06 { 4 } else { 8 }, Access::ReadWrite);
            for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                assert!(matches!(
                    encode_value(&p, &Value::Scalar(v)),
                    Err(CommandError::ValueOutOfRange { .. })
                ));
            }
        }
    }

    #[test]
    fn test_unknown_type_tag() {
        let p = param(0x0F, 1, Access::ReadWrite);
        assert!(matches!(
            encode_value(&p, &Value::Scalar(1.0)),
            Err(CommandError::UnknownDataType { tag: 0x0F, .. })
        ));
    }
}
