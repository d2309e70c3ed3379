use alloc::{format, vec::Vec};
use asnkit_schema::Value;
use num::{BigInt, ToPrimitive};

use crate::error::CodecError;

/// Minimal two's complement content octets of an INTEGER value.
pub fn signed_bytes(value: &Value) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Integer(i) | Value::Enumerated(i) => Ok(minimal_signed(&i.to_be_bytes())),
        Value::BigInteger(i) => Ok(i.to_signed_bytes_be()),
        other => Err(CodecError::value_mismatch(&format!(
            "Expected an integer, found {other:?}."
        ))),
    }
}

fn minimal_signed(bytes: &[u8]) -> Vec<u8> {
    let mut start = 0;
    while start + 1 < bytes.len() {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Minimal big-endian octets of a non-negative value, at least one octet.
pub fn unsigned_bytes(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Interprets two's complement octets, narrowing to `Value::Integer`
/// whenever the value fits.
pub fn integer_from_signed_bytes(bytes: &[u8]) -> Result<Value, CodecError> {
    match bytes.len() {
        0 => Err(CodecError::unsupported("INTEGER encoding has no content octets.")),
        1..=8 => {
            let initial = if bytes[0] & 0x80 != 0 { -1i64 } else { 0 };
            Ok(Value::Integer(
                bytes
                    .iter()
                    .fold(initial, |acc, b| (acc << 8) | i64::from(*b)),
            ))
        }
        _ => Ok(BigInt::from_signed_bytes_be(bytes).into()),
    }
}

/// Big-endian octets read as an unsigned number.
pub fn integer_from_unsigned_bytes(bytes: &[u8]) -> Value {
    match bytes.len() {
        0..=7 => Value::Integer(
            bytes
                .iter()
                .fold(0i64, |acc, b| (acc << 8) | i64::from(*b)),
        ),
        _ => BigInt::from_bytes_be(num::bigint::Sign::Plus, bytes).into(),
    }
}

/// The value as `i128`, if it is an integer of that magnitude.
pub fn to_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Integer(i) | Value::Enumerated(i) => Some(i128::from(*i)),
        Value::BigInteger(i) => i.to_i128(),
        _ => None,
    }
}
