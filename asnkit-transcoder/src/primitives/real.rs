use alloc::{string::String, vec, vec::Vec};
use nom::{
    bytes::complete::take,
    combinator::rest,
    number::complete::be_u8,
    IResult,
};

use crate::error::CodecError;

const PLUS_INFINITY: u8 = 0x40;
const MINUS_INFINITY: u8 = 0x41;
const NOT_A_NUMBER: u8 = 0x42;
const MINUS_ZERO: u8 = 0x43;

/// Encodes a REAL value into its content octets, using the base 2
/// binary form for finite non-zero values.
pub fn encode_real(value: f64) -> Vec<u8> {
    if value.is_nan() {
        return vec![NOT_A_NUMBER];
    }
    if value.is_infinite() {
        return vec![if value > 0.0 {
            PLUS_INFINITY
        } else {
            MINUS_INFINITY
        }];
    }
    if value == 0.0 {
        return if value.is_sign_negative() {
            vec![MINUS_ZERO]
        } else {
            vec![]
        };
    }
    let bits = value.to_bits();
    let biased_exponent = ((bits >> 52) & 0x7FF) as i32;
    let fraction = bits & ((1 << 52) - 1);
    let (mut mantissa, mut exponent) = match biased_exponent {
        0 => (fraction, -1074),
        e => (fraction | (1 << 52), e - 1075),
    };
    let shift = mantissa.trailing_zeros();
    mantissa >>= shift;
    exponent += shift as i32;

    let mut output = Vec::with_capacity(12);
    let sign = if value.is_sign_negative() { 0x40 } else { 0 };
    match i8::try_from(exponent) {
        Ok(short) => {
            output.push(0x80 | sign);
            output.push(short as u8);
        }
        Err(_) => {
            output.push(0x80 | sign | 0x01);
            output.extend_from_slice(&(exponent as i16).to_be_bytes());
        }
    }
    let mantissa_bytes = mantissa.to_be_bytes();
    let first = mantissa_bytes.iter().position(|b| *b != 0).unwrap_or(7);
    output.extend_from_slice(&mantissa_bytes[first..]);
    output
}

/// Multiplies `value` by 2^`exponent` without intermediate overflow.
fn scale_by_power_of_two(mut value: f64, mut exponent: i64) -> f64 {
    const STEP: i64 = 1000;
    let power = |e: i64| f64::from_bits(((1023 + e) as u64) << 52);
    while exponent > STEP && value.is_finite() {
        value *= power(STEP);
        exponent -= STEP;
    }
    while exponent < -STEP && value != 0.0 {
        value *= power(-STEP);
        exponent += STEP;
    }
    value * power(exponent.clamp(-STEP, STEP))
}

struct BinaryReal {
    negative: bool,
    base_bits: i64,
    scale: i64,
    exponent: i64,
    mantissa: u64,
}

fn binary_real(input: &[u8]) -> IResult<&[u8], Result<BinaryReal, &'static str>> {
    let (input, control) = be_u8(input)?;
    let (input, exponent_length) = match control & 0x03 {
        3 => {
            let (input, length) = be_u8(input)?;
            (input, usize::from(length))
        }
        n => (input, usize::from(n) + 1),
    };
    let (input, exponent_bytes) = take(exponent_length)(input)?;
    let (input, mantissa_bytes) = rest(input)?;
    let base_bits = match (control >> 4) & 0x03 {
        0 => 1,
        1 => 3,
        2 => 4,
        _ => return Ok((input, Err("reserved REAL base"))),
    };
    if exponent_bytes.is_empty() || exponent_bytes.len() > 8 {
        return Ok((input, Err("unsupported REAL exponent length")));
    }
    let significant = mantissa_bytes
        .iter()
        .position(|b| *b != 0)
        .map_or(&[][..], |first| &mantissa_bytes[first..]);
    if significant.len() > 8 {
        return Ok((input, Err("REAL mantissa exceeds 64 bits")));
    }
    let exponent = exponent_bytes.iter().fold(
        if exponent_bytes[0] & 0x80 != 0 { -1i64 } else { 0 },
        |acc, b| (acc << 8) | i64::from(*b),
    );
    let mantissa = significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Ok((
        input,
        Ok(BinaryReal {
            negative: control & 0x40 != 0,
            base_bits,
            scale: i64::from((control >> 2) & 0x03),
            exponent,
            mantissa,
        }),
    ))
}

/// Decodes REAL content octets. Accepts every binary base, the
/// special values and the decimal NR forms.
pub fn decode_real(bytes: &[u8]) -> Result<f64, CodecError> {
    let Some(first) = bytes.first() else {
        return Ok(0.0);
    };
    match first {
        b if b & 0x80 != 0 => {
            let (_, parsed) = binary_real(bytes)?;
            let real = parsed.map_err(CodecError::unsupported)?;
            let exponent = real
                .exponent
                .checked_mul(real.base_bits)
                .and_then(|e| e.checked_add(real.scale))
                .ok_or_else(|| CodecError::unsupported("REAL exponent out of range"))?;
            let magnitude = scale_by_power_of_two(real.mantissa as f64, exponent);
            Ok(if real.negative { -magnitude } else { magnitude })
        }
        &PLUS_INFINITY => Ok(f64::INFINITY),
        &MINUS_INFINITY => Ok(f64::NEG_INFINITY),
        &NOT_A_NUMBER => Ok(f64::NAN),
        &MINUS_ZERO => Ok(-0.0),
        b if b & 0xC0 == 0 && (1..=3).contains(&(b & 0x3F)) => {
            let text: String = bytes[1..]
                .iter()
                .map(|b| if *b == b',' { '.' } else { char::from(*b) })
                .collect();
            text.trim()
                .parse::<f64>()
                .map_err(|_| CodecError::unsupported("Malformed decimal REAL."))
        }
        _ => Err(CodecError::unsupported("Unknown REAL encoding.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: f64) -> f64 {
        decode_real(&encode_real(value)).unwrap()
    }

    #[test]
    fn encodes_special_values() {
        assert_eq!(encode_real(0.0), Vec::<u8>::new());
        assert_eq!(encode_real(-0.0), vec![0x43]);
        assert_eq!(encode_real(f64::INFINITY), vec![0x40]);
        assert_eq!(encode_real(f64::NEG_INFINITY), vec![0x41]);
        assert_eq!(encode_real(f64::NAN), vec![0x42]);
    }

    #[test]
    fn encodes_binary_form() {
        assert_eq!(encode_real(1.0), vec![0x80, 0x00, 0x01]);
        assert_eq!(encode_real(-0.5), vec![0xC0, 0xFF, 0x01]);
        assert_eq!(encode_real(10.0), vec![0x80, 0x01, 0x05]);
        assert_eq!(encode_real(f64::MIN_POSITIVE)[..3], [0x81, 0xFC, 0x02]);
    }

    #[test]
    fn round_trips_bit_exact() {
        for value in [
            0.123453,
            243564365.5346346324345,
            -2464365.534634632434543,
            f64::MAX,
            f64::MIN,
            f64::MIN_POSITIVE,
            f64::EPSILON,
            5e-324,
            -5e-324,
            1.0 / 3.0,
        ] {
            assert_eq!(round_trip(value).to_bits(), value.to_bits());
        }
        assert_eq!(round_trip(0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(round_trip(-0.0).to_bits(), (-0.0f64).to_bits());
        assert!(round_trip(f64::NAN).is_nan());
        assert_eq!(round_trip(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn decodes_other_bases_and_decimals() {
        // 3 * 16^1 with base 16
        assert_eq!(decode_real(&[0xA0, 0x01, 0x03]).unwrap(), 48.0);
        // 1 * 8^-1 with base 8, scale factor 1
        assert_eq!(decode_real(&[0x94, 0xFF, 0x01]).unwrap(), 0.25);
        assert_eq!(decode_real(b"\x03 12.5E1").unwrap(), 125.0);
        assert_eq!(decode_real(b"\x02-3,25").unwrap(), -3.25);
        assert!(decode_real(&[0xB0, 0x00, 0x01]).is_err());
        assert!(decode_real(&[0x44]).is_err());
    }
}
