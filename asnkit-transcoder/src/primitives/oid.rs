use alloc::{format, string::String, vec::Vec};
use nom::{
    bytes::complete::{take, take_while},
    combinator::{all_consuming, map_res, recognize},
    multi::many1,
    sequence::pair,
    IResult,
};

use crate::error::CodecError;

/// Encodes a dotted-decimal object identifier into its content octets.
pub fn encode_object_identifier(oid: &str) -> Result<Vec<u8>, CodecError> {
    let arcs = oid
        .split('.')
        .map(|arc| arc.trim().parse::<u64>())
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|_| {
            CodecError::value_mismatch(&format!("Malformed object identifier {oid}."))
        })?;
    let (first, rest) = match arcs.as_slice() {
        [c0 @ 0..=1, c1 @ 0..=39, rest @ ..] => (c0 * 40 + c1, rest),
        [2, c1, rest @ ..] => {
            let first = c1.checked_add(80).ok_or_else(|| {
                CodecError::value_mismatch(&format!("Second arc of {oid} is too large."))
            })?;
            (first, rest)
        }
        _ => {
            return Err(CodecError::value_mismatch(&format!(
                "Object identifier {oid} has invalid leading arcs."
            )))
        }
    };
    let mut output = Vec::new();
    for arc in core::iter::once(first).chain(rest.iter().copied()) {
        push_base128(arc, &mut output);
    }
    Ok(output)
}

fn push_base128(value: u64, output: &mut Vec<u8>) {
    let groups = (64 - value.leading_zeros()).div_ceil(7).max(1);
    for group in (0..groups).rev() {
        let byte = ((value >> (7 * group)) & 0x7F) as u8;
        output.push(if group == 0 { byte } else { byte | 0x80 });
    }
}

fn arc(input: &[u8]) -> IResult<&[u8], u64> {
    map_res(
        recognize(pair(take_while(|b: u8| b & 0x80 != 0), take(1usize))),
        |bytes: &[u8]| {
            if bytes.len() > 9 || bytes[0] == 0x80 {
                return Err(());
            }
            Ok(bytes
                .iter()
                .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7F)))
        },
    )(input)
}

/// Decodes object identifier content octets into dotted-decimal form.
pub fn decode_object_identifier(bytes: &[u8]) -> Result<String, CodecError> {
    let (_, arcs) = all_consuming(many1(arc))(bytes)?;
    let (c0, c1) = match arcs[0] {
        v if v < 40 => (0, v),
        v if v < 80 => (1, v - 40),
        v => (2, v - 80),
    };
    let mut dotted = format!("{c0}.{c1}");
    for arc in &arcs[1..] {
        dotted.push_str(&format!(".{arc}"));
    }
    Ok(dotted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_object_identifiers() {
        assert_eq!(
            encode_object_identifier("1.2.840.113549.1.1.11").unwrap(),
            vec![0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B]
        );
        assert_eq!(encode_object_identifier("2.5.4.3").unwrap(), vec![0x55, 0x04, 0x03]);
        assert_eq!(encode_object_identifier("2.999.3").unwrap(), vec![0x88, 0x37, 0x03]);
        assert_eq!(encode_object_identifier("0.0").unwrap(), vec![0x00]);
    }

    #[test]
    fn decodes_object_identifiers() {
        assert_eq!(
            decode_object_identifier(&[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B])
                .unwrap(),
            "1.2.840.113549.1.1.11"
        );
        assert_eq!(decode_object_identifier(&[0x55, 0x1D, 0x0E]).unwrap(), "2.5.29.14");
        assert_eq!(decode_object_identifier(&[0x88, 0x37, 0x03]).unwrap(), "2.999.3");
        assert_eq!(decode_object_identifier(&[0x27]).unwrap(), "0.39");
        assert_eq!(decode_object_identifier(&[0x4F]).unwrap(), "1.39");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(encode_object_identifier("1").is_err());
        assert!(encode_object_identifier("1.40").is_err());
        assert!(encode_object_identifier("3.1").is_err());
        assert!(encode_object_identifier("1.2.x").is_err());
        assert_eq!(
            encode_object_identifier("2.18446744073709551615")
                .unwrap_err()
                .kind,
            crate::error::CodecErrorType::ValueMismatch
        );
        assert_eq!(
            encode_object_identifier("2.18446744073709551535").unwrap(),
            vec![0x81, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]
        );
        assert!(decode_object_identifier(&[]).is_err());
        assert!(decode_object_identifier(&[0x2A, 0x86]).is_err());
    }
}
