//! Identifier and length octets of a TLV.
//!
//! The parsers are `nom` streaming parsers, so a [`Reader`](crate::io::Reader)
//! can refill its window when a header straddles two input chunks.
use alloc::vec::Vec;
use asnkit_schema::{Tag, TagClass};
use nom::{
    bytes::streaming::{take, take_while},
    error::{Error, ErrorKind},
    number::streaming::be_u8,
    IResult,
};

use crate::{error::CodecError, io::Writer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    Indefinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub tag: Tag,
    pub constructed: bool,
    pub length: Length,
}

fn malformed(input: &[u8], kind: ErrorKind) -> nom::Err<Error<&[u8]>> {
    nom::Err::Error(Error::new(input, kind))
}

pub fn identifier(input: &[u8]) -> IResult<&[u8], (Tag, bool)> {
    let (input, first) = be_u8(input)?;
    let class = TagClass::from_bits(first >> 6);
    let constructed = first & 0x20 != 0;
    if first & 0x1F != 0x1F {
        return Ok((input, (Tag::new(class, u32::from(first & 0x1F)), constructed)));
    }
    let (input, continued) = take_while(|b: u8| b & 0x80 != 0)(input)?;
    let (input, last) = be_u8(input)?;
    if continued.len() > 4 || continued.first() == Some(&0x80) {
        return Err(malformed(input, ErrorKind::TooLarge));
    }
    let number = continued
        .iter()
        .chain(core::iter::once(&last))
        .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7F));
    let number = u32::try_from(number).map_err(|_| malformed(input, ErrorKind::TooLarge))?;
    Ok((input, (Tag::new(class, number), constructed)))
}

pub fn length(input: &[u8]) -> IResult<&[u8], Length> {
    let (input, first) = be_u8(input)?;
    match first {
        0x80 => Ok((input, Length::Indefinite)),
        short if short < 0x80 => Ok((input, Length::Definite(usize::from(short)))),
        long => {
            let count = usize::from(long & 0x7F);
            if count > core::mem::size_of::<usize>() {
                return Err(malformed(input, ErrorKind::TooLarge));
            }
            let (input, bytes) = take(count)(input)?;
            let value = bytes
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            Ok((input, Length::Definite(value)))
        }
    }
}

pub fn header(input: &[u8]) -> IResult<&[u8], Header> {
    let (input, (tag, constructed)) = identifier(input)?;
    let (input, length) = length(input)?;
    Ok((
        input,
        Header {
            tag,
            constructed,
            length,
        },
    ))
}

pub fn identifier_octets(tag: Tag, constructed: bool) -> Vec<u8> {
    let leading = (tag.class.bits() << 6) | if constructed { 0x20 } else { 0 };
    if tag.number < 0x1F {
        return alloc::vec![leading | tag.number as u8];
    }
    let mut octets = alloc::vec![leading | 0x1F];
    let groups = (32 - tag.number.leading_zeros()).div_ceil(7);
    for group in (0..groups).rev() {
        let byte = ((tag.number >> (7 * group)) & 0x7F) as u8;
        octets.push(if group == 0 { byte } else { byte | 0x80 });
    }
    octets
}

pub fn length_octets(length: Length) -> Vec<u8> {
    match length {
        Length::Indefinite => alloc::vec![0x80],
        Length::Definite(short) if short < 0x80 => alloc::vec![short as u8],
        Length::Definite(long) => {
            let bytes = long.to_be_bytes();
            let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
            let mut octets = alloc::vec![0x80 | (bytes.len() - first) as u8];
            octets.extend_from_slice(&bytes[first..]);
            octets
        }
    }
}

pub fn write_header(
    writer: &mut Writer<'_>,
    tag: Tag,
    constructed: bool,
    length: Length,
) -> Result<(), CodecError> {
    writer.write_buffer(&identifier_octets(tag, constructed))?;
    writer.write_buffer(&length_octets(length))
}
