use alloc::{format, string::String, vec::Vec};
use asnkit_schema::{
    constraints::{Constraint, ConstraintKind},
    BitString, CharacterString, CharacterStringType, ChoiceValue, Collection, Enumeration, Kind,
    Node, Record, Structure, UnknownExtension, Value,
};
use bitvec::{prelude::Msb0, vec::BitVec};
use log::{debug, trace};
use num::{bigint::Sign, BigInt};

use crate::{
    error::{CodecError, CodecErrorType},
    io::Reader,
    primitives::{
        decode_object_identifier, decode_real, integer_from_signed_bytes, unsigned_bytes,
    },
};

use super::{
    encoder::size_limits, fixed_size, range_bits, root_fields, string_is_aligned, Per,
    LENGTH_BOUND_LIMIT,
};

fn read_wide(reader: &mut Reader<'_>, n: usize) -> Result<u128, CodecError> {
    if n > 64 {
        let high = reader.read_bits(n - 64)?;
        let low = reader.read_bits(64)?;
        Ok((u128::from(high) << 64) | u128::from(low))
    } else {
        reader.read_bits(n).map(u128::from)
    }
}

fn out_of_range(what: &str, found: u128, range: u128) -> CodecError {
    CodecError::constraint_violation(&format!(
        "Decoded {what} offset {found} exceeds the range 0..{range}."
    ))
}

impl Per {
    pub(crate) fn decode_node(
        &mut self,
        reader: &mut Reader<'_>,
        node: &Node,
    ) -> Result<Value, CodecError> {
        match node.kind() {
            Kind::Null => Ok(Value::Null),
            Kind::Boolean => reader.read_bit().map(Value::Boolean),
            Kind::Integer(range) => self.decode_integer(reader, range),
            Kind::Enumerated(enumeration) => {
                self.decode_enumerated(reader, enumeration, node.is_extendable())
            }
            Kind::Real => {
                let bytes = self.read_counted(reader)?;
                decode_real(&bytes).map(Value::Real)
            }
            Kind::ObjectIdentifier => {
                let bytes = self.read_counted(reader)?;
                decode_object_identifier(&bytes).map(Value::ObjectIdentifier)
            }
            Kind::BitString(bit_string) => self.decode_bit_string(reader, bit_string),
            Kind::OctetString(size) => self.decode_octet_string(reader, size),
            Kind::CharacterString(string) => self.decode_string(reader, string),
            Kind::Sequence(members) | Kind::External(members) => self
                .decode_record(reader, members, node.is_extendable(), false)
                .map(Value::Record),
            Kind::Set(members) => self
                .decode_record(reader, members, node.is_extendable(), true)
                .map(Value::Record),
            Kind::Choice(alternatives) => self
                .decode_choice(reader, alternatives, node.is_extendable())
                .map(Value::Choice),
            Kind::SequenceOf(Collection { element, size })
            | Kind::SetOf(Collection { element, size }) => {
                let (length, _) = self.decode_size(reader, size)?;
                (0..length)
                    .map(|_| self.decode_node(reader, element))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            Kind::Any => self.read_counted(reader).map(Value::Any),
            Kind::EmbeddedPdv => self.read_counted(reader).map(Value::OctetString),
        }
    }

    /// Reads a constrained whole number in `0..=range`.
    fn read_constrained(&mut self, reader: &mut Reader<'_>, range: u128) -> Result<u128, CodecError> {
        let offset = if range == 0 {
            0
        } else if !self.aligned() || range < 255 {
            read_wide(reader, range_bits(range))?
        } else if range == 255 {
            reader.skip_to_byte_boundary();
            reader.read_bits(8)?.into()
        } else if range < 65536 {
            reader.skip_to_byte_boundary();
            reader.read_bits(16)?.into()
        } else {
            let max_bytes = unsigned_bytes(range).len();
            let length = self.read_constrained(reader, (max_bytes - 1) as u128)? as usize + 1;
            self.read_octets(reader, length)?
                .iter()
                .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte))
        };
        if offset > range {
            return Err(out_of_range("whole number", offset, range));
        }
        Ok(offset)
    }

    fn read_length(
        &mut self,
        reader: &mut Reader<'_>,
        lower: usize,
        upper: Option<usize>,
    ) -> Result<usize, CodecError> {
        if let Some(upper) = upper.filter(|upper| *upper < LENGTH_BOUND_LIMIT) {
            let offset = self.read_constrained(reader, (upper - lower) as u128)?;
            return Ok(lower + offset as usize);
        }
        if self.aligned() {
            reader.skip_to_byte_boundary();
        }
        let first = reader.read_bits(8)? as usize;
        let length = match first >> 6 {
            0b00 | 0b01 => first,
            0b10 => ((first & 0x3F) << 8) | reader.read_bits(8)? as usize,
            _ => {
                return Err(CodecError::unsupported(
                    "Fragmented length determinants are not supported.",
                ))
            }
        };
        if length < lower || upper.is_some_and(|upper| length > upper) {
            return Err(CodecError::constraint_violation(&format!(
                "Length {length} lies outside {lower}..{upper:?}."
            )));
        }
        Ok(length)
    }

    fn read_small(&mut self, reader: &mut Reader<'_>) -> Result<usize, CodecError> {
        if !reader.read_bit()? {
            return Ok(reader.read_bits(6)? as usize);
        }
        let length = self.read_length(reader, 0, None)?;
        let bytes = self.read_octets(reader, length)?;
        if bytes.len() > core::mem::size_of::<usize>() {
            return Err(CodecError::unsupported("Index does not fit the platform."));
        }
        Ok(bytes
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte)))
    }

    fn read_octets(&mut self, reader: &mut Reader<'_>, length: usize) -> Result<Vec<u8>, CodecError> {
        if length == 0 {
            Ok(Vec::new())
        } else if self.aligned() {
            reader.read_buffer(length)
        } else {
            read_raw_octets(reader, length)
        }
    }

    fn read_counted(&mut self, reader: &mut Reader<'_>) -> Result<Vec<u8>, CodecError> {
        let length = self.read_length(reader, 0, None)?;
        self.read_octets(reader, length)
    }

    fn decode_integer(
        &mut self,
        reader: &mut Reader<'_>,
        range: &Constraint,
    ) -> Result<Value, CodecError> {
        let extended = range.is_extendable() && reader.read_bit()?;
        match range.kind {
            ConstraintKind::Fixed | ConstraintKind::Extendable if !extended => {
                let offset = self.read_constrained(reader, range.upper.abs_diff(range.lower))?;
                range
                    .lower
                    .checked_add_unsigned(offset)
                    .map(Value::from)
                    .ok_or_else(|| {
                        out_of_range("INTEGER", offset, range.upper.abs_diff(range.lower))
                    })
            }
            ConstraintKind::Partial => {
                let bytes = self.read_counted(reader)?;
                if bytes.is_empty() {
                    return Err(CodecError::unsupported("INTEGER encoding has no octets."));
                }
                let offset = BigInt::from_bytes_be(Sign::Plus, &bytes);
                Ok(Value::from(offset + BigInt::from(range.lower)))
            }
            _ => {
                let bytes = self.read_counted(reader)?;
                integer_from_signed_bytes(&bytes)
            }
        }
    }

    fn decode_enumerated(
        &mut self,
        reader: &mut Reader<'_>,
        enumeration: &Enumeration,
        extendable: bool,
    ) -> Result<Value, CodecError> {
        if extendable && reader.read_bit()? {
            let index = self.read_small(reader)?;
            return enumeration
                .extension_value(index)
                .map(Value::Enumerated)
                .ok_or_else(|| {
                    CodecError::constraint_violation(&format!(
                        "Unknown enumeration extension {index}."
                    ))
                });
        }
        let range = enumeration.values.len().checked_sub(1).ok_or_else(|| {
            CodecError::new("Enumeration has no root values.", CodecErrorType::Schema)
        })?;
        let index = self.read_constrained(reader, range as u128)? as usize;
        enumeration
            .root_value(index)
            .map(Value::Enumerated)
            .ok_or_else(|| out_of_range("ENUMERATED", index as u128, range as u128))
    }

    /// Reads the size of a string or list and whether it lies in the root.
    fn decode_size(
        &mut self,
        reader: &mut Reader<'_>,
        size: &Constraint,
    ) -> Result<(usize, bool), CodecError> {
        match size.kind {
            ConstraintKind::Unconstrained | ConstraintKind::Partial => {
                Ok((self.read_length(reader, 0, None)?, true))
            }
            ConstraintKind::Fixed => {
                let (lower, upper) = size_limits(size)?;
                Ok((self.read_length(reader, lower, Some(upper))?, true))
            }
            ConstraintKind::Extendable => {
                let (lower, upper) = size_limits(size)?;
                if reader.read_bit()? {
                    Ok((self.read_length(reader, 0, None)?, false))
                } else {
                    Ok((self.read_length(reader, lower, Some(upper))?, true))
                }
            }
        }
    }

    fn decode_bit_string(
        &mut self,
        reader: &mut Reader<'_>,
        bit_string: &BitString,
    ) -> Result<Value, CodecError> {
        let (length, in_root) = self.decode_size(reader, &bit_string.size)?;
        let short = fixed_size(&bit_string.size, in_root).is_some_and(|n| n <= 16);
        if self.aligned() && !short && length > 0 {
            reader.skip_to_byte_boundary();
        }
        let mut bits: BitVec<u8, Msb0> = BitVec::new();
        let mut remaining = length;
        while remaining > 0 {
            let chunk = remaining.min(64);
            let word = reader.read_bits(chunk)?;
            bits.extend((0..chunk).rev().map(|shift| (word >> shift) & 1 == 1));
            remaining -= chunk;
        }
        Ok(Value::BitString(bits))
    }

    fn decode_octet_string(
        &mut self,
        reader: &mut Reader<'_>,
        size: &Constraint,
    ) -> Result<Value, CodecError> {
        let (length, in_root) = self.decode_size(reader, size)?;
        let bytes = if fixed_size(size, in_root).is_some_and(|n| n <= 2) {
            read_raw_octets(reader, length)?
        } else {
            self.read_octets(reader, length)?
        };
        Ok(Value::OctetString(bytes))
    }

    fn decode_string(
        &mut self,
        reader: &mut Reader<'_>,
        string: &CharacterString,
    ) -> Result<Value, CodecError> {
        if string.r#type == CharacterStringType::UTF8String {
            let bytes = self.read_counted(reader)?;
            return String::from_utf8(bytes).map(Value::String).map_err(|e| {
                CodecError::new(
                    &format!("Invalid UTF-8: {e}"),
                    CodecErrorType::UnsupportedEncoding,
                )
            });
        }
        if !string.r#type.is_supported() {
            return Err(CodecError::unsupported(&format!(
                "{:?} has no packed encoding.",
                string.r#type
            )));
        }
        let alphabet = string.alphabet.as_ref().ok_or_else(|| {
            CodecError::new(
                &format!("{:?} carries no alphabet.", string.r#type),
                CodecErrorType::Schema,
            )
        })?;
        let bits = alphabet.bits(self.aligned());
        let full_width = alphabet.is_full_width(bits);
        let (length, in_root) = self.decode_size(reader, &string.size)?;
        if self.aligned() && length > 0 && string_is_aligned(&string.size, in_root, bits as usize)
        {
            reader.skip_to_byte_boundary();
        }
        (0..length)
            .map(|_| {
                let code = reader.read_bits(bits as usize)? as u32;
                if full_width {
                    char::from_u32(code).filter(|c| alphabet.contains(*c))
                } else {
                    alphabet.char_at(code)
                }
                .ok_or_else(|| {
                    CodecError::constraint_violation(&format!(
                        "Character code {code} is not permitted in a {:?}.",
                        string.r#type
                    ))
                })
            })
            .collect::<Result<String, _>>()
            .map(Value::String)
    }

    fn decode_record(
        &mut self,
        reader: &mut Reader<'_>,
        members: &Structure,
        extendable: bool,
        sorted: bool,
    ) -> Result<Record, CodecError> {
        let extended = extendable && reader.read_bit()?;
        let roots = root_fields(members, sorted);
        let presence = roots
            .iter()
            .filter(|f| f.node.is_optional())
            .map(|_| reader.read_bit())
            .collect::<Result<Vec<_>, _>>()?;
        let mut presence = presence.into_iter();
        let mut record = Record::new();
        for field in roots {
            let present = !field.node.is_optional() || presence.next().unwrap_or(false);
            if present {
                let value = self.decode_node(reader, &field.node)?;
                record.insert(&field.name, value);
            }
        }
        if extended {
            self.decode_extensions(reader, members, &mut record)?;
        }
        for field in members.all() {
            if record.contains(&field.name) {
                continue;
            }
            if let Some(default) = field.node.default_value() {
                record.insert(&field.name, default.clone());
            }
        }
        Ok(record)
    }

    fn decode_extensions(
        &mut self,
        reader: &mut Reader<'_>,
        members: &Structure,
        record: &mut Record,
    ) -> Result<(), CodecError> {
        let count = self.read_small(reader)? + 1;
        let bitmap = (0..count)
            .map(|_| reader.read_bit())
            .collect::<Result<Vec<_>, _>>()?;
        for (index, _) in bitmap.iter().enumerate().filter(|(_, present)| **present) {
            let payload = self.read_counted(reader)?;
            match members.extensions.get(index) {
                Some(field) => {
                    let value = self.decode_node(&mut Reader::new(&payload), &field.node)?;
                    record.insert(&field.name, value);
                }
                None => {
                    debug!("keeping unknown extension addition {index}");
                    record
                        .unknown_extensions
                        .push(UnknownExtension { index, payload });
                }
            }
        }
        Ok(())
    }

    fn decode_choice(
        &mut self,
        reader: &mut Reader<'_>,
        alternatives: &Structure,
        extendable: bool,
    ) -> Result<ChoiceValue, CodecError> {
        if extendable && reader.read_bit()? {
            let index = self.read_small(reader)?;
            let payload = self.read_counted(reader)?;
            return match alternatives.extensions.get(index) {
                Some(field) => {
                    let value = self.decode_node(&mut Reader::new(&payload), &field.node)?;
                    Ok(ChoiceValue::Alternative(field.name.clone(), value.into()))
                }
                None => {
                    trace!("unknown extension alternative {index}");
                    Ok(ChoiceValue::UnknownExtension { index, payload })
                }
            };
        }
        let range = alternatives.fields.len().checked_sub(1).ok_or_else(|| {
            CodecError::new("CHOICE has no root alternatives.", CodecErrorType::Schema)
        })?;
        let index = self.read_constrained(reader, range as u128)? as usize;
        let field = alternatives
            .fields
            .get(index)
            .ok_or_else(|| out_of_range("CHOICE index", index as u128, range as u128))?;
        let value = self.decode_node(reader, &field.node)?;
        Ok(ChoiceValue::Alternative(field.name.clone(), value.into()))
    }
}

/// Octets that are never aligned, in either variant.
fn read_raw_octets(reader: &mut Reader<'_>, length: usize) -> Result<Vec<u8>, CodecError> {
    (0..length)
        .map(|_| reader.read_bits(8).map(|byte| byte as u8))
        .collect()
}
