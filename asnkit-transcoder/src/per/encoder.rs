use alloc::{format, vec, vec::Vec};
use asnkit_schema::{
    constraints::{Constraint, ConstraintKind},
    BitString, CharacterString, CharacterStringType, ChoiceValue, Collection, Enumeration, Field,
    Kind, Node, Record, Structure, Value,
};
use bitvec::{prelude::Msb0, slice::BitSlice};
use num::{bigint::Sign, BigInt};

use crate::{
    error::{CodecError, CodecErrorType},
    io::{ScratchWriters, Writer},
    primitives::{encode_object_identifier, encode_real, signed_bytes, to_i128, unsigned_bytes},
};

use super::{
    fixed_size, range_bits, root_fields, string_is_aligned, Per, LENGTH_BOUND_LIMIT,
    MAX_UNFRAGMENTED_LENGTH,
};

fn mismatch(node: &Node, value: &Value) -> CodecError {
    CodecError::value_mismatch(&format!(
        "Value {value:?} does not fit the schema node {:?}.",
        node.kind()
    ))
}

pub(super) fn size_limits(size: &Constraint) -> Result<(usize, usize), CodecError> {
    size.size_bounds().ok_or_else(|| {
        CodecError::new(
            &format!("Size limits {}..{} are not lengths.", size.lower, size.upper),
            CodecErrorType::Schema,
        )
    })
}

/// Writes the `n` low bits of `value`. `n` may exceed 64.
fn write_wide(writer: &mut Writer<'_>, n: usize, value: u128) -> Result<(), CodecError> {
    if n > 64 {
        writer.write_bits(n - 64, (value >> 64) as u64)?;
        writer.write_bits(64, value as u64)
    } else {
        writer.write_bits(n, value as u64)
    }
}

/// A member is encoded unless it is missing or equals its default.
///
/// A value equal to its DEFAULT gets a clear presence bit, as X.691
/// requires for canonical PER. Encoders that set the bit for such values
/// produce longer encodings that still decode to the same record.
fn present<'a>(record: &'a Record, field: &Field) -> Option<&'a Value> {
    record
        .get(&field.name)
        .filter(|value| field.node.default_value() != Some(*value))
}

impl Per {
    /// Encodes a complete value: at least one octet, padded to whole octets.
    pub(crate) fn encode_complete(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        let start = writer.bit_position();
        self.encode_node(value, node, writer)?;
        if writer.bit_position() == start {
            writer.write_bits(8, 0)?;
        }
        writer.pad_to_byte_boundary();
        Ok(())
    }

    fn encode_node(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        match (node.kind(), value) {
            (Kind::Null, Value::Null) => Ok(()),
            (Kind::Boolean, Value::Boolean(b)) => writer.write_bit(*b),
            (Kind::Integer(range), Value::Integer(_) | Value::BigInteger(_)) => {
                self.encode_integer(value, range, writer)
            }
            (Kind::Enumerated(enumeration), Value::Enumerated(v) | Value::Integer(v)) => {
                self.encode_enumerated(*v, enumeration, node.is_extendable(), writer)
            }
            (Kind::Real, Value::Real(real)) => self.write_counted(&encode_real(*real), writer),
            (Kind::ObjectIdentifier, Value::ObjectIdentifier(oid)) => {
                self.write_counted(&encode_object_identifier(oid)?, writer)
            }
            (Kind::BitString(bit_string), Value::BitString(bits)) => {
                self.encode_bit_string(bits, bit_string, writer)
            }
            (Kind::OctetString(size), Value::OctetString(bytes)) => {
                self.encode_octet_string(bytes, size, writer)
            }
            (Kind::CharacterString(string), Value::String(text)) => {
                self.encode_string(text, string, writer)
            }
            (Kind::Sequence(members) | Kind::External(members), Value::Record(record)) => {
                self.encode_record(record, members, node.is_extendable(), false, writer)
            }
            (Kind::Set(members), Value::Record(record)) => {
                self.encode_record(record, members, node.is_extendable(), true, writer)
            }
            (Kind::Choice(alternatives), Value::Choice(choice)) => {
                self.encode_choice(choice, alternatives, node.is_extendable(), writer)
            }
            (
                Kind::SequenceOf(Collection { element, size })
                | Kind::SetOf(Collection { element, size }),
                Value::List(items),
            ) => {
                self.encode_size(items.len(), size, writer)?;
                items
                    .iter()
                    .try_for_each(|item| self.encode_node(item, element, writer))
            }
            (Kind::Any, Value::Any(bytes)) | (Kind::EmbeddedPdv, Value::OctetString(bytes)) => {
                self.write_counted(bytes, writer)
            }
            (_, other) => Err(mismatch(node, other)),
        }
    }

    /// Writes `offset` as a constrained whole number in `0..=range`.
    fn write_constrained(
        &mut self,
        offset: u128,
        range: u128,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        if range == 0 {
            return Ok(());
        }
        if !self.aligned() || range < 255 {
            return write_wide(writer, range_bits(range), offset);
        }
        if range == 255 {
            writer.pad_to_byte_boundary();
            return writer.write_bits(8, offset as u64);
        }
        if range < 65536 {
            writer.pad_to_byte_boundary();
            return writer.write_bits(16, offset as u64);
        }
        let bytes = unsigned_bytes(offset);
        let max_bytes = unsigned_bytes(range).len();
        self.write_constrained((bytes.len() - 1) as u128, (max_bytes - 1) as u128, writer)?;
        self.write_octets(&bytes, writer)
    }

    fn write_length(
        &mut self,
        length: usize,
        lower: usize,
        upper: Option<usize>,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        if length < lower || upper.is_some_and(|upper| length > upper) {
            return Err(CodecError::constraint_violation(&format!(
                "Length {length} lies outside {lower}..{upper:?}."
            )));
        }
        match upper {
            Some(upper) if upper < LENGTH_BOUND_LIMIT => {
                self.write_constrained((length - lower) as u128, (upper - lower) as u128, writer)
            }
            _ => {
                if self.aligned() {
                    writer.pad_to_byte_boundary();
                }
                if length < 128 {
                    writer.write_bits(8, length as u64)
                } else if length < MAX_UNFRAGMENTED_LENGTH {
                    writer.write_bits(16, 0x8000 | length as u64)
                } else {
                    Err(CodecError::unsupported(&format!(
                        "Length {length} requires fragmentation."
                    )))
                }
            }
        }
    }

    /// Normally small non-negative whole number.
    fn write_small(&mut self, number: usize, writer: &mut Writer<'_>) -> Result<(), CodecError> {
        if number < 64 {
            writer.write_bit(false)?;
            return writer.write_bits(6, number as u64);
        }
        writer.write_bit(true)?;
        let bytes = unsigned_bytes(number as u128);
        self.write_length(bytes.len(), 0, None, writer)?;
        self.write_octets(&bytes, writer)
    }

    fn write_octets(&mut self, bytes: &[u8], writer: &mut Writer<'_>) -> Result<(), CodecError> {
        if bytes.is_empty() {
            Ok(())
        } else if self.aligned() {
            writer.write_buffer(bytes)
        } else {
            bytes
                .iter()
                .try_for_each(|byte| writer.write_bits(8, (*byte).into()))
        }
    }

    /// Unconstrained length determinant followed by `bytes`.
    fn write_counted(&mut self, bytes: &[u8], writer: &mut Writer<'_>) -> Result<(), CodecError> {
        self.write_length(bytes.len(), 0, None, writer)?;
        self.write_octets(bytes, writer)
    }

    fn write_open_type(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        let payload = self.nested(|per, w| per.encode_complete(value, node, w))?;
        self.write_counted(&payload, writer)
    }

    fn encode_integer(
        &mut self,
        value: &Value,
        range: &Constraint,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        let in_root = to_i128(value).filter(|n| range.contains(*n));
        match (range.kind, in_root) {
            (ConstraintKind::Fixed, Some(n)) => self.write_constrained(
                n.abs_diff(range.lower),
                range.upper.abs_diff(range.lower),
                writer,
            ),
            (ConstraintKind::Fixed, None) => Err(CodecError::constraint_violation(&format!(
                "INTEGER {value:?} lies outside {}..{}.",
                range.lower, range.upper
            ))),
            (ConstraintKind::Extendable, Some(n)) => {
                writer.write_bit(false)?;
                self.write_constrained(
                    n.abs_diff(range.lower),
                    range.upper.abs_diff(range.lower),
                    writer,
                )
            }
            (ConstraintKind::Extendable, None) | (ConstraintKind::Unconstrained, _) => {
                if range.is_extendable() {
                    writer.write_bit(true)?;
                }
                self.write_counted(&signed_bytes(value)?, writer)
            }
            (ConstraintKind::Partial, _) => {
                let number = match value {
                    Value::Integer(i) => BigInt::from(*i),
                    Value::BigInteger(i) => i.clone(),
                    other => return Err(CodecError::value_mismatch(&format!("{other:?}"))),
                };
                let (sign, magnitude) = (number - BigInt::from(range.lower)).to_bytes_be();
                if sign == Sign::Minus {
                    return Err(CodecError::constraint_violation(&format!(
                        "INTEGER {value:?} lies below {}.",
                        range.lower
                    )));
                }
                self.write_counted(&magnitude, writer)
            }
        }
    }

    fn encode_enumerated(
        &mut self,
        value: i64,
        enumeration: &Enumeration,
        extendable: bool,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        if let Some(index) = enumeration.root_index(value) {
            if extendable {
                writer.write_bit(false)?;
            }
            let range = enumeration.values.len() - 1;
            return self.write_constrained(index as u128, range as u128, writer);
        }
        match enumeration.extension_index(value) {
            Some(index) if extendable => {
                writer.write_bit(true)?;
                self.write_small(index, writer)
            }
            _ => Err(CodecError::value_mismatch(&format!(
                "{value} is not a value of the enumeration."
            ))),
        }
    }

    /// Writes the size of a string or list and reports whether it lies in
    /// the root of `size`.
    fn encode_size(
        &mut self,
        length: usize,
        size: &Constraint,
        writer: &mut Writer<'_>,
    ) -> Result<bool, CodecError> {
        match size.kind {
            ConstraintKind::Unconstrained => self.write_length(length, 0, None, writer)?,
            ConstraintKind::Partial => {
                if (length as i128) < size.lower {
                    return Err(CodecError::constraint_violation(&format!(
                        "Size {length} lies below {}.",
                        size.lower
                    )));
                }
                self.write_length(length, 0, None, writer)?
            }
            ConstraintKind::Fixed => {
                let (lower, upper) = size_limits(size)?;
                self.write_length(length, lower, Some(upper), writer)?
            }
            ConstraintKind::Extendable => {
                let (lower, upper) = size_limits(size)?;
                let in_root = (lower..=upper).contains(&length);
                writer.write_bit(!in_root)?;
                if in_root {
                    self.write_length(length, lower, Some(upper), writer)?
                } else {
                    self.write_length(length, 0, None, writer)?
                }
                return Ok(in_root);
            }
        }
        Ok(true)
    }

    fn encode_bit_string(
        &mut self,
        bits: &BitSlice<u8, Msb0>,
        bit_string: &BitString,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        let in_root = self.encode_size(bits.len(), &bit_string.size, writer)?;
        let short = fixed_size(&bit_string.size, in_root).is_some_and(|n| n <= 16);
        if self.aligned() && !short && !bits.is_empty() {
            writer.pad_to_byte_boundary();
        }
        writer.write_bit_slice(bits)
    }

    fn encode_octet_string(
        &mut self,
        bytes: &[u8],
        size: &Constraint,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        let in_root = self.encode_size(bytes.len(), size, writer)?;
        if fixed_size(size, in_root).is_some_and(|n| n <= 2) {
            bytes
                .iter()
                .try_for_each(|byte| writer.write_bits(8, (*byte).into()))
        } else {
            self.write_octets(bytes, writer)
        }
    }

    fn encode_string(
        &mut self,
        text: &str,
        string: &CharacterString,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        if string.r#type == CharacterStringType::UTF8String {
            return self.write_counted(text.as_bytes(), writer);
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
        let length = text.chars().count();
        let in_root = self.encode_size(length, &string.size, writer)?;
        if self.aligned() && length > 0 && string_is_aligned(&string.size, in_root, bits as usize)
        {
            writer.pad_to_byte_boundary();
        }
        for c in text.chars() {
            let code = if full_width {
                alphabet.contains(c).then_some(c as u32)
            } else {
                alphabet.index_of(c)
            }
            .ok_or_else(|| {
                CodecError::constraint_violation(&format!(
                    "Character {c:?} is not permitted in a {:?}.",
                    string.r#type
                ))
            })?;
            writer.write_bits(bits as usize, code.into())?;
        }
        Ok(())
    }

    fn encode_record(
        &mut self,
        record: &Record,
        members: &Structure,
        extendable: bool,
        sorted: bool,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        if let Some(unknown) = record.names().find(|name| members.field(name).is_none()) {
            return Err(CodecError::value_mismatch(&format!(
                "The schema declares no member {unknown}."
            )));
        }
        let extended = extendable
            && (members
                .extensions
                .iter()
                .any(|f| present(record, f).is_some())
                || !record.unknown_extensions.is_empty());
        if extendable {
            writer.write_bit(extended)?;
        }
        let roots = root_fields(members, sorted);
        for field in roots.iter().filter(|f| f.node.is_optional()) {
            writer.write_bit(present(record, field).is_some())?;
        }
        for field in roots {
            match present(record, field) {
                Some(value) => self.encode_node(value, &field.node, writer)?,
                None if field.node.is_optional() => {}
                None => {
                    return Err(CodecError::value_mismatch(&format!(
                        "Mandatory member {} is missing.",
                        field.name
                    )))
                }
            }
        }
        if extended {
            self.encode_extensions(record, members, writer)?;
        }
        Ok(())
    }

    fn encode_extensions(
        &mut self,
        record: &Record,
        members: &Structure,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        let slots = record
            .unknown_extensions
            .iter()
            .map(|u| u.index + 1)
            .fold(members.extensions.len(), usize::max);
        let mut payloads: Vec<Option<Vec<u8>>> = vec![None; slots];
        for (index, field) in members.extensions.iter().enumerate() {
            if let Some(value) = present(record, field) {
                let payload = self.nested(|per, w| per.encode_complete(value, &field.node, w))?;
                payloads[index] = Some(payload);
            }
        }
        for unknown in &record.unknown_extensions {
            let slot = &mut payloads[unknown.index];
            if slot.is_some() {
                return Err(CodecError::value_mismatch(&format!(
                    "Extension addition {} is given twice.",
                    unknown.index
                )));
            }
            *slot = Some(unknown.payload.clone());
        }
        while payloads.last().is_some_and(Option::is_none) {
            payloads.pop();
        }
        self.write_small(payloads.len().saturating_sub(1), writer)?;
        for payload in &payloads {
            writer.write_bit(payload.is_some())?;
        }
        for payload in payloads.iter().flatten() {
            self.write_counted(payload, writer)?;
        }
        Ok(())
    }

    fn encode_choice(
        &mut self,
        choice: &ChoiceValue,
        alternatives: &Structure,
        extendable: bool,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        match choice {
            ChoiceValue::Alternative(name, value) => {
                if let Some(index) = alternatives.fields.iter().position(|f| &f.name == name) {
                    if extendable {
                        writer.write_bit(false)?;
                    }
                    let range = alternatives.fields.len() - 1;
                    self.write_constrained(index as u128, range as u128, writer)?;
                    return self.encode_node(value, &alternatives.fields[index].node, writer);
                }
                match alternatives.extensions.iter().position(|f| &f.name == name) {
                    Some(index) if extendable => {
                        writer.write_bit(true)?;
                        self.write_small(index, writer)?;
                        self.write_open_type(value, &alternatives.extensions[index].node, writer)
                    }
                    _ => Err(CodecError::value_mismatch(&format!(
                        "The schema declares no alternative {name}."
                    ))),
                }
            }
            ChoiceValue::UnknownExtension { index, payload } if extendable => {
                writer.write_bit(true)?;
                self.write_small(*index, writer)?;
                self.write_counted(payload, writer)
            }
            other => Err(CodecError::value_mismatch(&format!(
                "{other:?} cannot be written with packed encoding rules."
            ))),
        }
    }
}
