use alloc::{format, vec, vec::Vec};
use asnkit_schema::{
    BitString, CharacterStringType, ChoiceValue, Collection, Kind, Node, Record, Structure, Tag,
    Value,
};
use bitvec::{prelude::Msb0, vec::BitVec};

use crate::{
    error::{CodecError, CodecErrorType},
    io::{ScratchWriters, Writer},
    primitives::{encode_object_identifier, encode_real, signed_bytes},
};

use super::{
    header::{identifier, write_header, Length},
    Der,
};

pub(crate) fn value_mismatch(node: &Node, value: &Value) -> CodecError {
    CodecError::value_mismatch(&format!(
        "Value {value:?} does not fit the schema node tagged {:?}.",
        node.outer_tag()
    ))
}

pub(crate) fn untagged(node: &Node) -> CodecError {
    CodecError::new(
        &format!("Schema node {:?} carries no tag.", node.kind()),
        CodecErrorType::Schema,
    )
}

impl Der {
    pub(crate) fn encode_node(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        self.encode_wrapped(value, node, node.explicit_tags(), writer)
    }

    fn encode_wrapped(
        &mut self,
        value: &Value,
        node: &Node,
        explicit: &[Tag],
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        let Some((outer, inner)) = explicit.split_first() else {
            return self.encode_tlv(value, node, writer);
        };
        let content = self.nested(|der, w| der.encode_wrapped(value, node, inner, w))?;
        write_header(writer, *outer, true, Length::Definite(content.len()))?;
        writer.write_buffer(&content)
    }

    fn encode_tlv(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        match (node.kind(), value) {
            (Kind::Choice(alternatives), Value::Choice(choice)) => {
                self.encode_choice(choice, alternatives, writer)
            }
            (Kind::Any, Value::Any(tlv)) => writer.write_buffer(tlv),
            (Kind::Choice(_) | Kind::Any, other) => Err(value_mismatch(node, other)),
            (kind, _) => {
                let tag = node.tag().ok_or_else(|| untagged(node))?;
                let content = self.encode_content(value, node)?;
                write_header(
                    writer,
                    tag,
                    kind.is_constructed(),
                    Length::Definite(content.len()),
                )?;
                writer.write_buffer(&content)
            }
        }
    }

    /// Content octets of a node that carries its own tag.
    pub(crate) fn encode_content(
        &mut self,
        value: &Value,
        node: &Node,
    ) -> Result<Vec<u8>, CodecError> {
        match (node.kind(), value) {
            (Kind::Null, Value::Null) => Ok(Vec::new()),
            (Kind::Boolean, Value::Boolean(b)) => Ok(vec![if *b { 0xFF } else { 0x00 }]),
            (Kind::Integer(_), Value::Integer(_) | Value::BigInteger(_))
            | (Kind::Enumerated(_), Value::Enumerated(_) | Value::Integer(_)) => {
                signed_bytes(value)
            }
            (Kind::Real, Value::Real(real)) => Ok(encode_real(*real)),
            (Kind::ObjectIdentifier, Value::ObjectIdentifier(oid)) => {
                encode_object_identifier(oid)
            }
            (Kind::BitString(bit_string), Value::BitString(bits)) => {
                Ok(self.bit_string_content(bit_string, bits))
            }
            (Kind::OctetString(_) | Kind::EmbeddedPdv, Value::OctetString(bytes)) => {
                Ok(bytes.clone())
            }
            (Kind::CharacterString(string), Value::String(text)) => {
                string_content(string.r#type, text)
            }
            (Kind::Sequence(members) | Kind::External(members), Value::Record(record)) => {
                self.nested(|der, w| der.encode_members(record, members, false, w))
            }
            (Kind::Set(members), Value::Record(record)) => {
                let sort = self.rules.canonical;
                self.nested(|der, w| der.encode_members(record, members, sort, w))
            }
            (Kind::SequenceOf(Collection { element, .. }), Value::List(items)) => {
                self.nested(|der, w| {
                    items
                        .iter()
                        .try_for_each(|item| der.encode_node(item, element, w))
                })
            }
            (Kind::SetOf(Collection { element, .. }), Value::List(items)) => {
                let mut encoded = items
                    .iter()
                    .map(|item| self.nested(|der, w| der.encode_node(item, element, w)))
                    .collect::<Result<Vec<_>, _>>()?;
                if self.rules.canonical {
                    encoded.sort();
                }
                Ok(encoded.concat())
            }
            (_, other) => Err(value_mismatch(node, other)),
        }
    }

    fn bit_string_content(&self, bit_string: &BitString, bits: &BitVec<u8, Msb0>) -> Vec<u8> {
        let mut bits = bits.clone();
        if self.rules.canonical && !bit_string.named_bits.is_empty() {
            bits.truncate(bits.last_one().map_or(0, |last| last + 1));
        }
        let unused = (8 - bits.len() % 8) % 8;
        bits.set_uninitialized(false);
        let mut content = vec![unused as u8];
        content.extend_from_slice(bits.as_raw_slice());
        content
    }

    fn encode_choice(
        &mut self,
        choice: &ChoiceValue,
        alternatives: &Structure,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        match choice {
            ChoiceValue::Alternative(name, value) => {
                let field = alternatives.field(name).ok_or_else(|| {
                    CodecError::value_mismatch(&format!("Unknown alternative {name}."))
                })?;
                self.encode_node(value, &field.node, writer)
            }
            ChoiceValue::Unresolved { payload, .. } => writer.write_buffer(payload),
            ChoiceValue::UnknownExtension { .. } => Err(CodecError::value_mismatch(
                "Packed extension payloads cannot be written as TLV.",
            )),
        }
    }

    /// Writes the members of a SEQUENCE or SET, followed by any
    /// unknown elements kept from decoding.
    pub(crate) fn encode_members(
        &mut self,
        record: &Record,
        members: &Structure,
        sort: bool,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        if let Some(unknown) = record.names().find(|name| members.field(name).is_none()) {
            return Err(CodecError::value_mismatch(&format!(
                "Record member {unknown} is not part of the schema."
            )));
        }
        let mut elements: Vec<Vec<u8>> = Vec::new();
        for (index, field) in members.all().enumerate() {
            let present = match (record.get(&field.name), field.node.default_value()) {
                (Some(value), Some(default))
                    if value == default && !self.rules.encode_defaults =>
                {
                    None
                }
                (Some(value), _) => Some(value),
                (None, Some(default)) if self.rules.encode_defaults => Some(default),
                (None, _) if field.node.is_optional() || index >= members.fields.len() => None,
                (None, _) => {
                    return Err(CodecError::value_mismatch(&format!(
                        "Mandatory member {} is missing.",
                        field.name
                    )))
                }
            };
            let Some(value) = present else { continue };
            if sort {
                elements.push(self.nested(|der, w| der.encode_node(value, &field.node, w))?);
            } else {
                self.encode_node(value, &field.node, writer)?;
            }
        }
        elements.sort_by_key(|element| identifier(element).ok().map(|(_, (tag, _))| tag));
        for element in &elements {
            writer.write_buffer(element)?;
        }
        for extension in &record.unknown_extensions {
            writer.write_buffer(&extension.payload)?;
        }
        Ok(())
    }
}

/// Content octets of a character string, one octet per character
/// except for UTF8String and BMPString.
pub(crate) fn string_content(
    string_type: CharacterStringType,
    text: &str,
) -> Result<Vec<u8>, CodecError> {
    let unencodable = |c: char| {
        CodecError::unsupported(&format!(
            "Character {c:?} cannot be encoded as {string_type:?}."
        ))
    };
    match string_type {
        CharacterStringType::UTF8String => Ok(text.as_bytes().to_vec()),
        CharacterStringType::BMPString => text
            .chars()
            .map(|c| {
                u16::try_from(u32::from(c))
                    .map(u16::to_be_bytes)
                    .map_err(|_| unencodable(c))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|units| units.concat()),
        unsupported if !unsupported.is_supported() => Err(CodecError::unsupported(&format!(
            "{unsupported:?} is not supported."
        ))),
        _ => text
            .chars()
            .map(|c| u8::try_from(c).map_err(|_| unencodable(c)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use asnkit_schema::{Node, Value};
    use bitvec::{bitvec, prelude::Msb0};

    use crate::{der::Der, Encoder};

    fn der(value: Value, node: &Node) -> Vec<u8> {
        Der::new().encode(&value, node).unwrap()
    }

    #[test]
    fn encodes_primitives() {
        assert_eq!(der(Value::Null, &Node::null()), vec![0x05, 0x00]);
        assert_eq!(der(true.into(), &Node::boolean()), vec![0x01, 0x01, 0xFF]);
        assert_eq!(der((-129).into(), &Node::integer()), vec![0x02, 0x02, 0xFF, 0x7F]);
        assert_eq!(
            der(Value::Enumerated(1), &Node::enumerated(&[("a", 0), ("b", 1)])),
            vec![0x0A, 0x01, 0x01]
        );
        assert_eq!(
            der(Value::oid("2.5.4.3"), &Node::object_identifier()),
            vec![0x06, 0x03, 0x55, 0x04, 0x03]
        );
        assert_eq!(der(0.0.into(), &Node::real()), vec![0x09, 0x00]);
        assert_eq!(
            der(vec![1u8, 2].into(), &Node::octet_string()),
            vec![0x04, 0x02, 1, 2]
        );
    }

    #[test]
    fn encodes_strings() {
        assert_eq!(
            der("AU".into(), &Node::printable_string()),
            vec![0x13, 0x02, b'A', b'U']
        );
        assert_eq!(
            der("é".into(), &Node::utf8_string()),
            vec![0x0C, 0x02, 0xC3, 0xA9]
        );
        assert_eq!(
            der("Aé".into(), &Node::bmp_string()),
            vec![0x1E, 0x04, 0x00, 0x41, 0x00, 0xE9]
        );
        assert!(Der::new()
            .encode(&"€".into(), &Node::ia5_string())
            .is_err());
        assert!(Der::new()
            .encode(&"a".into(), &Node::teletex_string())
            .is_err());
    }

    #[test]
    fn encodes_bit_strings() {
        let bits = bitvec![u8, Msb0; 1, 0, 1, 1, 0, 0, 0, 0, 1, 0];
        assert_eq!(
            der(bits.clone().into(), &Node::bit_string()),
            vec![0x03, 0x03, 0x06, 0xB0, 0x80]
        );
        let named = Node::named_bit_string(&[("a", 0), ("b", 2)]);
        assert_eq!(
            der(bitvec![u8, Msb0; 1, 0, 1, 0, 0, 0].into(), &named),
            vec![0x03, 0x02, 0x05, 0xA0]
        );
        assert_eq!(
            der(bitvec![u8, Msb0; 0, 0].into(), &named),
            vec![0x03, 0x01, 0x00]
        );
    }

    #[test]
    fn wraps_explicit_tags() {
        let node = Node::integer().explicit(0);
        assert_eq!(der(2.into(), &node), vec![0xA0, 0x03, 0x02, 0x01, 0x02]);
        let implicit = Node::integer().implicit(1);
        assert_eq!(der(2.into(), &implicit), vec![0x81, 0x01, 0x02]);
        let choice = Node::choice([("a", Node::null()), ("b", Node::boolean())]).implicit(2);
        assert_eq!(
            der(Value::choice("b", false.into()), &choice),
            vec![0xA2, 0x03, 0x01, 0x01, 0x00]
        );
    }

    #[test]
    fn suppresses_defaults_and_sorts_sets() {
        let sequence = Node::sequence([
            ("version", Node::integer().with_default(0.into()).explicit(0)),
            ("serial", Node::integer()),
        ]);
        let value = Value::record([("version", 0.into()), ("serial", 5.into())]);
        assert_eq!(der(value, &sequence), vec![0x30, 0x03, 0x02, 0x01, 0x05]);

        let set = Node::set([
            ("flag", Node::boolean().implicit(3)),
            ("count", Node::integer().implicit(1)),
            ("name", Node::ia5_string()),
        ]);
        let value = Value::record([
            ("name", "x".into()),
            ("flag", true.into()),
            ("count", 1.into()),
        ]);
        assert_eq!(
            der(value, &set),
            vec![0x31, 0x09, 0x16, 0x01, b'x', 0x81, 0x01, 0x01, 0x83, 0x01, 0xFF]
        );
    }

    #[test]
    fn sorts_set_of_elements() {
        let node = Node::set_of(Node::integer());
        let value = Value::List(vec![300.into(), 2.into(), (-1).into()]);
        assert_eq!(
            der(value, &node),
            vec![0x31, 0x0A, 0x02, 0x01, 0x02, 0x02, 0x01, 0xFF, 0x02, 0x02, 0x01, 0x2C]
        );
    }

    #[test]
    fn rejects_mismatched_values() {
        let node = Node::sequence([("a", Node::integer())]);
        let mut der = Der::new();
        assert!(der.encode(&Value::record([("b", 1.into())]), &node).is_err());
        assert!(der.encode(&Value::record::<_, &str>([]), &node).is_err());
        assert!(der.encode(&Value::Boolean(true), &Node::integer()).is_err());
    }
}
