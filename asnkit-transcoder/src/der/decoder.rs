use alloc::{format, string::String, vec::Vec};
use asnkit_schema::{
    tag::universal, CharacterStringType, ChoiceValue, Collection, Field, Kind, Node, Record,
    Structure, Tag, UnknownExtension, Value,
};
use bitvec::{prelude::Msb0, vec::BitVec};
use log::{debug, trace};

use crate::{
    error::CodecError,
    io::Reader,
    primitives::{decode_object_identifier, decode_real, integer_from_signed_bytes},
};

use super::{
    encoder::untagged,
    header::{header, identifier, Header, Length},
    Der,
};

/// Where the content of a constructed element ends.
#[derive(Debug, Clone, Copy)]
pub(crate) enum End {
    At(usize),
    Marker,
}

fn expect_tag(header: &Header, expected: Tag) -> Result<(), CodecError> {
    if header.tag == expected {
        Ok(())
    } else {
        Err(CodecError::tag_mismatch(&format!(
            "Expected tag {expected:?}, found {:?}.",
            header.tag
        )))
    }
}

/// An untagged extensible CHOICE, which may hold alternatives that
/// the schema does not list.
fn is_open_choice(node: &Node) -> bool {
    matches!(node.kind(), Kind::Choice(_)) && node.outer_tag().is_none() && node.is_extendable()
}

impl Der {
    pub(crate) fn decode_node(
        &mut self,
        reader: &mut Reader<'_>,
        node: &Node,
    ) -> Result<Value, CodecError> {
        self.decode_wrapped(reader, node, node.explicit_tags())
    }

    fn decode_wrapped(
        &mut self,
        reader: &mut Reader<'_>,
        node: &Node,
        explicit: &[Tag],
    ) -> Result<Value, CodecError> {
        let Some((outer, inner)) = explicit.split_first() else {
            return self.decode_tlv(reader, node);
        };
        let header = reader.read_with(header)?;
        expect_tag(&header, *outer)?;
        let end = self.constructed_end(reader, &header)?;
        let value = self.decode_wrapped(reader, node, inner)?;
        if !self.reached_end(reader, end)? {
            return Err(CodecError::unsupported(
                "Explicitly tagged element holds more than one value.",
            ));
        }
        Ok(value)
    }

    fn decode_tlv(&mut self, reader: &mut Reader<'_>, node: &Node) -> Result<Value, CodecError> {
        match node.kind() {
            Kind::Choice(alternatives) => self.decode_choice(reader, node, alternatives),
            Kind::Any => self.read_raw(reader).map(Value::Any),
            kind => {
                let expected = node.tag().ok_or_else(|| untagged(node))?;
                let header = reader.read_with(header)?;
                expect_tag(&header, expected)?;
                self.decode_content(reader, node, kind, &header)
            }
        }
    }

    /// Decodes the content of an element whose header has been read.
    pub(crate) fn decode_content(
        &mut self,
        reader: &mut Reader<'_>,
        node: &Node,
        kind: &Kind,
        header: &Header,
    ) -> Result<Value, CodecError> {
        match kind {
            Kind::Sequence(members) | Kind::External(members) => {
                let end = self.constructed_end(reader, header)?;
                self.decode_sequence(reader, members, node.is_extendable(), end)
                    .map(Value::Record)
            }
            Kind::Set(members) => {
                let end = self.constructed_end(reader, header)?;
                self.decode_set(reader, members, node.is_extendable(), end)
                    .map(Value::Record)
            }
            Kind::SequenceOf(Collection { element, .. })
            | Kind::SetOf(Collection { element, .. }) => {
                let end = self.constructed_end(reader, header)?;
                let mut items = Vec::new();
                while !self.reached_end(reader, end)? {
                    items.push(self.decode_node(reader, element)?);
                }
                Ok(Value::List(items))
            }
            Kind::BitString(_) => {
                let fragments =
                    self.string_fragments(reader, header, Tag::universal(universal::BIT_STRING))?;
                bit_string_value(fragments)
            }
            Kind::OctetString(_) => self
                .string_fragments(reader, header, Tag::universal(universal::OCTET_STRING))
                .map(|fragments| Value::OctetString(fragments.concat())),
            Kind::CharacterString(string) => {
                if !string.r#type.is_supported() {
                    return Err(CodecError::unsupported(&format!(
                        "{:?} is not supported.",
                        string.r#type
                    )));
                }
                let tag = Tag::universal(string.r#type.universal_tag());
                let fragments = self.string_fragments(reader, header, tag)?;
                string_value(string.r#type, fragments.concat())
            }
            primitive => {
                let bytes = match (header.constructed, header.length) {
                    (false, Length::Definite(length)) => reader.read_buffer(length)?,
                    _ => {
                        return Err(CodecError::unsupported(&format!(
                            "Element with tag {:?} must be primitive with a definite length.",
                            header.tag
                        )))
                    }
                };
                primitive_value(primitive, bytes)
            }
        }
    }

    fn constructed_end(&self, reader: &Reader<'_>, header: &Header) -> Result<End, CodecError> {
        if !header.constructed {
            return Err(CodecError::unsupported(&format!(
                "Element with tag {:?} must use the constructed form.",
                header.tag
            )));
        }
        self.end_of(reader, header)
    }

    pub(crate) fn end_of(&self, reader: &Reader<'_>, header: &Header) -> Result<End, CodecError> {
        match header.length {
            Length::Definite(length) => reader
                .position()
                .checked_add(length)
                .map(End::At)
                .ok_or_else(|| CodecError::unsupported("Element length overflows.")),
            Length::Indefinite if self.rules.indefinite_length => {
                trace!("indefinite length element with tag {:?}", header.tag);
                Ok(End::Marker)
            }
            Length::Indefinite => Err(CodecError::unsupported(
                "Indefinite length is not allowed under DER.",
            )),
        }
    }

    /// Whether the content ending at `end` is complete. Consumes the
    /// end-of-contents marker of an indefinite length element.
    pub(crate) fn reached_end(
        &self,
        reader: &mut Reader<'_>,
        end: End,
    ) -> Result<bool, CodecError> {
        match end {
            End::At(position) => match reader.position().cmp(&position) {
                core::cmp::Ordering::Less => Ok(false),
                core::cmp::Ordering::Equal => Ok(true),
                core::cmp::Ordering::Greater => Err(CodecError::unsupported(
                    "Element content overruns its enclosing length.",
                )),
            },
            End::Marker => {
                if reader.peek_bits(16)? == 0 {
                    reader.skip(16)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Content octets of a string element. A constructed element is
    /// flattened into its primitive fragments, recursively.
    fn string_fragments(
        &self,
        reader: &mut Reader<'_>,
        header: &Header,
        fragment_tag: Tag,
    ) -> Result<Vec<Vec<u8>>, CodecError> {
        let mut fragments = Vec::new();
        self.collect_fragments(reader, header, fragment_tag, &mut fragments)?;
        Ok(fragments)
    }

    fn collect_fragments(
        &self,
        reader: &mut Reader<'_>,
        outer: &Header,
        fragment_tag: Tag,
        fragments: &mut Vec<Vec<u8>>,
    ) -> Result<(), CodecError> {
        match (outer.constructed, outer.length) {
            (false, Length::Definite(length)) => {
                fragments.push(reader.read_buffer(length)?);
                return Ok(());
            }
            (false, Length::Indefinite) => {
                return Err(CodecError::unsupported(
                    "Primitive strings require a definite length.",
                ))
            }
            (true, _) if !self.rules.indefinite_length => {
                return Err(CodecError::unsupported(
                    "Constructed strings are not allowed under DER.",
                ))
            }
            (true, _) => {}
        }
        let end = self.end_of(reader, outer)?;
        while !self.reached_end(reader, end)? {
            let fragment = reader.read_with(header)?;
            expect_tag(&fragment, fragment_tag)?;
            self.collect_fragments(reader, &fragment, fragment_tag, fragments)?;
        }
        Ok(())
    }

    fn decode_choice(
        &mut self,
        reader: &mut Reader<'_>,
        node: &Node,
        alternatives: &Structure,
    ) -> Result<Value, CodecError> {
        let ((tag, _), _) = reader.peek_with(identifier)?;
        if let Some(field) = alternatives.all().find(|f| f.node.accepts(tag)) {
            let value = self.decode_node(reader, &field.node)?;
            return Ok(Value::choice(&field.name, value));
        }
        if node.is_extendable() {
            trace!("no alternative for tag {tag:?}, keeping the raw element");
            let payload = self.read_raw(reader)?;
            return Ok(Value::Choice(ChoiceValue::Unresolved { tag, payload }));
        }
        Err(CodecError::tag_mismatch(&format!(
            "No alternative accepts tag {tag:?}."
        )))
    }

    /// Reads one complete TLV without interpreting it.
    pub(crate) fn read_raw(&self, reader: &mut Reader<'_>) -> Result<Vec<u8>, CodecError> {
        let (element, header_length) = reader.peek_with(header)?;
        match element.length {
            Length::Definite(length) => {
                let total = header_length
                    .checked_add(length)
                    .ok_or_else(|| CodecError::unsupported("Element length overflows."))?;
                reader.read_buffer(total)
            }
            Length::Indefinite => {
                self.end_of(reader, &element)?;
                let mut raw = reader.read_buffer(header_length)?;
                loop {
                    if reader.peek_bits(16)? == 0 {
                        raw.extend(reader.read_buffer(2)?);
                        return Ok(raw);
                    }
                    raw.extend(self.read_raw(reader)?);
                }
            }
        }
    }

    fn decode_sequence(
        &mut self,
        reader: &mut Reader<'_>,
        members: &Structure,
        extendable: bool,
        end: End,
    ) -> Result<Record, CodecError> {
        let fields: Vec<&Field> = members.all().collect();
        let root = members.fields.len();
        let mut record = Record::new();
        let mut cursor = 0;
        while !self.reached_end(reader, end)? {
            let ((tag, _), _) = reader.peek_with(identifier)?;
            let mut matching = None;
            let mut blocking = None;
            for (index, field) in fields.iter().enumerate().skip(cursor) {
                if field.node.accepts(tag) {
                    matching = Some(index);
                    break;
                }
                if index < root && !field.node.is_optional() {
                    blocking = Some(index);
                    break;
                }
            }
            let target = match (matching, blocking) {
                (Some(index), _) => Some(index),
                (None, Some(index)) if is_open_choice(&fields[index].node) => {
                    trace!(
                        "assuming member {} holds the element with tag {tag:?}",
                        fields[index].name
                    );
                    Some(index)
                }
                _ => None,
            };
            match target {
                Some(index) => {
                    let field = fields[index];
                    let value = self.decode_node(reader, &field.node)?;
                    record.insert(&field.name, value);
                    cursor = index + 1;
                }
                None if extendable => self.keep_unknown(reader, &mut record, tag)?,
                None => {
                    return Err(CodecError::tag_mismatch(&format!(
                        "No member accepts tag {tag:?}."
                    )))
                }
            }
        }
        complete(&mut record, members)?;
        Ok(record)
    }

    fn decode_set(
        &mut self,
        reader: &mut Reader<'_>,
        members: &Structure,
        extendable: bool,
        end: End,
    ) -> Result<Record, CodecError> {
        let mut record = Record::new();
        while !self.reached_end(reader, end)? {
            let ((tag, _), _) = reader.peek_with(identifier)?;
            let field = members
                .all()
                .find(|f| !record.contains(&f.name) && f.node.accepts(tag));
            match field {
                Some(field) => {
                    let value = self.decode_node(reader, &field.node)?;
                    record.insert(&field.name, value);
                }
                None if extendable => self.keep_unknown(reader, &mut record, tag)?,
                None => {
                    return Err(CodecError::tag_mismatch(&format!(
                        "No member accepts tag {tag:?}."
                    )))
                }
            }
        }
        complete(&mut record, members)?;
        Ok(record)
    }

    fn keep_unknown(
        &self,
        reader: &mut Reader<'_>,
        record: &mut Record,
        tag: Tag,
    ) -> Result<(), CodecError> {
        let payload = self.read_raw(reader)?;
        let index = record.unknown_extensions.len();
        debug!("kept unknown element with tag {tag:?} as extension {index}");
        record
            .unknown_extensions
            .push(UnknownExtension { index, payload });
        Ok(())
    }
}

/// Fills in defaults of absent members and checks that every mandatory
/// root member was present.
fn complete(record: &mut Record, members: &Structure) -> Result<(), CodecError> {
    for (index, field) in members.all().enumerate() {
        if record.contains(&field.name) {
            continue;
        }
        match field.node.default_value() {
            Some(default) => {
                record.insert(&field.name, default.clone());
            }
            None if field.node.is_optional() || index >= members.fields.len() => {}
            None => {
                return Err(CodecError::tag_mismatch(&format!(
                    "Mandatory member {} is missing.",
                    field.name
                )))
            }
        }
    }
    Ok(())
}

fn bit_string_value(fragments: Vec<Vec<u8>>) -> Result<Value, CodecError> {
    let mut bits = BitVec::<u8, Msb0>::new();
    for fragment in fragments {
        let Some((&unused, data)) = fragment.split_first() else {
            return Err(CodecError::unsupported(
                "BIT STRING content lacks the unused bits octet.",
            ));
        };
        if unused > 7 || (data.is_empty() && unused != 0) {
            return Err(CodecError::unsupported(&format!(
                "Invalid unused bit count {unused}."
            )));
        }
        let mut part = BitVec::<u8, Msb0>::from_slice(data);
        part.truncate(part.len() - usize::from(unused));
        bits.extend_from_bitslice(&part);
    }
    Ok(Value::BitString(bits))
}

pub(crate) fn string_value(
    string_type: CharacterStringType,
    bytes: Vec<u8>,
) -> Result<Value, CodecError> {
    match string_type {
        CharacterStringType::UTF8String => String::from_utf8(bytes)
            .map(Value::String)
            .map_err(|_| CodecError::unsupported("UTF8String content is not valid UTF-8.")),
        CharacterStringType::BMPString => {
            if bytes.len() % 2 != 0 {
                return Err(CodecError::unsupported(
                    "BMPString content has an odd number of octets.",
                ));
            }
            bytes
                .chunks_exact(2)
                .map(|unit| {
                    char::from_u32(u32::from(u16::from_be_bytes([unit[0], unit[1]])))
                        .ok_or_else(|| CodecError::unsupported("BMPString holds a surrogate."))
                })
                .collect::<Result<String, _>>()
                .map(Value::String)
        }
        _ => Ok(Value::String(bytes.iter().map(|b| char::from(*b)).collect())),
    }
}

fn primitive_value(kind: &Kind, bytes: Vec<u8>) -> Result<Value, CodecError> {
    match kind {
        Kind::Null if bytes.is_empty() => Ok(Value::Null),
        Kind::Boolean if bytes.len() == 1 => Ok(Value::Boolean(bytes[0] != 0)),
        Kind::Integer(_) => integer_from_signed_bytes(&bytes),
        Kind::Enumerated(_) => integer_from_signed_bytes(&bytes)?
            .as_i64()
            .map(Value::Enumerated)
            .ok_or_else(|| CodecError::unsupported("ENUMERATED value exceeds 64 bits.")),
        Kind::Real => decode_real(&bytes).map(Value::Real),
        Kind::ObjectIdentifier => decode_object_identifier(&bytes).map(Value::ObjectIdentifier),
        Kind::EmbeddedPdv => Ok(Value::OctetString(bytes)),
        other => Err(CodecError::unsupported(&format!(
            "Malformed content for {other:?}."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use asnkit_schema::{ChoiceValue, Node, Record, Tag, UnknownExtension, Value};
    use bitvec::{bitvec, prelude::Msb0};

    use crate::{der::Der, error::CodecErrorType, Decoder, Encoder, Reader};

    fn decode(bytes: &[u8], node: &Node) -> Value {
        Der::new().decode(bytes, node).unwrap()
    }

    fn error(bytes: &[u8], node: &Node) -> CodecErrorType {
        Der::new().decode(bytes, node).unwrap_err().kind
    }

    #[test]
    fn decodes_primitives() {
        assert_eq!(decode(&[0x05, 0x00], &Node::null()), Value::Null);
        assert_eq!(decode(&[0x01, 0x01, 0xFF], &Node::boolean()), true.into());
        assert_eq!(
            decode(&[0x02, 0x02, 0xFF, 0x7F], &Node::integer()),
            Value::Integer(-129)
        );
        assert_eq!(
            decode(&[0x0A, 0x01, 0x02], &Node::enumerated(&[("c", 2)])),
            Value::Enumerated(2)
        );
        assert_eq!(
            decode(&[0x03, 0x03, 0x06, 0xB0, 0x80], &Node::bit_string()),
            Value::BitString(bitvec![u8, Msb0; 1, 0, 1, 1, 0, 0, 0, 0, 1, 0])
        );
        assert_eq!(
            decode(&[0x1E, 0x02, 0x00, 0x41], &Node::bmp_string()),
            "A".into()
        );
        match decode(&[0x09, 0x01, 0x43], &Node::real()) {
            Value::Real(zero) => assert!(zero == 0.0 && zero.is_sign_negative()),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn rejects_der_violations() {
        assert_eq!(
            error(&[0x30, 0x80, 0x00, 0x00], &Node::sequence_of(Node::null())),
            CodecErrorType::UnsupportedEncoding
        );
        assert_eq!(
            error(&[0x24, 0x03, 0x04, 0x01, 0x00], &Node::octet_string()),
            CodecErrorType::UnsupportedEncoding
        );
        assert_eq!(error(&[0x02, 0x01, 0x00], &Node::boolean()), CodecErrorType::TagMismatch);
        assert_eq!(error(&[0x02, 0x02, 0x00], &Node::integer()), CodecErrorType::TruncatedInput);
        assert_eq!(error(&[0x02, 0x00], &Node::integer()), CodecErrorType::UnsupportedEncoding);
    }

    #[test]
    fn infers_absent_members() {
        let node = Node::sequence([
            ("version", Node::integer().with_default(0.into()).explicit(0)),
            ("serial", Node::integer()),
            ("issuer", Node::utf8_string().implicit(1).optional()),
            ("flags", Node::bit_string().implicit(2).optional()),
        ]);
        let value = decode(&[0x30, 0x06, 0x02, 0x01, 0x05, 0x82, 0x01, 0x00], &node);
        assert_eq!(
            value,
            Value::record([
                ("version", 0.into()),
                ("serial", 5.into()),
                ("flags", Value::BitString(bitvec![u8, Msb0;])),
            ])
        );
        assert_eq!(
            error(&[0x30, 0x03, 0x81, 0x01, 0x41], &node),
            CodecErrorType::TagMismatch
        );
    }

    #[test]
    fn decodes_sets_in_any_order() {
        let node = Node::set([
            ("count", Node::integer().implicit(1)),
            ("name", Node::ia5_string()),
        ]);
        let value = decode(&[0x31, 0x06, 0x81, 0x01, 0x01, 0x16, 0x01, b'x'], &node);
        assert_eq!(
            value,
            Value::record([("count", 1.into()), ("name", "x".into())])
        );
        assert_eq!(
            decode(&[0x31, 0x06, 0x16, 0x01, b'x', 0x81, 0x01, 0x01], &node),
            value
        );
    }

    #[test]
    fn keeps_unresolved_alternatives() {
        let node = Node::choice_ext([("a", Node::integer())], [("b", Node::boolean())]);
        assert_eq!(
            decode(&[0x01, 0x01, 0x00], &node),
            Value::choice("b", false.into())
        );
        let unknown = decode(&[0x85, 0x01, 0x07], &node);
        assert_eq!(
            unknown,
            Value::Choice(ChoiceValue::Unresolved {
                tag: Tag::context(5),
                payload: vec![0x85, 0x01, 0x07],
            })
        );
        assert_eq!(Der::new().encode(&unknown, &node).unwrap(), vec![0x85, 0x01, 0x07]);
        let closed = Node::choice([("a", Node::integer())]);
        assert_eq!(error(&[0x85, 0x01, 0x07], &closed), CodecErrorType::TagMismatch);
    }

    #[test]
    fn falls_back_to_open_choice_members() {
        let node = Node::sequence([
            ("id", Node::integer()),
            (
                "body",
                Node::choice_ext([("text", Node::utf8_string())], [("flag", Node::boolean())]),
            ),
        ]);
        let value = decode(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x89, 0x01, 0x00], &node);
        let body = value.as_record().unwrap().get("body").unwrap();
        assert!(matches!(
            body,
            Value::Choice(ChoiceValue::Unresolved { tag, .. }) if *tag == Tag::context(9)
        ));
    }

    #[test]
    fn keeps_unknown_sequence_elements() {
        let node = Node::sequence_ext([("id", Node::integer())], [("note", Node::ia5_string())]);
        let bytes = [0x30, 0x06, 0x02, 0x01, 0x01, 0x8A, 0x01, 0x2A];
        let value = decode(&bytes, &node);
        let mut expected = Record::new().with("id", 1.into());
        expected.unknown_extensions.push(UnknownExtension {
            index: 0,
            payload: vec![0x8A, 0x01, 0x2A],
        });
        assert_eq!(value, Value::Record(expected));
        assert_eq!(Der::new().encode(&value, &node).unwrap(), bytes.to_vec());
        let closed = Node::sequence([("id", Node::integer())]);
        assert_eq!(error(&bytes, &closed), CodecErrorType::TagMismatch);
    }

    #[test]
    fn decodes_from_refilled_reader() {
        let node = Node::sequence_of(Node::octet_string());
        let bytes = [0x30, 0x08, 0x04, 0x02, 1, 2, 0x04, 0x02, 3, 4];
        let mut offset = 0;
        let mut reader = Reader::with_refill(3, |chunk: &mut [u8]| {
            let n = chunk.len().min(bytes.len() - offset);
            chunk[..n].copy_from_slice(&bytes[offset..offset + n]);
            offset += n;
            Ok(n)
        });
        assert_eq!(
            Der::new().decode_from(&mut reader, &node).unwrap(),
            Value::List(vec![vec![1u8, 2].into(), vec![3u8, 4].into()])
        );
    }
}
