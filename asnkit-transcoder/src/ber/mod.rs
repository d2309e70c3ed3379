//! Basic Encoding Rules.
//!
//! BER shares the TLV engine of [`crate::der`]. Decoding additionally
//! accepts indefinite lengths and constructed strings. Encoding keeps
//! the declared member order of SET values and leaves SET OF elements
//! unsorted. Values can also be produced piecewise through
//! [`Ber::start_append`], [`Ber::append`] and [`Ber::end_append`].
use alloc::{format, vec::Vec};
use asnkit_schema::{Collection, Kind, Node, Tag, Value};
use log::trace;

use crate::{
    der::{
        header::{write_header, Length},
        Der, TlvRules,
    },
    error::{CodecError, CodecErrorType},
    io::{Reader, Writer},
    Decoder, Encoder,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BerOptions {
    /// Write members that equal their default, and fill in absent
    /// members that have one.
    pub encode_defaults: bool,
}

/// BER codec. Like [`Der`], an instance is not reentrant.
pub struct Ber {
    der: Der,
}

impl Default for Ber {
    fn default() -> Self {
        Ber::new()
    }
}

impl Ber {
    pub fn new() -> Self {
        Ber::with_options(BerOptions::default())
    }

    pub fn with_options(options: BerOptions) -> Self {
        Ber {
            der: Der::with_rules(TlvRules {
                canonical: false,
                indefinite_length: true,
                encode_defaults: options.encode_defaults,
            }),
        }
    }

    /// Opens an indefinite length encoding of `node` and writes `value`
    /// as its first fragment. Explicit tags of `node` are opened with
    /// indefinite length as well.
    pub fn start_append(&mut self, value: &Value, node: &Node) -> Result<Vec<u8>, CodecError> {
        let tag = match node.kind() {
            Kind::Choice(_) | Kind::Any => None,
            _ => node.tag(),
        }
        .ok_or_else(|| {
            CodecError::new(
                "Only nodes with a tag of their own can be appended to.",
                CodecErrorType::Schema,
            )
        })?;
        let mut writer = Writer::new();
        for outer in node.explicit_tags() {
            write_header(&mut writer, *outer, true, Length::Indefinite)?;
        }
        write_header(&mut writer, tag, true, Length::Indefinite)?;
        trace!("opened indefinite length encoding with tag {tag:?}");
        writer.write_buffer(&self.append(value, node)?)?;
        writer.finish()
    }

    /// Encodes one more fragment of an open encoding of `node`: a string
    /// segment, some members of a SEQUENCE or SET, or list elements.
    pub fn append(&mut self, value: &Value, node: &Node) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::new();
        match (node.kind(), value) {
            (Kind::BitString(_) | Kind::OctetString(_) | Kind::CharacterString(_), _) => {
                let fragment_tag = node
                    .kind()
                    .universal_tag()
                    .map(Tag::universal)
                    .ok_or_else(|| CodecError::new("Untagged string", CodecErrorType::Schema))?;
                let content = self.der.encode_content(value, node)?;
                write_header(
                    &mut writer,
                    fragment_tag,
                    false,
                    Length::Definite(content.len()),
                )?;
                writer.write_buffer(&content)?;
            }
            (
                Kind::Sequence(members) | Kind::Set(members) | Kind::External(members),
                Value::Record(record),
            ) => {
                for field in members.all() {
                    if let Some(member) = record.get(&field.name) {
                        self.der.encode_node(member, &field.node, &mut writer)?;
                    }
                }
            }
            (
                Kind::SequenceOf(Collection { element, .. })
                | Kind::SetOf(Collection { element, .. }),
                Value::List(items),
            ) => {
                for item in items {
                    self.der.encode_node(item, element, &mut writer)?;
                }
            }
            (_, other) => {
                return Err(CodecError::value_mismatch(&format!(
                    "Value {other:?} cannot be appended to the node tagged {:?}.",
                    node.outer_tag()
                )))
            }
        }
        writer.finish()
    }

    /// Closes an encoding opened by [`Ber::start_append`].
    pub fn end_append(&mut self, node: &Node) -> Result<Vec<u8>, CodecError> {
        let markers = 1 + node.explicit_tags().len();
        Ok([0u8, 0].repeat(markers))
    }
}

impl Encoder for Ber {
    fn encode_to(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        self.der.encode_to(value, node, writer)
    }
}

impl Decoder for Ber {
    fn decode_from(&mut self, reader: &mut Reader<'_>, node: &Node) -> Result<Value, CodecError> {
        self.der.decode_from(reader, node)
    }
}
