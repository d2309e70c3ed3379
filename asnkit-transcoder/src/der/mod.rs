//! Distinguished Encoding Rules.
//!
//! `Der` is the TLV engine. The Basic Encoding Rules codec in
//! [`crate::ber`] drives the same engine with relaxed rules.
use alloc::vec::Vec;
use asnkit_schema::{Node, Value};

use crate::{
    error::CodecError,
    io::{Reader, ScratchWriters, Writer},
    Decoder, Encoder,
};

mod decoder;
mod encoder;
pub mod header;

/// Switches that separate DER from BER.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TlvRules {
    /// Sort SET members and SET OF elements, trim named bit strings.
    pub canonical: bool,
    /// Accept indefinite lengths and constructed strings when decoding.
    pub indefinite_length: bool,
    /// Write members equal to their default, and absent defaults.
    pub encode_defaults: bool,
}

impl TlvRules {
    pub(crate) const DISTINGUISHED: TlvRules = TlvRules {
        canonical: true,
        indefinite_length: false,
        encode_defaults: false,
    };
}

/// DER codec. Instances own scratch writers used to measure nested
/// content before its header is written, so they are not reentrant.
pub struct Der {
    pub(crate) rules: TlvRules,
    scratch: Vec<Writer<'static>>,
}

impl Default for Der {
    fn default() -> Self {
        Der::new()
    }
}

impl Der {
    pub fn new() -> Self {
        Der::with_rules(TlvRules::DISTINGUISHED)
    }

    pub(crate) fn with_rules(rules: TlvRules) -> Self {
        Der {
            rules,
            scratch: Vec::new(),
        }
    }
}

impl ScratchWriters for Der {
    fn scratch(&mut self) -> &mut Vec<Writer<'static>> {
        &mut self.scratch
    }
}

impl Encoder for Der {
    fn encode_to(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        self.encode_node(value, node, writer)?;
        writer.flush()
    }
}

impl Decoder for Der {
    fn decode_from(&mut self, reader: &mut Reader<'_>, node: &Node) -> Result<Value, CodecError> {
        self.decode_node(reader, node)
    }
}
