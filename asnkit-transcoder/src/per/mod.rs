//! Packed Encoding Rules, aligned variant by default.
//!
//! PER writes no tags. The schema alone determines how many bits every
//! value occupies, so encoder and decoder share the bit-width and
//! alignment decisions in this module.
use alloc::vec::Vec;
use asnkit_schema::{constraints::Constraint, Field, Kind, Node, Structure, Tag, Value};

use crate::{
    error::CodecError,
    io::{Reader, ScratchWriters, Writer},
    Decoder, Encoder,
};

mod decoder;
mod encoder;

/// Largest upper bound for which a length is a constrained whole number.
const LENGTH_BOUND_LIMIT: usize = 65536;
/// Largest length the self-describing determinant holds without
/// fragmentation.
const MAX_UNFRAGMENTED_LENGTH: usize = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerOptions {
    /// Pad to octet boundaries where the aligned variant requires it.
    pub aligned: bool,
}

impl Default for PerOptions {
    fn default() -> Self {
        PerOptions { aligned: true }
    }
}

/// PER codec. Instances own the scratch writers used for open types
/// and are not reentrant.
pub struct Per {
    options: PerOptions,
    scratch: Vec<Writer<'static>>,
}

impl Default for Per {
    fn default() -> Self {
        Per::new()
    }
}

impl Per {
    pub fn new() -> Self {
        Per::with_options(PerOptions::default())
    }

    pub fn with_options(options: PerOptions) -> Self {
        Per {
            options,
            scratch: Vec::new(),
        }
    }

    pub fn unaligned() -> Self {
        Per::with_options(PerOptions { aligned: false })
    }

    fn aligned(&self) -> bool {
        self.options.aligned
    }
}

impl ScratchWriters for Per {
    fn scratch(&mut self) -> &mut Vec<Writer<'static>> {
        &mut self.scratch
    }
}

/// Number of bits needed for the offsets `0..=range`.
fn range_bits(range: u128) -> usize {
    (u128::BITS - range.leading_zeros()) as usize
}

/// Smallest tag that can start an encoding of `node`. Untagged CHOICE
/// nodes take the smallest tag of their alternatives.
fn canonical_tag(node: &Node) -> Option<Tag> {
    match (node.outer_tag(), node.kind()) {
        (Some(tag), _) => Some(tag),
        (None, Kind::Choice(alternatives)) => alternatives
            .all()
            .filter_map(|f| canonical_tag(&f.node))
            .min(),
        _ => None,
    }
}

/// Root members in encoding order. SET members are encoded in
/// canonical tag order, SEQUENCE members as declared.
fn root_fields(members: &Structure, sorted: bool) -> Vec<&Field> {
    let mut fields: Vec<&Field> = members.fields.iter().collect();
    if sorted {
        fields.sort_by_key(|f| {
            let tag = canonical_tag(&f.node);
            (tag.is_none(), tag)
        });
    }
    fields
}

/// Size of a string or list in the root of a single-value size constraint.
fn fixed_size(size: &Constraint, in_root: bool) -> Option<usize> {
    match size.size_bounds() {
        Some((lower, upper)) if in_root && lower == upper => Some(upper),
        _ => None,
    }
}

/// Whether a known-multiplier character string of `bits_per_char`
/// starts at an octet boundary in the aligned variant.
fn string_is_aligned(size: &Constraint, in_root: bool, bits_per_char: usize) -> bool {
    match (in_root, size.size_bounds()) {
        (true, Some((lower, upper))) if lower == upper => upper.saturating_mul(bits_per_char) > 16,
        (true, Some((_, upper))) => upper.saturating_mul(bits_per_char) >= 16,
        _ => true,
    }
}

impl Encoder for Per {
    fn encode_to(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError> {
        self.encode_complete(value, node, writer)?;
        writer.flush()
    }
}

impl Decoder for Per {
    fn decode_from(&mut self, reader: &mut Reader<'_>, node: &Node) -> Result<Value, CodecError> {
        let start = reader.position();
        let value = self.decode_node(reader, node)?;
        if reader.position() == start && reader.is_byte_aligned() {
            // an empty encoding occupies a single zero octet
            if !reader.is_exhausted()? {
                reader.skip(8)?;
            }
        } else {
            reader.skip_to_byte_boundary();
        }
        Ok(value)
    }
}
