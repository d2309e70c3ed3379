//! The `asnkit-transcoder` library encodes and decodes `Value` trees
//! against the schema nodes of `asnkit-schema`.
//!
//! The transcoder aims to be suitable for `no_std` environments and `wasm-unknown` targets.
//! It provides the Distinguished, Basic and aligned Packed Encoding Rules,
//! each behind a cargo feature of the same name. A custom codec can be
//! plugged in by implementing the `Encoder` and `Decoder` traits.
//!
//! ```
//! use asnkit_schema::{Node, Value};
//! use asnkit_transcoder::{der::Der, Decoder, Encoder};
//!
//! let node = Node::sequence([("id", Node::integer()), ("ok", Node::boolean())]);
//! let value = Value::record([("id", 7.into()), ("ok", true.into())]);
//! let mut der = Der::new();
//! let bytes = der.encode(&value, &node).unwrap();
//! assert_eq!(bytes, vec![0x30, 0x06, 0x02, 0x01, 0x07, 0x01, 0x01, 0xFF]);
//! assert_eq!(der.decode(&bytes, &node).unwrap(), value);
//! ```
#![cfg_attr(not(test), no_std)]
extern crate alloc;

use alloc::vec::Vec;
use asnkit_schema::{Node, Value};

pub mod error;
pub mod io;
pub mod primitives;

#[cfg(feature = "ber")]
pub mod ber;
#[cfg(feature = "der")]
pub mod der;
#[cfg(feature = "per")]
pub mod per;

pub use error::{CodecError, CodecErrorType};
pub use io::{Reader, Writer};

/// Encoding half of a codec.
///
/// Codecs keep scratch buffers between calls and therefore take
/// `&mut self`; use one instance per thread.
pub trait Encoder {
    fn encode_to(
        &mut self,
        value: &Value,
        node: &Node,
        writer: &mut Writer<'_>,
    ) -> Result<(), CodecError>;

    fn encode(&mut self, value: &Value, node: &Node) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::new();
        self.encode_to(value, node, &mut writer)?;
        writer.finish()
    }
}

/// Decoding half of a codec.
pub trait Decoder {
    fn decode_from(&mut self, reader: &mut Reader<'_>, node: &Node) -> Result<Value, CodecError>;

    fn decode(&mut self, input: &[u8], node: &Node) -> Result<Value, CodecError> {
        self.decode_from(&mut Reader::new(input), node)
    }
}
