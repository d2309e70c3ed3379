//! The `asnkit-schema` crate describes ASN1 types as trees of
//! immutable schema nodes that the `asnkit-transcoder` codecs walk
//! when encoding or decoding values.
//! It includes the tag model, constraint and permitted-alphabet
//! descriptors for PER packing, and the `Value` tree that codecs
//! produce and consume.
//!
//! Schema nodes are built with constructor functions and then refined
//! with builder-style operators that return new nodes:
//! ```
//! use asnkit_schema::{constraints::ConstraintKind, Node, TagClass, TagType};
//!
//! let version = Node::integer()
//!     .with_default(0.into())
//!     .tagged(0, TagType::Explicit, TagClass::ContextSpecific);
//! let counter = Node::integer()
//!     .constrained(ConstraintKind::Fixed, 0, 255)
//!     .unwrap();
//! assert!(version.is_optional());
//! assert!(!counter.is_optional());
//! ```
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod alphabet;
pub mod constraints;
pub mod error;
pub mod tag;
pub mod types;
pub mod validator;
pub mod value;

pub use error::{SchemaError, SchemaErrorType};
pub use tag::{Tag, TagClass, TagType};
pub use types::*;
pub use value::{ChoiceValue, Record, UnknownExtension, Value};
