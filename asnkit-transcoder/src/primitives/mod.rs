//! Content octet codecs shared by all encoding rules.
mod integer;
mod oid;
mod real;

pub use integer::{
    integer_from_signed_bytes, integer_from_unsigned_bytes, signed_bytes, to_i128, unsigned_bytes,
};
pub use oid::{decode_object_identifier, encode_object_identifier};
pub use real::{decode_real, encode_real};
