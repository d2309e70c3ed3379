use alloc::string::String;
use thiserror::Error;

/// Raised by schema constructors and operators when a node
/// would violate the schema model's invariants.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?} building ASN1 schema: {details}")]
pub struct SchemaError {
    pub details: String,
    pub kind: SchemaErrorType,
}

impl SchemaError {
    pub fn new(details: &str, kind: SchemaErrorType) -> Self {
        SchemaError {
            details: details.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorType {
    InvalidConstraint,
    InvalidCharacterSet,
    DuplicateTag,
    DuplicateEnumerationValue,
}
