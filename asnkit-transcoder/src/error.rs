use alloc::{format, string::String};
use asnkit_schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?} transcoding ASN1 value: {details}")]
pub struct CodecError {
    pub details: String,
    pub kind: CodecErrorType,
}

impl CodecError {
    pub fn new(details: &str, kind: CodecErrorType) -> Self {
        CodecError {
            details: details.into(),
            kind,
        }
    }

    pub(crate) fn tag_mismatch(details: &str) -> Self {
        Self::new(details, CodecErrorType::TagMismatch)
    }

    pub(crate) fn constraint_violation(details: &str) -> Self {
        Self::new(details, CodecErrorType::ConstraintViolation)
    }

    pub(crate) fn truncated(details: &str) -> Self {
        Self::new(details, CodecErrorType::TruncatedInput)
    }

    pub(crate) fn unsupported(details: &str) -> Self {
        Self::new(details, CodecErrorType::UnsupportedEncoding)
    }

    pub(crate) fn value_mismatch(details: &str) -> Self {
        Self::new(details, CodecErrorType::ValueMismatch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecErrorType {
    /// The schema node cannot be handled by the codec.
    Schema,
    /// No schema member accepts the tag found in the input.
    TagMismatch,
    /// A value lies outside a range the encoding rules enforce.
    ConstraintViolation,
    /// The input ended, or the refill callback had nothing more.
    TruncatedInput,
    UnsupportedEncoding,
    /// The value's shape does not fit the schema node.
    ValueMismatch,
}

impl From<SchemaError> for CodecError {
    fn from(value: SchemaError) -> Self {
        CodecError {
            details: format!("{}", value),
            kind: CodecErrorType::Schema,
        }
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for CodecError {
    fn from(value: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match value {
            nom::Err::Incomplete(_) => CodecError::truncated("Input ended inside an element."),
            nom::Err::Error(e) | nom::Err::Failure(e) => CodecError {
                details: format!("Malformed input: {:?}", e.code),
                kind: CodecErrorType::UnsupportedEncoding,
            },
        }
    }
}
