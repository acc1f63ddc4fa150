//! # Error Types
//!
//! Decode failures shared by the wire codec and the catalog's XML form.

use thiserror::Error;

/// Errors raised while decoding a block record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Payload ended before the record was complete.
    #[error("Truncated payload")]
    Truncated,

    #[error("Negative field length: {0}")]
    NegativeLength(i32),

    #[error("Field length {length} exceeds limit {limit}")]
    FieldTooLong { length: usize, limit: usize },

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("Negative version: {0}")]
    NegativeVersion(i64),

    #[error("Unknown record tag: {0}")]
    UnknownTag(u8),

    #[error("Missing attribute `{0}`")]
    MissingAttribute(&'static str),

    #[error("Invalid value for `{attribute}`: {value}")]
    InvalidNumber { attribute: &'static str, value: String },

    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Io(err.to_string())
        }
    }
}
