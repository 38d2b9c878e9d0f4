/// Errors that can occur while encoding or decoding a schema.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes remain than the field declares.
    #[error("malformed data in field '{field}': needed {needed} bytes, {remaining} remaining")]
    MalformedData {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// A signed length field decoded to a negative value.
    #[error("length field '{0}' is negative")]
    NegativeLength(&'static str),

    /// The record has no value for a field the schema requires.
    #[error("missing value for field '{0}'")]
    MissingField(&'static str),

    /// The record value does not match the field's wire type.
    #[error("field '{field}' expects {expected}, found {found}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A derived length does not fit its length field.
    #[error("field '{field}' length {len} exceeds maximum {max}")]
    LengthOverflow {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A fixed-length field was given a value of another size.
    #[error("field '{field}' must be exactly {expected} long, got {actual}")]
    FixedLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A string cannot be represented in the device character set.
    #[error("field '{field}' holds a string that cannot be encoded: {reason}")]
    InvalidString {
        field: &'static str,
        reason: &'static str,
    },

    /// The schema itself is inconsistent.
    #[error("invalid schema '{schema}': {reason}")]
    InvalidSchema {
        schema: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;
