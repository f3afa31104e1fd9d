use thiserror::Error;

/// Domain-level failures raised by the entry model.
///
/// These are local, recoverable conditions: the caller decides how to handle
/// them and no partial mutation is left behind.
#[derive(Debug, Error)]
pub enum LdapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("attribute type '{0}' not found in schema")]
    SchemaLookup(String),

    #[error("normalization failed: {0}")]
    Normalization(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Build-time encoding failures, distinct from protocol violations.
///
/// A `BufferTooSmall` means the caller should retry with a larger buffer,
/// not drop the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("encode buffer too small: need {needed} more bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("cannot encode a {0} PDU")]
    Unencodable(&'static str),
}

/// Decoding failures carry enough positional context for the caller to drop
/// or resynchronize the connection. No partially-parsed object is ever
/// returned alongside one of these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated PDU at offset {offset}: need {needed} more bytes, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unexpected tag at offset {offset}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedTag {
        offset: usize,
        expected: u8,
        actual: u8,
    },

    #[error("indefinite length at offset {offset} is not supported")]
    IndefiniteLength { offset: usize },

    #[error("length at offset {offset} is encoded on {octets} octets, maximum is {max}")]
    LengthTooLong {
        offset: usize,
        octets: usize,
        max: usize,
    },

    #[error("integer at offset {offset} is {len} bytes long, maximum is 4")]
    IntegerTooLong { offset: usize, len: usize },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("unsupported operation tag 0x{tag:02X} at offset {offset}")]
    UnsupportedTag { offset: usize, tag: u8 },

    #[error("PDU size {size} exceeds the configured limit of {limit} bytes")]
    PduTooLarge { size: usize, limit: usize },

    #[error("invalid value at offset {offset}: {reason}")]
    Invalid { offset: usize, reason: String },
}
