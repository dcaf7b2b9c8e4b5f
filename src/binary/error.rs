//! Binary-codec error taxonomy.
//!
//! Shaped after [`crate::parser::error::ParseError`]: a plain enum, hand-rolled
//! `Display`, no `thiserror`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    UnexpectedEof,
    /// A size-prefixed block had trailing bytes after its contents were read.
    DataNotConsumed,
    /// An LEB128 varint ran past 64 bits of payload without a terminating byte.
    InvalidVarint,
    InvalidSignature,
    UnsupportedVersion,
    UnsupportedChunkType,
    UnsupportedCustomDataType,
    UnsupportedValueType,
    InvalidUtf8Encoding,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnexpectedEof => "unexpected end of file",
            Self::DataNotConsumed => "size-prefixed block had trailing bytes",
            Self::InvalidVarint => "varint exceeded 64 bits without a terminating byte",
            Self::InvalidSignature => "invalid signature",
            Self::UnsupportedVersion => "unsupported format version",
            Self::UnsupportedChunkType => "unsupported chunk type",
            Self::UnsupportedCustomDataType => "custom data cannot be read from the binary format",
            Self::UnsupportedValueType => "unsupported value type tag",
            Self::InvalidUtf8Encoding => "invalid UTF-8 encoding",
        };
        f.write_str(s)
    }
}

impl std::error::Error for ReadError {}

pub type ReadOutcome<T> = Result<T, ReadError>;
