//! Protocol error types.

use thiserror::Error;

/// Errors produced while encoding or decoding wire records.
///
/// Decoding never panics on malformed input; every failure mode maps to one
/// of these variants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended before the record was complete.
    #[error("unexpected end of data")]
    UnexpectedEof,

    /// An enum field carried a value outside its declared set.
    #[error("invalid value {value} for {what}")]
    InvalidEnum {
        /// Name of the enum being decoded.
        what: &'static str,
        /// The offending raw value.
        value: i64,
    },

    /// A variable-length field exceeded its declared maximum.
    #[error("{what} too large ({len} > {max})")]
    TooLarge {
        /// Name of the field being coded.
        what: &'static str,
        /// Actual length.
        len: usize,
        /// Declared maximum.
        max: usize,
    },

    /// A string field held bytes that are not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
}

/// Errors produced by the framed packet stream.
///
/// All variants are terminal for the connection that raised them.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The stream did not begin with the `SUPLA` start tag.
    #[error("invalid data received; incorrect start tag")]
    BadStartTag,

    /// The packet header fields could not be decoded.
    #[error("invalid data received; failed to decode header")]
    BadHeader,

    /// The peer announced a protocol version below the supported minimum.
    #[error("invalid data received; proto version not supported")]
    UnsupportedVersion,

    /// The packet did not terminate with the `SUPLA` end tag.
    #[error("invalid data received; incorrect end tag")]
    BadEndTag,

    /// The peer closed the stream in an orderly fashion.
    #[error("eof")]
    Eof,

    /// Underlying transport failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
