//! Error types for the codec and the channel.

use std::io;

use thiserror::Error;

/// Result type for codec operations.
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// A value failed the rules of the wire type it is about to be written as.
///
/// Raised before any byte is written, so a failing validation never leaves
/// a buffer half-filled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Null given where the type does not accept it.
    #[error("Provided value is null, expected type: {expected}")]
    NullValue { expected: &'static str },

    /// Value of the wrong kind.
    #[error("{found} does not have expected type: {expected}")]
    IncorrectType { found: String, expected: &'static str },

    /// Integer outside the range of the wire type.
    #[error("{value} is not between expected range: [{lower}, {upper}]")]
    IncorrectRange { value: i64, lower: i64, upper: i64 },

    /// String longer than a 16-bit length prefix can describe.
    #[error("String length ({length}) is larger than the maximum length ({max})")]
    IncorrectLength { length: usize, max: usize },

    /// Required field absent from the data structure.
    #[error("Field \"{name}\" missing from given structure")]
    MissingField { name: String },

    /// A nested field failed; carries the field name for traceability.
    #[error("Invalid value for field \"{name}\": {source}")]
    InvalidField {
        name: String,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Wraps a field-level failure with the field name.
    pub fn for_field(name: impl Into<String>, source: ValidationError) -> Self {
        Self::InvalidField {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

/// Errors raised while encoding or decoding protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A read or write would cross the end of a fixed-size buffer.
    #[error("It was not possible to read/write {length} byte(s) from current position")]
    AllocationExhausted { length: usize },

    /// Typed buffer write with a value that does not fit the wire width.
    #[error("Given value ({value}) is out of the expected range [{lower}, {upper}]")]
    OutOfRange { value: i64, lower: i64, upper: i64 },

    /// Data did not satisfy its schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The response header carried a correlation id other than the one sent.
    #[error("Correlation id mismatch: sent {expected}, received {actual}")]
    CorrelationMismatch { expected: i32, actual: i32 },

    /// A non-nullable string or byte sequence arrived with a negative length.
    #[error("Unexpected length ({length}) for a non-nullable value")]
    NegativeLength { length: i64 },

    /// String bytes on the wire were not UTF-8.
    #[error("String content is not valid UTF-8")]
    InvalidUtf8,

    /// No schema is known for the requested version.
    #[error("Unsupported version {version} for api key {api_key}")]
    UnsupportedVersion { api_key: i16, version: i16 },

    /// A frame announced more bytes than the channel accepts.
    #[error("Frame of {size} bytes exceeds the maximum of {max} bytes")]
    FrameTooLarge { size: i64, max: usize },
}

/// Errors surfaced to callers of the client API.
#[derive(Debug, Error)]
pub enum Error {
    /// Encoding or decoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection went away while the request was in flight.
    #[error("Connection closed before the response arrived")]
    ConnectionClosed,

    /// A bootstrap entry was not `host:port`.
    #[error("Invalid bootstrap server: {server}")]
    InvalidBootstrapServer { server: String },
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::Protocol(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_message() {
        let err = ProtocolError::OutOfRange {
            value: 128,
            lower: -128,
            upper: 127,
        };
        assert_eq!(
            err.to_string(),
            "Given value (128) is out of the expected range [-128, 127]"
        );
    }

    #[test]
    fn test_field_wrapping_message() {
        let err = ValidationError::for_field(
            "client_id",
            ValidationError::NullValue { expected: "string" },
        );
        assert_eq!(
            err.to_string(),
            "Invalid value for field \"client_id\": Provided value is null, expected type: string"
        );
    }
}
