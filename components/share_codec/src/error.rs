//! Error types for the share-token codec

use thiserror::Error;

/// Why a token could not be produced or read back
#[derive(Debug, Error)]
pub enum CodecError {
    /// A mandatory part is absent from the token
    #[error("share token has no {0} part")]
    MissingPart(&'static str),

    /// A part is not valid base64
    #[error("share token {part} part is not valid base64: {source}")]
    Base64 {
        /// Which part failed
        part: &'static str,
        /// Underlying decode error
        #[source]
        source: base64::DecodeError,
    },

    /// A part decodes to bytes that are not UTF-8 text
    #[error("share token {part} part is not UTF-8: {source}")]
    Utf8 {
        /// Which part failed
        part: &'static str,
        /// Underlying conversion error
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// The tests part is not a JSON list of tests
    #[error("share token tests part is malformed: {0}")]
    Tests(#[from] serde_json::Error),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
