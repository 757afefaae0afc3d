//! Error types for marshalling values across the boundary

/// Result type for marshaller operations
pub type MarshalResult<T> = Result<T, MarshalError>;

/// Marshalling error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
    /// Input ended before the value was fully read
    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the input
        remaining: usize,
    },

    /// A string payload was not valid UTF-8
    #[error("Invalid UTF-8 in marshalled string")]
    InvalidUtf8,

    /// An enum or presence tag had an unknown value
    #[error("Invalid tag {tag} for {what}")]
    InvalidTag {
        /// What was being decoded
        what: &'static str,
        /// The tag byte that was read
        tag: u8,
    },

    /// Output would grow past its byte limit
    #[error("Marshalled output exceeds the {limit} byte limit")]
    LimitExceeded {
        /// The output's limit
        limit: usize,
    },

    /// Blob or string too long for its `u32` length prefix
    #[error("Blob of {len} bytes does not fit a u32 length prefix")]
    BlobTooLarge {
        /// Length of the rejected blob
        len: usize,
    },

    /// Marshaller-specific failure
    #[error("{0}")]
    Custom(String),
}

impl From<String> for MarshalError {
    fn from(s: String) -> Self {
        MarshalError::Custom(s)
    }
}

impl From<&str> for MarshalError {
    fn from(s: &str) -> Self {
        MarshalError::Custom(s.to_string())
    }
}
