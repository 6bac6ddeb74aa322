//! Error types for identity and class parsing.

use thiserror::Error;

/// Errors that can occur when parsing or validating identities and IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("identity cannot be empty")]
    Empty,

    /// The input is not a GUID in any accepted textual form.
    #[error("invalid GUID '{input}': {message}")]
    InvalidGuid { input: String, message: String },

    /// A raw identity did not have the expected byte length.
    #[error("invalid identity length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The counter class name is not one of the known classes.
    #[error("unknown counter class '{0}': expected 'user' or 'group'")]
    UnknownCounterClass(String),

    /// The value does not fit in a POSIX ID.
    #[error("value {0} is outside the POSIX ID range 0..=4294967295")]
    OutOfRange(i64),
}
