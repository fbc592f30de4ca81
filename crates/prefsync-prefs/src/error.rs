//! Error types for preference document handling.

use std::string::FromUtf8Error;

/// Result type alias for preference operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Preference document error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid transfer encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// The message carries no body section.
    #[error("Message has no body")]
    MissingBody,

    /// Body unparsable even after the fallback decode, and the caller
    /// asked to abort rather than substitute the template.
    #[error(
        "Preference document is unusable: {0}. Re-run with --replace-invalid-xml \
         to substitute the built-in template."
    )]
    Unusable(String),
}
