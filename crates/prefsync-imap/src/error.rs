//! Error types for the IMAP wire layer.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned NO response.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server returned BAD response.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Fragment stream ended before the current record closed.
    ///
    /// The transport reply was truncated mid-record; emitting the
    /// partial line would corrupt every line after it.
    #[error("Response ended mid-record after {consumed} fragment(s): {pending:?}")]
    Incomplete {
        /// Number of fragments consumed into the unfinished record.
        consumed: usize,
        /// Accumulated text of the unfinished record (lossy).
        pending: String,
    },

    /// A line announced a literal of a size no attachment matches.
    #[error("No literal of {announced} byte(s) attached to line {line:?}")]
    LiteralNotFound {
        /// Byte count the line announced.
        announced: usize,
        /// The line text (lossy).
        line: String,
    },

    /// The line carries no `item {n}` size announcement at all.
    #[error("Line carries no {item} size announcement: {line:?}")]
    NoAnnouncement {
        /// Item token that was looked for.
        item: String,
        /// The line text (lossy).
        line: String,
    },

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
