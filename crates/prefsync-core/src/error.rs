//! Error types for the synchronization service.

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IMAP protocol or transport failure.
    #[error("IMAP error: {0}")]
    Imap(#[from] prefsync_imap::Error),

    /// Preference document or message failure.
    #[error("Preference error: {0}")]
    Prefs(#[from] prefsync_prefs::Error),

    /// The preference folder could not be selected.
    #[error("Could not select folder {folder}: {reason}")]
    SelectFailed {
        /// Folder that was requested.
        folder: String,
        /// Server response or transport error.
        reason: String,
    },

    /// The rewritten message could not be appended.
    #[error("Could not save preference email (previous message restored: {rolled_back}): {reason}")]
    AppendFailed {
        /// Server response or transport error.
        reason: String,
        /// Whether the \Deleted flag on the previous message was
        /// successfully removed again.
        rolled_back: bool,
    },

    /// The final expunge failed; flagged messages may linger.
    #[error("Expunge failed after append: {0}")]
    ExpungeFailed(String),

    /// An edit argument did not match `OPTION=VALUE`.
    #[error("Invalid option format {0:?}; expected OPTION=VALUE")]
    InvalidEdit(String),
}
