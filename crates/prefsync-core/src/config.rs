//! Synchronization settings.

use prefsync_prefs::ParseFallback;

/// Where the preference email lives and how it is recognized.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Mailbox folder holding the preference email.
    pub folder: String,
    /// Subject marker identifying a preference email.
    pub subject_marker: String,
    /// `From` address for messages built from the template.
    pub from_address: String,
    /// What to do when the stored body is unusable.
    pub fallback: ParseFallback,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            folder: "#Scalix/Oddpost".to_string(),
            subject_marker: "[prefs(v2.1) data]".to_string(),
            from_address: "swa@scalix.com".to_string(),
            fallback: ParseFallback::Abort,
        }
    }
}
