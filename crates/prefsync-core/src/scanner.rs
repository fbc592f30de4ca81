//! Mailbox scan: find the active preference email and its orphans.

use prefsync_imap::{Error as ImapError, MailSession, UidSet, reassemble};
use prefsync_prefs::PreferenceEmail;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::Result;

/// Items requested when scanning the folder for candidates.
const SCAN_ITEMS: &str = "(UID ENVELOPE FLAGS)";

/// Outcome of a folder scan.
#[derive(Debug)]
pub struct ScanResult {
    /// The first matching preference email, fully fetched. `None`
    /// when no candidate yielded a usable message body.
    pub email: Option<PreferenceEmail>,
    /// UIDs of further matching messages. Only the first candidate is
    /// honored; the rest are superseded duplicates.
    pub orphans: UidSet,
}

/// Scans the selected folder for preference emails.
///
/// A candidate is any message whose scan line carries the subject
/// marker and no `\Deleted` flag. The first candidate is fetched in
/// full; later ones are reported as orphans. Candidates without a
/// parseable UID are skipped.
///
/// # Errors
///
/// Returns an error if a fetch fails at the protocol level or the
/// response stream is truncated. A first candidate whose body cannot
/// be retrieved is logged and reported as `email: None`.
pub async fn scan<S: MailSession>(
    session: &mut S,
    config: &SyncConfig,
) -> Result<ScanResult> {
    session.check().await?;
    let fragments = session.fetch("1:*", SCAN_ITEMS).await?;

    let mut email = None;
    let mut orphans = UidSet::new();
    for line in reassemble(fragments)? {
        if !line.contains(config.subject_marker.as_bytes())
            || line.contains(b"\\Deleted")
        {
            continue;
        }
        let Some(uid) = line.number_after("UID") else {
            debug!(?line, "candidate line carries no UID, skipping");
            continue;
        };
        if email.is_none() {
            email = fetch_rfc822(session, uid).await?;
        } else {
            orphans.insert(uid);
        }
    }

    Ok(ScanResult { email, orphans })
}

/// Fetches one message in full by UID.
///
/// The message body must arrive as a literal whose length matches the
/// announced `RFC822` size. Lines without the announcement or with no
/// matching literal are logged and skipped, so a partial transfer
/// yields `None` rather than a truncated message.
///
/// # Errors
///
/// Returns an error if the fetch itself fails or the message framing
/// is broken.
pub async fn fetch_rfc822<S: MailSession>(
    session: &mut S,
    uid: u32,
) -> Result<Option<PreferenceEmail>> {
    session.check().await?;
    let set: UidSet = [uid].into_iter().collect();
    let fragments = session.uid_fetch(&set, "(RFC822)").await?;

    for line in reassemble(fragments)? {
        match line.literal_for("RFC822") {
            Ok(payload) => return Ok(Some(PreferenceEmail::from_bytes(uid, payload)?)),
            Err(err @ (ImapError::NoAnnouncement { .. } | ImapError::LiteralNotFound { .. })) => {
                warn!(uid, %err, "fetch response line unusable, skipping");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(uid, "message body was not fetched");
    Ok(None)
}
