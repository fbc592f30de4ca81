//! Integration tests for the synchronization protocol.
//!
//! These tests use an in-memory fake session that models a mailbox,
//! so the full select, scan, edit, replace cycle runs without a
//! server connection.

use prefsync_core::{Error, FieldEdit, SyncConfig, synchronize};
use prefsync_imap::{Error as ImapError, Flag, FlagOp, Fragment, MailSession, UidSet};
use prefsync_prefs::{ParseFallback, PreferenceDocument, PreferenceEmail};

/// One stored message in the fake mailbox.
#[derive(Debug, Clone)]
struct StoredMessage {
    uid: u32,
    subject: String,
    deleted: bool,
    raw: Vec<u8>,
}

/// In-memory mailbox implementing [`MailSession`].
#[derive(Debug, Default)]
struct FakeSession {
    mailbox: Vec<StoredMessage>,
    next_uid: u32,
    selected: Option<String>,
    expunged: bool,
    fail_select: bool,
    fail_store: bool,
    fail_append: bool,
    fail_expunge: bool,
}

impl FakeSession {
    fn new(messages: Vec<StoredMessage>) -> Self {
        let next_uid = messages.iter().map(|m| m.uid).max().unwrap_or(0) + 1;
        Self {
            mailbox: messages,
            next_uid,
            ..Self::default()
        }
    }

    fn message(&self, uid: u32) -> Option<&StoredMessage> {
        self.mailbox.iter().find(|m| m.uid == uid)
    }

    fn live_subjects(&self) -> Vec<&str> {
        self.mailbox
            .iter()
            .filter(|m| !m.deleted)
            .map(|m| m.subject.as_str())
            .collect()
    }
}

impl MailSession for FakeSession {
    async fn select(&mut self, folder: &str) -> prefsync_imap::Result<u32> {
        if self.fail_select {
            return Err(ImapError::No("SELECT failed".to_string()));
        }
        self.selected = Some(folder.to_string());
        Ok(u32::try_from(self.mailbox.len()).unwrap())
    }

    async fn check(&mut self) -> prefsync_imap::Result<()> {
        Ok(())
    }

    async fn fetch(&mut self, _set: &str, _items: &str) -> prefsync_imap::Result<Vec<Fragment>> {
        let mut fragments = Vec::new();
        for (seq, message) in self.mailbox.iter().enumerate() {
            let flags = if message.deleted { "\\Seen \\Deleted" } else { "\\Seen" };
            // Subject delivered as a literal, as servers are free to do.
            fragments.push(Fragment::literal(
                format!(
                    "* {} FETCH (UID {} ENVELOPE (NIL {{{}}}",
                    seq + 1,
                    message.uid,
                    message.subject.len()
                ),
                message.subject.clone(),
            ));
            fragments.push(Fragment::text(format!(" NIL NIL) FLAGS ({flags}))")));
        }
        Ok(fragments)
    }

    async fn uid_fetch(
        &mut self,
        set: &UidSet,
        _items: &str,
    ) -> prefsync_imap::Result<Vec<Fragment>> {
        let mut fragments = Vec::new();
        for uid in set.iter() {
            let Some(message) = self.message(uid) else { continue };
            fragments.push(Fragment::literal(
                format!("* 1 FETCH (UID {} RFC822 {{{}}}", uid, message.raw.len()),
                message.raw.clone(),
            ));
            fragments.push(Fragment::text(")"));
        }
        Ok(fragments)
    }

    async fn uid_store(
        &mut self,
        set: &UidSet,
        op: FlagOp,
        flag: &Flag,
    ) -> prefsync_imap::Result<()> {
        if self.fail_store {
            return Err(ImapError::No("STORE failed".to_string()));
        }
        assert_eq!(*flag, Flag::Deleted);
        for message in &mut self.mailbox {
            if set.contains(message.uid) {
                message.deleted = matches!(op, FlagOp::Add);
            }
        }
        Ok(())
    }

    async fn append(
        &mut self,
        _folder: &str,
        flags: &[Flag],
        message: &[u8],
    ) -> prefsync_imap::Result<()> {
        if self.fail_append {
            return Err(ImapError::No("APPEND denied".to_string()));
        }
        assert!(flags.contains(&Flag::Seen));
        let subject = subject_of(message);
        self.mailbox.push(StoredMessage {
            uid: self.next_uid,
            subject,
            deleted: false,
            raw: message.to_vec(),
        });
        self.next_uid += 1;
        Ok(())
    }

    async fn expunge(&mut self) -> prefsync_imap::Result<()> {
        if self.fail_expunge {
            return Err(ImapError::No("EXPUNGE failed".to_string()));
        }
        self.mailbox.retain(|m| !m.deleted);
        self.expunged = true;
        Ok(())
    }
}

fn subject_of(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.lines()
        .find_map(|l| l.strip_prefix("Subject: "))
        .unwrap_or_default()
        .to_string()
}

/// A stored preference email whose body holds the given document.
fn pref_message(uid: u32, document: &PreferenceDocument) -> StoredMessage {
    let mut raw = Vec::new();
    raw.extend_from_slice(b"X-Oddpost-Class: prefs\r\n");
    raw.extend_from_slice(b"Subject: [prefs(v2.1) data]\r\n");
    raw.extend_from_slice(b"From: swa@scalix.com\r\n");
    raw.extend_from_slice(b"Content-Type: text/plain; charset=\"utf-8\"\r\n");
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(document.to_xml().as_bytes());
    StoredMessage {
        uid,
        subject: "[prefs(v2.1) data]".to_string(),
        deleted: false,
        raw,
    }
}

fn unrelated_message(uid: u32) -> StoredMessage {
    StoredMessage {
        uid,
        subject: "lunch on friday?".to_string(),
        deleted: false,
        raw: b"Subject: lunch on friday?\r\n\r\nburgers?\r\n".to_vec(),
    }
}

/// Parses the single surviving preference email out of the mailbox.
fn surviving_document(session: &FakeSession) -> PreferenceDocument {
    let survivors: Vec<_> = session
        .mailbox
        .iter()
        .filter(|m| !m.deleted && m.subject == "[prefs(v2.1) data]")
        .collect();
    assert_eq!(survivors.len(), 1, "expected exactly one preference email");
    let mut email = PreferenceEmail::from_bytes(survivors[0].uid, &survivors[0].raw).unwrap();
    email.document(ParseFallback::Abort).unwrap().clone()
}

fn edits(specs: &[&str]) -> Vec<FieldEdit> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

#[tokio::test]
async fn empty_mailbox_creates_template_message() {
    let mut session = FakeSession::new(Vec::new());
    let outcome = synchronize(&mut session, &SyncConfig::default(), &edits(&["locale=de_DE"]))
        .await
        .unwrap();

    assert!(outcome.created_from_template);
    assert_eq!(outcome.edits_applied, 1);
    assert_eq!(outcome.orphans_flagged, 0);
    assert_eq!(session.selected.as_deref(), Some("#Scalix/Oddpost"));
    assert!(session.expunged);

    let document = surviving_document(&session);
    assert_eq!(document.get("locale"), Some("de_DE"));
    assert_eq!(document.get("workDayStart"), Some("480"));
}

#[tokio::test]
async fn existing_email_is_edited_and_replaced() {
    let mut original = PreferenceDocument::template();
    original.set("signatureText", "see you soon");
    let mut session = FakeSession::new(vec![
        unrelated_message(2),
        pref_message(5, &original),
    ]);

    let outcome = synchronize(&mut session, &SyncConfig::default(), &edits(&["locale=fr_FR"]))
        .await
        .unwrap();

    assert!(!outcome.created_from_template);
    assert_eq!(outcome.edits_applied, 1);
    assert_eq!(outcome.orphans_flagged, 1);
    assert!(session.message(5).is_none(), "old message expunged");
    assert!(session.message(2).is_some(), "unrelated mail untouched");

    let document = surviving_document(&session);
    assert_eq!(document.get("locale"), Some("fr_FR"));
    assert_eq!(document.get("signatureText"), Some("see you soon"));
}

#[tokio::test]
async fn duplicate_preference_emails_become_orphans() {
    let template = PreferenceDocument::template();
    let mut session = FakeSession::new(vec![
        pref_message(3, &template),
        pref_message(7, &template),
        pref_message(9, &template),
    ]);

    let outcome = synchronize(&mut session, &SyncConfig::default(), &edits(&["weekStart=1"]))
        .await
        .unwrap();

    assert_eq!(outcome.orphans_flagged, 3);
    assert_eq!(session.live_subjects(), vec!["[prefs(v2.1) data]"]);
    assert_eq!(surviving_document(&session).get("weekStart"), Some("1"));
}

#[tokio::test]
async fn already_deleted_candidates_are_ignored() {
    let mut message = pref_message(4, &PreferenceDocument::template());
    message.deleted = true;
    let mut session = FakeSession::new(vec![message]);

    let outcome = synchronize(&mut session, &SyncConfig::default(), &edits(&["locale=de_DE"]))
        .await
        .unwrap();

    assert!(outcome.created_from_template);
    assert_eq!(outcome.orphans_flagged, 0);
}

#[tokio::test]
async fn unknown_option_is_dropped_not_added() {
    let mut session = FakeSession::new(vec![pref_message(1, &PreferenceDocument::template())]);

    let outcome = synchronize(
        &mut session,
        &SyncConfig::default(),
        &edits(&["noSuchOption=1", "locale=en_GB"]),
    )
    .await
    .unwrap();

    assert_eq!(outcome.edits_applied, 1);
    let document = surviving_document(&session);
    assert_eq!(document.get("noSuchOption"), None);
    assert_eq!(document.get("locale"), Some("en_GB"));
}

#[tokio::test]
async fn append_failure_rolls_back_deletion_flag() {
    let mut session = FakeSession::new(vec![pref_message(5, &PreferenceDocument::template())]);
    session.fail_append = true;

    let err = synchronize(&mut session, &SyncConfig::default(), &edits(&["locale=de_DE"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AppendFailed { rolled_back: true, .. }));
    assert!(!session.expunged);
    let message = session.message(5).unwrap();
    assert!(!message.deleted, "deletion flag removed again");
}

#[tokio::test]
async fn append_failure_without_prior_message_does_not_roll_back() {
    let mut session = FakeSession::new(Vec::new());
    session.fail_append = true;

    let err = synchronize(&mut session, &SyncConfig::default(), &edits(&["locale=de_DE"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AppendFailed { rolled_back: false, .. }));
}

#[tokio::test]
async fn store_failure_is_not_fatal() {
    let mut session = FakeSession::new(vec![
        pref_message(3, &PreferenceDocument::template()),
        pref_message(7, &PreferenceDocument::template()),
    ]);
    session.fail_store = true;

    let outcome = synchronize(&mut session, &SyncConfig::default(), &edits(&["locale=de_DE"]))
        .await
        .unwrap();

    assert!(!outcome.created_from_template);
    assert_eq!(surviving_document_count(&session), 3, "older copies linger");
}

fn surviving_document_count(session: &FakeSession) -> usize {
    session
        .mailbox
        .iter()
        .filter(|m| !m.deleted && m.subject == "[prefs(v2.1) data]")
        .count()
}

#[tokio::test]
async fn expunge_failure_is_surfaced_but_the_new_message_persists() {
    let mut session = FakeSession::new(vec![pref_message(5, &PreferenceDocument::template())]);
    session.fail_expunge = true;

    let err = synchronize(&mut session, &SyncConfig::default(), &edits(&["locale=de_DE"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ExpungeFailed(_)));
    // The append already happened; only the flagged cleanup is stuck.
    let appended = session.message(6).unwrap();
    assert!(!appended.deleted);
    let mut email = PreferenceEmail::from_bytes(6, &appended.raw).unwrap();
    assert_eq!(
        email.document(ParseFallback::Abort).unwrap().get("locale"),
        Some("de_DE")
    );
    let prior = session.message(5).unwrap();
    assert!(prior.deleted, "old message stays flagged, not removed");
}

#[tokio::test]
async fn select_failure_is_fatal() {
    let mut session = FakeSession::new(Vec::new());
    session.fail_select = true;

    let err = synchronize(&mut session, &SyncConfig::default(), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SelectFailed { .. }));
}

#[tokio::test]
async fn second_run_converges() {
    let mut session = FakeSession::new(vec![pref_message(1, &PreferenceDocument::template())]);
    let config = SyncConfig::default();
    let wanted = edits(&["locale=it_IT", "weekStart=1"]);

    synchronize(&mut session, &config, &wanted).await.unwrap();
    let outcome = synchronize(&mut session, &config, &wanted).await.unwrap();

    assert!(!outcome.created_from_template);
    assert_eq!(outcome.edits_applied, 2);
    assert_eq!(outcome.orphans_flagged, 1);
    let document = surviving_document(&session);
    assert_eq!(document.get("locale"), Some("it_IT"));
    assert_eq!(document.get("weekStart"), Some("1"));
}

#[tokio::test]
async fn unusable_body_falls_back_to_template_when_allowed() {
    let broken = StoredMessage {
        uid: 6,
        subject: "[prefs(v2.1) data]".to_string(),
        deleted: false,
        raw: b"Subject: [prefs(v2.1) data]\r\n\r\nnot a document at all\r\n".to_vec(),
    };
    let mut session = FakeSession::new(vec![broken.clone()]);

    let strict = SyncConfig::default();
    let err = synchronize(&mut session, &strict, &edits(&["locale=de_DE"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Prefs(prefsync_prefs::Error::Unusable(_))));

    let mut session = FakeSession::new(vec![broken]);
    let lenient = SyncConfig {
        fallback: ParseFallback::UseTemplate,
        ..SyncConfig::default()
    };
    let outcome = synchronize(&mut session, &lenient, &edits(&["locale=de_DE"]))
        .await
        .unwrap();

    assert!(!outcome.created_from_template);
    assert_eq!(surviving_document(&session).get("locale"), Some("de_DE"));
}
