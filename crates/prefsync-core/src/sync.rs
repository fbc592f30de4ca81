//! The synchronization protocol: select, scan, edit, replace.

use std::str::FromStr;

use prefsync_imap::{Flag, FlagOp, MailSession, UidSet};
use prefsync_prefs::PreferenceEmail;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::scanner::scan;

/// One requested field change, parsed from `OPTION=VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    /// Preference field name.
    pub name: String,
    /// New field value.
    pub value: String,
}

impl FromStr for FieldEdit {
    type Err = Error;

    /// Splits on the first `=`; surrounding single or double quotes on
    /// the value are stripped.
    fn from_str(s: &str) -> Result<Self> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidEdit(s.to_string()))?;
        if name.is_empty() {
            return Err(Error::InvalidEdit(s.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.trim_matches(['\'', '"']).to_string(),
        })
    }
}

/// What a synchronization run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The document was built from the template rather than an
    /// existing message.
    pub created_from_template: bool,
    /// Edits that matched an existing field and were applied.
    pub edits_applied: usize,
    /// Superseded messages flagged for deletion, including the one
    /// being replaced.
    pub orphans_flagged: usize,
}

/// Applies `edits` to the preference email in the configured folder,
/// replacing it atomically from the reader's point of view.
///
/// The previous message and any duplicates are flagged `\Deleted`
/// before the rewritten message is appended; the expunge after a
/// successful append is the commit point. If the append fails, the
/// flag on the previous message is removed again and the run aborts.
///
/// # Errors
///
/// Fatal conditions are a failed select, an unusable document without
/// the template fallback, a failed append, and a failed expunge.
/// Failure to flag duplicates is logged and ignored.
pub async fn synchronize<S: MailSession>(
    session: &mut S,
    config: &SyncConfig,
    edits: &[FieldEdit],
) -> Result<SyncOutcome> {
    let exists = session
        .select(&config.folder)
        .await
        .map_err(|err| Error::SelectFailed {
            folder: config.folder.clone(),
            reason: err.to_string(),
        })?;

    let mut orphans = UidSet::new();
    let found = if exists == 0 {
        // Empty folder, nothing to scan.
        None
    } else {
        let result = scan(session, config).await?;
        orphans = result.orphans;
        result.email
    };

    let created_from_template = found.is_none();
    let mut email = match found {
        Some(email) => email,
        None => {
            info!(folder = %config.folder, "no usable preference email, starting from the template");
            PreferenceEmail::from_template(&config.subject_marker, &config.from_address)
        }
    };

    let mut edits_applied = 0;
    if !edits.is_empty() {
        let document = email.document_mut(config.fallback)?;
        for edit in edits {
            if document.set(&edit.name, &edit.value) {
                edits_applied += 1;
            }
        }
    }

    // The message being replaced joins the duplicates to be flagged.
    if email.uid() != 0 {
        orphans.insert(email.uid());
    }

    let orphans_flagged = orphans.len();
    if !orphans.is_empty() {
        if let Err(err) = session
            .uid_store(&orphans, FlagOp::Add, &Flag::Deleted)
            .await
        {
            warn!(%orphans, %err, "could not flag superseded preference emails for deletion");
        }
    }

    let message = email.to_bytes()?;
    if let Err(err) = session
        .append(&config.folder, &[Flag::Seen], &message)
        .await
    {
        let rolled_back = if email.uid() == 0 {
            false
        } else {
            let prior: UidSet = [email.uid()].into_iter().collect();
            match session
                .uid_store(&prior, FlagOp::Remove, &Flag::Deleted)
                .await
            {
                Ok(()) => true,
                Err(store_err) => {
                    warn!(uid = email.uid(), %store_err, "rollback of deletion flag failed");
                    false
                }
            }
        };
        return Err(Error::AppendFailed {
            reason: err.to_string(),
            rolled_back,
        });
    }

    session
        .expunge()
        .await
        .map_err(|err| Error::ExpungeFailed(err.to_string()))?;

    Ok(SyncOutcome {
        created_from_template,
        edits_applied,
        orphans_flagged,
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn field_edit_parses_name_and_value() {
        let edit: FieldEdit = "locale=de_DE".parse().unwrap();
        assert_eq!(edit.name, "locale");
        assert_eq!(edit.value, "de_DE");
    }

    #[test]
    fn field_edit_strips_surrounding_quotes() {
        let edit: FieldEdit = "signatureText=\"kind regards\"".parse().unwrap();
        assert_eq!(edit.value, "kind regards");
        let edit: FieldEdit = "signatureText='kind regards'".parse().unwrap();
        assert_eq!(edit.value, "kind regards");
    }

    #[test]
    fn field_edit_splits_on_first_equals_only() {
        let edit: FieldEdit = "workWeek=1,2=3".parse().unwrap();
        assert_eq!(edit.name, "workWeek");
        assert_eq!(edit.value, "1,2=3");
    }

    #[test]
    fn field_edit_rejects_bad_shapes() {
        assert!(matches!(
            "no-equals-here".parse::<FieldEdit>(),
            Err(Error::InvalidEdit(_))
        ));
        assert!(matches!(
            "=value".parse::<FieldEdit>(),
            Err(Error::InvalidEdit(_))
        ));
    }

    #[test]
    fn field_edit_allows_empty_value() {
        let edit: FieldEdit = "newMailSound=".parse().unwrap();
        assert_eq!(edit.value, "");
    }
}
