//! Core wire types: flags and UID sets.

use std::collections::BTreeSet;
use std::fmt;

/// IMAP message flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message is marked for removal.
    Deleted,
    /// Message has been answered.
    Answered,
    /// Message is flagged for attention.
    Flagged,
    /// Message is a draft.
    Draft,
    /// Server- or site-defined keyword.
    Custom(String),
}

impl Flag {
    /// Returns the wire form of the flag.
    #[must_use]
    pub fn as_imap(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Deleted => "\\Deleted",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Draft => "\\Draft",
            Self::Custom(s) => s,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_imap())
    }
}

/// Direction of a STORE flag change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOp {
    /// `+FLAGS`: add the flag.
    Add,
    /// `-FLAGS`: remove the flag.
    Remove,
}

impl FlagOp {
    /// Returns the wire form of the operation.
    #[must_use]
    pub const fn as_imap(self) -> &'static str {
        match self {
            Self::Add => "+FLAGS",
            Self::Remove => "-FLAGS",
        }
    }
}

/// An ordered set of message UIDs.
///
/// `Display` produces the comma-joined wire form used by `UID STORE`
/// and `UID FETCH`. Doubles as the orphan set collected by the scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UidSet(BTreeSet<u32>);

impl UidSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a UID; returns false if it was already present.
    pub fn insert(&mut self, uid: u32) -> bool {
        self.0.insert(uid)
    }

    /// Returns true if the UID is present.
    #[must_use]
    pub fn contains(&self, uid: u32) -> bool {
        self.0.contains(&uid)
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of UIDs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the UIDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, uid) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{uid}")?;
        }
        Ok(())
    }
}

impl FromIterator<u32> for UidSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
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
    fn flag_wire_forms() {
        assert_eq!(Flag::Seen.as_imap(), "\\Seen");
        assert_eq!(Flag::Deleted.as_imap(), "\\Deleted");
        assert_eq!(Flag::Custom("$Label1".to_string()).as_imap(), "$Label1");
    }

    #[test]
    fn flag_op_wire_forms() {
        assert_eq!(FlagOp::Add.as_imap(), "+FLAGS");
        assert_eq!(FlagOp::Remove.as_imap(), "-FLAGS");
    }

    #[test]
    fn uid_set_display_is_sorted_and_comma_joined() {
        let set: UidSet = [9, 3, 12, 3].into_iter().collect();
        assert_eq!(set.to_string(), "3,9,12");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn uid_set_insert_dedup() {
        let mut set = UidSet::new();
        assert!(set.insert(5));
        assert!(!set.insert(5));
        assert!(set.contains(5));
        assert!(!set.is_empty());
    }

    #[test]
    fn empty_uid_set_display() {
        assert_eq!(UidSet::new().to_string(), "");
    }
}
