//! Command tagging and serialization.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{Flag, FlagOp, UidSet};

/// Tag generator for IMAP commands.
///
/// Generates unique sequential tags in the format "A0000", "A0001", …
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Generates the next tag.
    ///
    /// # Panics
    ///
    /// Panics if the counter would wrap, which would reuse tags and
    /// misattribute replies.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        assert!(n != u32::MAX, "tag counter overflow");
        format!("{}{:04}", self.prefix, n)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

/// Writes an astring (atom or quoted string).
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}

fn command(tag: &str, verb: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(tag.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(verb.as_bytes());
    buf
}

fn finish(mut buf: Vec<u8>) -> Vec<u8> {
    buf.extend_from_slice(b"\r\n");
    buf
}

/// `TAG LOGIN user pass`.
pub fn login(tag: &str, user: &str, pass: &str) -> Vec<u8> {
    let mut buf = command(tag, "LOGIN");
    buf.push(b' ');
    write_astring(&mut buf, user);
    buf.push(b' ');
    write_astring(&mut buf, pass);
    finish(buf)
}

/// `TAG SELECT folder`.
pub fn select(tag: &str, folder: &str) -> Vec<u8> {
    let mut buf = command(tag, "SELECT");
    buf.push(b' ');
    write_astring(&mut buf, folder);
    finish(buf)
}

/// `TAG CHECK`.
pub fn check(tag: &str) -> Vec<u8> {
    finish(command(tag, "CHECK"))
}

/// `TAG FETCH set items` or `TAG UID FETCH set items`.
pub fn fetch(tag: &str, set: &str, items: &str, uid: bool) -> Vec<u8> {
    let mut buf = command(tag, if uid { "UID FETCH" } else { "FETCH" });
    buf.push(b' ');
    buf.extend_from_slice(set.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(items.as_bytes());
    finish(buf)
}

/// `TAG UID STORE set ±FLAGS (flag)`.
pub fn uid_store(tag: &str, set: &UidSet, op: FlagOp, flag: &Flag) -> Vec<u8> {
    let mut buf = command(tag, "UID STORE");
    buf.push(b' ');
    buf.extend_from_slice(set.to_string().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(op.as_imap().as_bytes());
    buf.extend_from_slice(b" (");
    buf.extend_from_slice(flag.as_imap().as_bytes());
    buf.push(b')');
    finish(buf)
}

/// `TAG APPEND folder (flags) "date" {n}`; the literal itself follows
/// the server's continuation.
pub fn append(tag: &str, folder: &str, flags: &[Flag], internal_date: &str, size: usize) -> Vec<u8> {
    let mut buf = command(tag, "APPEND");
    buf.push(b' ');
    write_astring(&mut buf, folder);
    buf.extend_from_slice(b" (");
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(flag.as_imap().as_bytes());
    }
    buf.extend_from_slice(b") \"");
    buf.extend_from_slice(internal_date.as_bytes());
    buf.extend_from_slice(b"\" {");
    buf.extend_from_slice(size.to_string().as_bytes());
    buf.push(b'}');
    finish(buf)
}

/// `TAG EXPUNGE`.
pub fn expunge(tag: &str) -> Vec<u8> {
    finish(command(tag, "EXPUNGE"))
}

/// `TAG LOGOUT`.
pub fn logout(tag: &str) -> Vec<u8> {
    finish(command(tag, "LOGOUT"))
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
    fn tag_generation() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0000");
        assert_eq!(tags.next(), "A0001");
    }

    #[test]
    fn custom_prefix() {
        let tags = TagGenerator::new('T');
        assert_eq!(tags.next(), "T0000");
    }

    #[test]
    fn astring_plain_atom() {
        let mut buf = Vec::new();
        write_astring(&mut buf, "INBOX");
        assert_eq!(buf, b"INBOX");
    }

    #[test]
    fn astring_quotes_specials() {
        let mut buf = Vec::new();
        write_astring(&mut buf, "#Scalix/Oddpost folder");
        assert_eq!(buf, b"\"#Scalix/Oddpost folder\"");

        let mut buf = Vec::new();
        write_astring(&mut buf, "a\"b\\c");
        assert_eq!(buf, b"\"a\\\"b\\\\c\"");
    }

    #[test]
    fn login_command() {
        assert_eq!(
            login("A0000", "user", "pa ss"),
            b"A0000 LOGIN user \"pa ss\"\r\n"
        );
    }

    #[test]
    fn select_command() {
        assert_eq!(
            select("A0001", "#Scalix/Oddpost"),
            b"A0001 SELECT #Scalix/Oddpost\r\n"
        );
    }

    #[test]
    fn fetch_commands() {
        assert_eq!(
            fetch("A0002", "1:*", "(UID ENVELOPE FLAGS)", false),
            b"A0002 FETCH 1:* (UID ENVELOPE FLAGS)\r\n"
        );
        assert_eq!(
            fetch("A0003", "444", "(RFC822)", true),
            b"A0003 UID FETCH 444 (RFC822)\r\n"
        );
    }

    #[test]
    fn uid_store_command() {
        let set: UidSet = [7, 3].into_iter().collect();
        assert_eq!(
            uid_store("A0004", &set, FlagOp::Add, &Flag::Deleted),
            b"A0004 UID STORE 3,7 +FLAGS (\\Deleted)\r\n"
        );
        let one: UidSet = [3].into_iter().collect();
        assert_eq!(
            uid_store("A0005", &one, FlagOp::Remove, &Flag::Deleted),
            b"A0005 UID STORE 3 -FLAGS (\\Deleted)\r\n"
        );
    }

    #[test]
    fn append_command() {
        assert_eq!(
            append(
                "A0006",
                "INBOX",
                &[Flag::Seen],
                "01-Jan-2026 12:00:00 +0000",
                42
            ),
            b"A0006 APPEND INBOX (\\Seen) \"01-Jan-2026 12:00:00 +0000\" {42}\r\n"
        );
    }

    #[test]
    fn bare_commands() {
        assert_eq!(check("A0007"), b"A0007 CHECK\r\n");
        assert_eq!(expunge("A0008"), b"A0008 EXPUNGE\r\n");
        assert_eq!(logout("A0009"), b"A0009 LOGOUT\r\n");
    }
}
