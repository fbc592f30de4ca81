//! Order-preserving message header handling.
//!
//! A preference message is round-tripped byte-faithfully except for
//! the body we rewrite, so headers keep their original order and
//! spelling rather than living in a map.

use std::fmt;

use crate::error::Result;

/// Ordered collection of message headers.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header: overwrites the first occurrence in place, or
    /// appends if the header is absent. Later duplicates are removed.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut positions = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (n, _))| n.eq_ignore_ascii_case(name))
            .map(|(i, _)| i);

        if let Some(first) = positions.next() {
            let later: Vec<usize> = positions.collect();
            self.entries[first].1 = value;
            for i in later.into_iter().rev() {
                self.entries.remove(i);
            }
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Gets the first value for a header, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a header block (everything before the first blank line).
    ///
    /// Continuation lines (leading space or tab) are unfolded into the
    /// preceding header.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible to match the parsing
    /// surface of the sibling routines.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
            } else {
                if let Some((name, value)) = current.take() {
                    headers.add(name, value.trim().to_string());
                }
                if let Some((name, value)) = line.split_once(':') {
                    current = Some((name.trim().to_string(), value.trim().to_string()));
                }
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value.trim().to_string());
        }

        Ok(headers)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
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
    fn parse_preserves_order_and_case() {
        let headers = Headers::parse(
            "X-Oddpost-Class: prefs\r\nSubject: [prefs(v2.1) data]\r\nFrom: swa@example.com\r\n",
        )
        .unwrap();
        assert_eq!(
            headers.to_string(),
            "X-Oddpost-Class: prefs\r\nSubject: [prefs(v2.1) data]\r\nFrom: swa@example.com\r\n"
        );
    }

    #[test]
    fn get_is_case_insensitive() {
        let headers = Headers::parse("Content-Type: text/plain\r\n").unwrap();
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.get("subject"), None);
    }

    #[test]
    fn continuation_lines_unfold() {
        let headers =
            Headers::parse("Content-Type: text/plain;\r\n charset=utf-8\r\n").unwrap();
        assert_eq!(
            headers.get("content-type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut headers =
            Headers::parse("Subject: old\r\nContent-Transfer-Encoding: base64\r\n").unwrap();
        headers.set("content-transfer-encoding", "7bit");
        headers.set("MIME-Version", "1.0");
        assert_eq!(
            headers.to_string(),
            "Subject: old\r\nContent-Transfer-Encoding: 7bit\r\nMIME-Version: 1.0\r\n"
        );
    }

    #[test]
    fn set_removes_later_duplicates() {
        let mut headers = Headers::new();
        headers.add("Received", "a");
        headers.add("Subject", "one");
        headers.add("Subject", "two");
        headers.set("Subject", "final");
        assert_eq!(headers.to_string(), "Received: a\r\nSubject: final\r\n");
    }

    #[test]
    fn parse_stops_at_blank_line() {
        let headers = Headers::parse("Subject: x\r\n\r\nBody: not a header\r\n").unwrap();
        assert_eq!(headers.get("body"), None);
        assert_eq!(headers.get("subject"), Some("x"));
    }
}
