//! Response fragments and logical-line reassembly.
//!
//! A fetch or search reply arrives as an ordered sequence of fragments:
//! plain text segments, or text segments that end in a `{n}` size token
//! followed by an n-byte literal payload. One requested item can be
//! split across several fragments; [`Reassembler`] rebuilds the
//! original one-record-per-item correspondence.

use crate::{Error, Result};

/// One element of a raw command reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A plain text segment (CRLF already stripped).
    Text(Vec<u8>),
    /// A text segment ending in a `{n}` size token, plus the n-byte
    /// payload the server transmitted after it.
    Literal {
        /// Text up to and including the size token.
        text: Vec<u8>,
        /// The announced payload.
        payload: Vec<u8>,
    },
}

impl Fragment {
    /// Creates a plain text fragment.
    #[must_use]
    pub fn text(text: impl Into<Vec<u8>>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a fragment carrying a literal payload.
    #[must_use]
    pub fn literal(text: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self::Literal {
            text: text.into(),
            payload: payload.into(),
        }
    }
}

/// One reassembled protocol record.
///
/// `text` is the joined fragment text with size tokens left in place;
/// `literals` holds the detached payloads in announcement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalLine {
    /// Joined record text.
    pub text: Vec<u8>,
    /// Literal payloads, in the order their size tokens appear.
    pub literals: Vec<Vec<u8>>,
}

impl LogicalLine {
    /// Returns the literal whose length matches the `item {n}`
    /// announcement in the line text.
    ///
    /// Only an exact length match is accepted; handing back a
    /// mismatched literal would graft one message's body onto
    /// another's metadata.
    ///
    /// # Errors
    ///
    /// [`Error::NoAnnouncement`] if the line carries no `item {n}`
    /// token, [`Error::LiteralNotFound`] if no attachment has the
    /// announced length. Both are recoverable; callers log and skip.
    pub fn literal_for(&self, item: &str) -> Result<&[u8]> {
        let Some(announced) = self.announced_size(item) else {
            return Err(Error::NoAnnouncement {
                item: item.to_string(),
                line: String::from_utf8_lossy(&self.text).into_owned(),
            });
        };

        self.literals
            .iter()
            .find(|lit| lit.len() == announced)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::LiteralNotFound {
                announced,
                line: String::from_utf8_lossy(&self.text).into_owned(),
            })
    }

    /// Parses the byte count from the first `item {n}` announcement.
    #[must_use]
    pub fn announced_size(&self, item: &str) -> Option<usize> {
        let start = find(&self.text, item.as_bytes())?;
        let mut rest = &self.text[start + item.len()..];

        // At least one blank between the token and the brace.
        let blanks = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if blanks == 0 {
            return None;
        }
        rest = &rest[blanks..];

        if rest.first() != Some(&b'{') {
            return None;
        }
        let close = rest.iter().position(|&b| b == b'}')?;
        std::str::from_utf8(&rest[1..close]).ok()?.parse().ok()
    }

    /// Parses the number following `token`, e.g. `UID 444`.
    #[must_use]
    pub fn number_after(&self, token: &str) -> Option<u32> {
        let start = find(&self.text, token.as_bytes())?;
        let rest = &self.text[start + token.len()..];
        let blanks = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if blanks == 0 {
            return None;
        }
        let digits: Vec<u8> = rest[blanks..]
            .iter()
            .copied()
            .take_while(u8::is_ascii_digit)
            .collect();
        std::str::from_utf8(&digits).ok()?.parse().ok()
    }

    /// Searches the record text and every literal payload for `needle`.
    ///
    /// Covers servers that ship an envelope field as a literal instead
    /// of a quoted string.
    #[must_use]
    pub fn contains(&self, needle: &[u8]) -> bool {
        find(&self.text, needle).is_some()
            || self.literals.iter().any(|lit| find(lit, needle).is_some())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Lazily reassembles a fragment stream into logical lines.
///
/// A record is complete at a fragment boundary once the parenthesized
/// group opened by its leading token has closed. Depth is tracked
/// quote-aware so parens inside quoted strings do not end a record
/// early. A stream that ends mid-record yields [`Error::Incomplete`]
/// rather than a silent partial line.
pub struct Reassembler<I> {
    fragments: I,
    line: LogicalLine,
    consumed: usize,
    depth: usize,
    in_quote: bool,
    escaped: bool,
}

impl<I> Reassembler<I>
where
    I: Iterator<Item = Fragment>,
{
    /// Creates a reassembler over a fragment iterator.
    pub fn new(fragments: I) -> Self {
        Self {
            fragments,
            line: LogicalLine::default(),
            consumed: 0,
            depth: 0,
            in_quote: false,
            escaped: false,
        }
    }

    fn scan(&mut self, text: &[u8]) {
        for &b in text {
            if self.escaped {
                self.escaped = false;
                continue;
            }
            match b {
                b'\\' if self.in_quote => self.escaped = true,
                b'"' => self.in_quote = !self.in_quote,
                b'(' if !self.in_quote => self.depth += 1,
                b')' if !self.in_quote => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
    }

    fn push(&mut self, fragment: Fragment) {
        match fragment {
            Fragment::Text(text) => {
                self.scan(&text);
                self.line.text.extend_from_slice(&text);
            }
            Fragment::Literal { text, payload } => {
                self.scan(&text);
                self.line.text.extend_from_slice(&text);
                self.line.literals.push(payload);
            }
        }
        self.consumed += 1;
    }

    fn take_line(&mut self) -> LogicalLine {
        self.consumed = 0;
        self.in_quote = false;
        self.escaped = false;
        std::mem::take(&mut self.line)
    }

    fn pending(&self) -> bool {
        !self.line.text.is_empty() || !self.line.literals.is_empty()
    }
}

impl<I> Iterator for Reassembler<I>
where
    I: Iterator<Item = Fragment>,
{
    type Item = Result<LogicalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(fragment) = self.fragments.next() else {
                if self.pending() {
                    // Snapshot before take_line resets the counter.
                    let consumed = self.consumed;
                    let line = self.take_line();
                    return Some(Err(Error::Incomplete {
                        consumed,
                        pending: String::from_utf8_lossy(&line.text).into_owned(),
                    }));
                }
                return None;
            };

            self.push(fragment);
            if self.depth == 0 && self.pending() {
                return Some(Ok(self.take_line()));
            }
        }
    }
}

/// Reassembles a fragment sequence into logical lines eagerly.
///
/// # Errors
///
/// Returns [`Error::Incomplete`] if the sequence ends mid-record.
pub fn reassemble(fragments: Vec<Fragment>) -> Result<Vec<LogicalLine>> {
    Reassembler::new(fragments.into_iter()).collect()
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
    use proptest::prelude::*;

    #[test]
    fn single_fragment_record() {
        let lines = reassemble(vec![Fragment::text(b"1 (FLAGS (\\Seen) UID 4)".to_vec())]).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, b"1 (FLAGS (\\Seen) UID 4)");
        assert!(lines[0].literals.is_empty());
    }

    #[test]
    fn literal_split_record() {
        let lines = reassemble(vec![
            Fragment::literal(b"1 (UID 444 RFC822 {6}".to_vec(), b"abcdef".to_vec()),
            Fragment::text(b")".to_vec()),
        ])
        .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, b"1 (UID 444 RFC822 {6})");
        assert_eq!(lines[0].literals, vec![b"abcdef".to_vec()]);
    }

    #[test]
    fn multiple_records() {
        let lines = reassemble(vec![
            Fragment::literal(b"1 (UID 4 RFC822 {3}".to_vec(), b"aaa".to_vec()),
            Fragment::text(b")".to_vec()),
            Fragment::text(b"2 (UID 5 FLAGS (\\Deleted))".to_vec()),
        ])
        .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number_after("UID"), Some(4));
        assert_eq!(lines[1].number_after("UID"), Some(5));
    }

    #[test]
    fn two_literals_one_record() {
        let lines = reassemble(vec![
            Fragment::literal(b"1 (UID 9 HEADER {4}".to_vec(), b"hhhh".to_vec()),
            Fragment::literal(b" TEXT {2}".to_vec(), b"tt".to_vec()),
            Fragment::text(b")".to_vec()),
        ])
        .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].literals.len(), 2);
        assert_eq!(lines[0].literal_for("HEADER").unwrap(), b"hhhh");
        assert_eq!(lines[0].literal_for("TEXT").unwrap(), b"tt");
    }

    #[test]
    fn parens_inside_quoted_strings_do_not_close() {
        let lines = reassemble(vec![
            Fragment::text(b"1 (ENVELOPE (\"a ) b\" \"c\")".to_vec()),
            Fragment::text(b" FLAGS (\\Seen))".to_vec()),
        ])
        .unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn escaped_quote_inside_string() {
        let lines = reassemble(vec![Fragment::text(
            b"1 (ENVELOPE (\"he said \\\") ok\") UID 2)".to_vec(),
        )])
        .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].number_after("UID"), Some(2));
    }

    #[test]
    fn unparenthesized_line_is_its_own_record() {
        let lines = reassemble(vec![
            Fragment::text(b"* 3 EXISTS".to_vec()),
            Fragment::text(b"1 (UID 7)".to_vec()),
        ])
        .unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let err = reassemble(vec![Fragment::literal(
            b"1 (UID 4 RFC822 {3}".to_vec(),
            b"aaa".to_vec(),
        )])
        .unwrap_err();
        assert!(matches!(err, Error::Incomplete { consumed: 1, .. }));
    }

    #[test]
    fn truncation_error_counts_every_consumed_fragment() {
        let err = reassemble(vec![
            Fragment::literal(b"1 (UID 4 RFC822 {3}".to_vec(), b"aaa".to_vec()),
            Fragment::text(b" FLAGS (\\Seen)".to_vec()),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Incomplete { consumed: 2, .. }));
    }

    #[test]
    fn empty_stream_yields_nothing() {
        assert!(reassemble(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn fragmentation_invariant() {
        // A record delivered whole and the same record split at its
        // literal boundary must reassemble identically.
        let whole = reassemble(vec![
            Fragment::literal(b"1 (UID 4 RFC822 {5}".to_vec(), b"hello".to_vec()),
            Fragment::text(b" FLAGS (\\Seen))".to_vec()),
        ])
        .unwrap();
        let split = reassemble(vec![
            Fragment::literal(b"1 (UID 4 RFC822 {5}".to_vec(), b"hello".to_vec()),
            Fragment::text(b" FLAGS ".to_vec()),
            Fragment::text(b"(\\Seen))".to_vec()),
        ])
        .unwrap();
        assert_eq!(whole, split);
    }

    #[test]
    fn locator_exact_match_only() {
        let line = LogicalLine {
            text: b"1 (UID 4 RFC822 {4})".to_vec(),
            literals: vec![b"abc".to_vec(), b"abcde".to_vec()],
        };
        assert!(matches!(
            line.literal_for("RFC822"),
            Err(Error::LiteralNotFound { announced: 4, .. })
        ));
    }

    #[test]
    fn locator_ignores_attachment_order() {
        let line = LogicalLine {
            text: b"1 (UID 4 RFC822 {4})".to_vec(),
            literals: vec![b"xx".to_vec(), b"yyyy".to_vec(), b"z".to_vec()],
        };
        assert_eq!(line.literal_for("RFC822").unwrap(), b"yyyy");
    }

    #[test]
    fn locator_missing_announcement() {
        let line = LogicalLine {
            text: b"1 (UID 4 FLAGS (\\Seen))".to_vec(),
            literals: vec![b"abc".to_vec()],
        };
        assert!(matches!(
            line.literal_for("RFC822"),
            Err(Error::NoAnnouncement { .. })
        ));
    }

    #[test]
    fn number_after_token() {
        let line = LogicalLine {
            text: b"1 (UID 444 RFC822 {6868})".to_vec(),
            literals: Vec::new(),
        };
        assert_eq!(line.number_after("UID"), Some(444));
        assert_eq!(line.announced_size("RFC822"), Some(6868));
        assert_eq!(line.number_after("MODSEQ"), None);
    }

    #[test]
    fn contains_searches_literals_too() {
        let line = LogicalLine {
            text: b"1 (UID 4 ENVELOPE (\"date\" {18})".to_vec(),
            literals: vec![b"[prefs(v2.1) data]".to_vec()],
        };
        assert!(line.contains(b"[prefs(v2.1) data]"));
        assert!(!line.contains(b"absent"));
    }

    proptest! {
        #[test]
        fn random_literal_payloads_reassemble(
            payloads in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 1..64),
                1..4,
            )
        ) {
            let mut fragments = Vec::new();
            let mut head = b"1 (UID 4".to_vec();
            for (i, payload) in payloads.iter().enumerate() {
                head.extend_from_slice(
                    format!(" ITEM{i} {{{}}}", payload.len()).as_bytes(),
                );
                fragments.push(Fragment::literal(
                    std::mem::take(&mut head),
                    payload.clone(),
                ));
            }
            fragments.push(Fragment::text(b")".to_vec()));

            let lines = reassemble(fragments).unwrap();
            prop_assert_eq!(lines.len(), 1);
            prop_assert_eq!(lines[0].literals.len(), payloads.len());
            for (i, payload) in payloads.iter().enumerate() {
                let found = lines[0].literal_for(&format!("ITEM{i}")).unwrap();
                // First length match wins; it always has the announced size.
                prop_assert_eq!(found.len(), payload.len());
            }
        }
    }
}
