//! The preference document: an ordered list of named text fields
//! stored as a small XML body.
//!
//! ```text
//! <?xml version="1.0"?>
//! <preferences>
//!     <preference name="locale">en_US</preference>
//!     <preference name="newMailSound"/>
//! </preferences>
//! ```
//!
//! Parsing is strict; the split-base64 fallback for defective bodies
//! lives in [`PreferenceDocument::parse_fallback`].

use std::fmt::Write as _;

use tracing::warn;

use crate::encoding::{decode_base64, looks_like_encoded_unit};
use crate::error::{Error, Result};
use crate::template::DEFAULT_TEMPLATE;

/// One named field.
///
/// `value: None` round-trips as a self-closing element, which the
/// on-disk template distinguishes from an empty text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceField {
    /// Field name. Not guaranteed unique in a document.
    pub name: String,
    /// Field text, or `None` for a self-closing element.
    pub value: Option<String>,
}

/// An ordered collection of preference fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceDocument {
    fields: Vec<PreferenceField>,
}

impl PreferenceDocument {
    /// Parses a document body strictly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] naming the defect.
    pub fn parse(text: &str) -> Result<Self> {
        Parser::new(text).document()
    }

    /// Fallback parse for bodies whose base64 transfer encoding was
    /// delivered pre-split across multiple lines.
    ///
    /// Each non-empty line is decoded only if it looks like a complete
    /// encoded unit (see [`looks_like_encoded_unit`]); other lines
    /// pass through unchanged. The joined text is then parsed
    /// strictly.
    ///
    /// # Errors
    ///
    /// Returns an error if a line fails to decode or the joined text
    /// still does not parse.
    pub fn parse_fallback(raw_body: &str) -> Result<Self> {
        let mut joined = String::new();
        for line in raw_body.lines().filter(|l| !l.is_empty()) {
            if looks_like_encoded_unit(line) {
                joined.push_str(&String::from_utf8(decode_base64(line)?)?);
            } else {
                joined.push_str(line);
            }
        }
        Self::parse(&joined)
    }

    /// The built-in default document.
    ///
    /// # Panics
    ///
    /// Only if the built-in template constant fails to parse, which
    /// the test suite rules out.
    #[must_use]
    pub fn template() -> Self {
        #[allow(clippy::expect_used)]
        Self::parse(DEFAULT_TEMPLATE).expect("built-in template parses")
    }

    /// The fields, in document order.
    #[must_use]
    pub fn fields(&self) -> &[PreferenceField] {
        &self.fields
    }

    /// First value for a field name, flattening self-closing to `""`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_deref().unwrap_or_default())
    }

    /// Overwrites the first field with the given name.
    ///
    /// Missing fields are never created; the request is logged and
    /// dropped, and `false` is returned.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
            field.value = Some(value.to_string());
            true
        } else {
            warn!(
                name,
                value, "option not present in the preference document; edit dropped"
            );
            false
        }
    }

    /// Serializes the full field collection.
    ///
    /// Loss-free for every field that was not explicitly edited.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\"?>\n<preferences>\n");
        for field in &self.fields {
            let _ = write!(out, "    <preference name=\"{}\"", escape(&field.name));
            match &field.value {
                Some(value) => {
                    let _ = writeln!(out, ">{}</preference>", escape(value));
                }
                None => out.push_str("/>\n"),
            }
        }
        out.push_str("</preferences>\n");
        out
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else {
            return Err(Error::Parse(format!("unterminated entity in {rest:?}")));
        };
        match &rest[..=end] {
            "&amp;" => out.push('&'),
            "&lt;" => out.push('<'),
            "&gt;" => out.push('>'),
            "&quot;" => out.push('"'),
            "&apos;" => out.push('\''),
            other => return Err(Error::Parse(format!("unknown entity {other:?}"))),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Minimal strict parser for the preference body shape.
struct Parser<'a> {
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if let Some(rest) = self.rest.strip_prefix(prefix) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, prefix: &str) -> Result<()> {
        if self.eat(prefix) {
            Ok(())
        } else {
            Err(Error::Parse(format!(
                "expected {prefix:?} at {:?}",
                truncated(self.rest)
            )))
        }
    }

    fn take_until(&mut self, stop: char) -> Result<&'a str> {
        let pos = self.rest.find(stop).ok_or_else(|| {
            Error::Parse(format!("missing {stop:?} near {:?}", truncated(self.rest)))
        })?;
        let taken = &self.rest[..pos];
        self.rest = &self.rest[pos + stop.len_utf8()..];
        Ok(taken)
    }

    fn document(&mut self) -> Result<PreferenceDocument> {
        self.skip_ws();
        if self.eat("<?xml") {
            let decl = self.take_until('>')?;
            if !decl.ends_with('?') {
                return Err(Error::Parse("malformed XML declaration".to_string()));
            }
        }

        self.skip_ws();
        self.expect("<preferences")?;
        let root_tail = self.take_until('>')?;
        if root_tail.contains('<') {
            return Err(Error::Parse("malformed root element".to_string()));
        }

        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            if self.eat("</preferences") {
                self.expect(">")?;
                break;
            }
            fields.push(self.field()?);
        }

        self.skip_ws();
        if !self.rest.is_empty() {
            return Err(Error::Parse(format!(
                "trailing content after document: {:?}",
                truncated(self.rest)
            )));
        }

        Ok(PreferenceDocument { fields })
    }

    fn field(&mut self) -> Result<PreferenceField> {
        self.expect("<preference")?;

        self.skip_ws();
        self.expect("name=\"")?;
        let name = unescape(self.take_until('"')?)?;

        self.skip_ws();
        if self.eat("/>") {
            return Ok(PreferenceField { name, value: None });
        }

        self.expect(">")?;
        let text = self.take_until('<')?;
        self.expect("/preference")?;
        self.skip_ws();
        self.expect(">")?;

        Ok(PreferenceField {
            name,
            value: Some(unescape(text)?),
        })
    }
}

fn truncated(s: &str) -> String {
    s.chars().take(40).collect()
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
    use crate::encoding::encode_base64;
    use proptest::prelude::*;

    const SMALL: &str = "<?xml version=\"1.0\"?>\n<preferences>\n    \
        <preference name=\"locale\">en_US</preference>\n    \
        <preference name=\"newMailSound\"/>\n</preferences>\n";

    #[test]
    fn parse_small_document() {
        let doc = PreferenceDocument::parse(SMALL).unwrap();
        assert_eq!(doc.fields().len(), 2);
        assert_eq!(doc.get("locale"), Some("en_US"));
        assert_eq!(doc.get("newMailSound"), Some(""));
        assert_eq!(doc.fields()[1].value, None);
    }

    #[test]
    fn template_parses() {
        let doc = PreferenceDocument::template();
        assert_eq!(doc.get("locale"), Some("en_US"));
        assert_eq!(doc.get("workDayStart"), Some("480"));
        assert_eq!(doc.get("newMailSound"), Some(""));
        assert!(doc.fields().len() > 30);
    }

    #[test]
    fn serialize_then_parse_is_identity_on_fields() {
        let doc = PreferenceDocument::template();
        let reparsed = PreferenceDocument::parse(&doc.to_xml()).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn set_overwrites_first_occurrence_only() {
        let mut doc = PreferenceDocument::parse(
            "<preferences>\
             <preference name=\"a\">1</preference>\
             <preference name=\"a\">2</preference>\
             </preferences>",
        )
        .unwrap();
        assert!(doc.set("a", "changed"));
        assert_eq!(doc.fields()[0].value.as_deref(), Some("changed"));
        assert_eq!(doc.fields()[1].value.as_deref(), Some("2"));
    }

    #[test]
    fn set_missing_field_is_a_noop() {
        let mut doc = PreferenceDocument::template();
        let before = doc.clone();
        assert!(!doc.set("noSuchOption", "x"));
        assert_eq!(doc, before);
    }

    #[test]
    fn entity_escaping_round_trips() {
        let mut doc = PreferenceDocument::template();
        assert!(doc.set("signatureText", "a < b & \"c\" > 'd'"));
        let reparsed = PreferenceDocument::parse(&doc.to_xml()).unwrap();
        assert_eq!(reparsed.get("signatureText"), Some("a < b & \"c\" > 'd'"));
    }

    #[test]
    fn missing_declaration_is_accepted() {
        let doc = PreferenceDocument::parse(
            "<preferences><preference name=\"x\">1</preference></preferences>",
        )
        .unwrap();
        assert_eq!(doc.get("x"), Some("1"));
    }

    #[test]
    fn strict_parse_rejects_garbage() {
        assert!(PreferenceDocument::parse("not xml at all").is_err());
        assert!(PreferenceDocument::parse("<preferences>").is_err());
        assert!(
            PreferenceDocument::parse("<preferences></preferences>trailing").is_err()
        );
        assert!(
            PreferenceDocument::parse(
                "<preferences><preference>no name</preference></preferences>"
            )
            .is_err()
        );
    }

    #[test]
    fn unknown_entity_is_rejected() {
        assert!(
            PreferenceDocument::parse(
                "<preferences><preference name=\"x\">&nbsp;</preference></preferences>"
            )
            .is_err()
        );
    }

    #[test]
    fn fallback_decodes_split_base64() {
        // The defective shape: the encoded body was split so that the
        // standard decoder cannot reassemble it. Lines ending in `==`
        // decode in isolation; others pass through as-is.
        let logical = PreferenceDocument::template().to_xml();
        // A head length of 3n+1 bytes encodes with `==` padding, which
        // is what marks the line as decodable in isolation.
        let mut split = logical.len() / 2;
        while split % 3 != 1 {
            split += 1;
        }
        let (head, tail) = logical.split_at(split);

        let mut body = encode_base64(head.as_bytes());
        body.push('\n');
        body.push_str(tail);
        body.push('\n');

        let doc = PreferenceDocument::parse_fallback(&body).unwrap();
        assert_eq!(doc, PreferenceDocument::parse(&logical).unwrap());
    }

    #[test]
    fn fallback_failure_is_reported() {
        assert!(PreferenceDocument::parse_fallback("still not xml").is_err());
    }

    proptest! {
        #[test]
        fn field_round_trip(
            values in proptest::collection::vec("[a-zA-Z0-9<>&\"' /=_.,-]{0,30}", 1..10)
        ) {
            let fields = values
                .iter()
                .enumerate()
                .map(|(i, v)| PreferenceField {
                    name: format!("field{i}"),
                    value: Some(v.clone()),
                })
                .collect::<Vec<_>>();
            let doc = PreferenceDocument { fields };
            let reparsed = PreferenceDocument::parse(&doc.to_xml()).unwrap();
            prop_assert_eq!(doc, reparsed);
        }
    }
}
