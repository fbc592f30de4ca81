//! A preference email: the message wrapper around a
//! [`PreferenceDocument`], round-tripped byte-faithfully unless the
//! body is edited.

use tracing::warn;

use crate::document::PreferenceDocument;
use crate::encoding::{decode_base64_lenient, encode_base64};
use crate::error::{Error, Result};
use crate::headers::Headers;

/// Maximum length of a base64 body line when re-encoding.
const ENCODED_LINE_LENGTH: usize = 76;

/// Policy for a body that parses neither strictly nor through the
/// split-base64 fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseFallback {
    /// Refuse to proceed. The stored document is never replaced.
    #[default]
    Abort,
    /// Replace the unusable body with the built-in template.
    UseTemplate,
}

/// A preference message fetched from (or destined for) the mailbox.
///
/// The raw message is kept verbatim; the parsed document and a dirty
/// flag track edits. Serializing an unedited message returns the
/// original bytes unchanged.
#[derive(Debug, Clone)]
pub struct PreferenceEmail {
    uid: u32,
    headers: Headers,
    raw: Vec<u8>,
    body: Vec<u8>,
    parsed: Option<PreferenceDocument>,
    dirty: bool,
}

impl PreferenceEmail {
    /// Wraps a raw RFC822 message.
    ///
    /// The body is not parsed yet; see [`Self::document`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBody`] if the message has no header
    /// and body separator.
    pub fn from_bytes(uid: u32, data: &[u8]) -> Result<Self> {
        let (head, body) = split_message(data).ok_or(Error::MissingBody)?;
        let headers = Headers::parse(&String::from_utf8_lossy(head))?;
        Ok(Self {
            uid,
            headers,
            raw: data.to_vec(),
            body: body.to_vec(),
            parsed: None,
            dirty: false,
        })
    }

    /// Builds a fresh message around the built-in template.
    ///
    /// The result is not persisted yet; its UID is zero.
    #[must_use]
    pub fn from_template(subject_marker: &str, from_address: &str) -> Self {
        let mut headers = Headers::new();
        headers.add("X-Oddpost-Class", "prefs");
        headers.add("Subject", subject_marker);
        headers.add("From", from_address);
        headers.add("MIME-Version", "1.0");
        headers.add("Content-Type", "text/plain; charset=\"utf-8\"");
        headers.add("Content-Transfer-Encoding", "base64");
        Self {
            uid: 0,
            headers,
            raw: Vec::new(),
            body: Vec::new(),
            parsed: Some(PreferenceDocument::template()),
            dirty: true,
        }
    }

    /// Message UID in the selected folder, or zero if the message has
    /// never been stored.
    #[must_use]
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Whether the document was edited since the message was read.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Message headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Read access to the preference document, parsing the body on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unusable`] if the body cannot be parsed and
    /// `fallback` is [`ParseFallback::Abort`].
    pub fn document(&mut self, fallback: ParseFallback) -> Result<&PreferenceDocument> {
        self.ensure_parsed(fallback)?;
        #[allow(clippy::expect_used)]
        Ok(self.parsed.as_ref().expect("parsed above"))
    }

    /// Mutable access to the preference document, marking the message
    /// dirty.
    ///
    /// # Errors
    ///
    /// Same as [`Self::document`].
    pub fn document_mut(
        &mut self,
        fallback: ParseFallback,
    ) -> Result<&mut PreferenceDocument> {
        self.ensure_parsed(fallback)?;
        self.dirty = true;
        #[allow(clippy::expect_used)]
        Ok(self.parsed.as_mut().expect("parsed above"))
    }

    fn ensure_parsed(&mut self, fallback: ParseFallback) -> Result<()> {
        if self.parsed.is_some() {
            return Ok(());
        }
        match self.parse_body() {
            Ok(document) => {
                self.parsed = Some(document);
                Ok(())
            }
            Err(err) if fallback == ParseFallback::UseTemplate => {
                warn!(
                    uid = self.uid,
                    %err,
                    "replacing unusable preference body with the template"
                );
                self.parsed = Some(PreferenceDocument::template());
                self.dirty = true;
                Ok(())
            }
            Err(err) => Err(Error::Unusable(err.to_string())),
        }
    }

    /// Strict parse first; if the body does not decode or parse as a
    /// whole, retry through the split-base64 line fallback.
    fn parse_body(&self) -> Result<PreferenceDocument> {
        match self.decoded_body() {
            Ok(text) => match PreferenceDocument::parse(&text) {
                Ok(document) => Ok(document),
                Err(_) => PreferenceDocument::parse_fallback(&self.raw_body_text()),
            },
            Err(_) => PreferenceDocument::parse_fallback(&self.raw_body_text()),
        }
    }

    /// Body with the transfer encoding removed.
    fn decoded_body(&self) -> Result<String> {
        let encoding = self
            .headers
            .get("Content-Transfer-Encoding")
            .unwrap_or("7bit")
            .trim()
            .to_ascii_lowercase();
        match encoding.as_str() {
            "base64" => {
                let text = std::str::from_utf8(&self.body)
                    .map_err(|e| Error::InvalidEncoding(e.to_string()))?;
                Ok(String::from_utf8(decode_base64_lenient(text)?)?)
            }
            "7bit" | "8bit" | "binary" => Ok(String::from_utf8(self.body.clone())?),
            other => Err(Error::InvalidEncoding(other.to_string())),
        }
    }

    fn raw_body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Serializes the message.
    ///
    /// Unedited messages come back byte-identical. Edited ones get a
    /// freshly encoded body and normalized content headers; all other
    /// headers keep their order and spelling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBody`] when the document was never
    /// parsed and the message holds no raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.dirty && !self.raw.is_empty() {
            return Ok(self.raw.clone());
        }
        let document = self.parsed.as_ref().ok_or(Error::MissingBody)?;

        let mut headers = self.headers.clone();
        headers.set("MIME-Version", "1.0");
        headers.set("Content-Type", "text/plain; charset=\"utf-8\"");
        headers.set("Content-Transfer-Encoding", "base64");

        let mut out = headers.to_string().into_bytes();
        out.extend_from_slice(b"\r\n");
        let encoded = encode_base64(document.to_xml().as_bytes());
        for chunk in encoded.as_bytes().chunks(ENCODED_LINE_LENGTH) {
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        Ok(out)
    }
}

/// Splits a message into its header block and body at the first blank
/// line, handling both CRLF and bare LF separators.
fn split_message(data: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(pos) = find(data, b"\r\n\r\n") {
        return Some((&data[..pos], &data[pos + 4..]));
    }
    find(data, b"\n\n").map(|pos| (&data[..pos], &data[pos + 2..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
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

    fn plain_message(body: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"X-Oddpost-Class: prefs\r\n");
        out.extend_from_slice(b"Subject: [prefs(v2.1) data]\r\n");
        out.extend_from_slice(b"From: swa@scalix.com\r\n");
        out.extend_from_slice(b"Content-Type: text/plain; charset=\"utf-8\"\r\n");
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body.as_bytes());
        out
    }

    fn base64_message(body: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"Subject: [prefs(v2.1) data]\r\n");
        out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n");
        out.extend_from_slice(b"\r\n");
        for chunk in encode_base64(body.as_bytes()).as_bytes().chunks(76) {
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    #[test]
    fn plain_body_parses() {
        let raw = plain_message(&PreferenceDocument::template().to_xml());
        let mut email = PreferenceEmail::from_bytes(7, &raw).unwrap();
        assert_eq!(email.uid(), 7);
        let doc = email.document(ParseFallback::Abort).unwrap();
        assert_eq!(doc.get("locale"), Some("en_US"));
        assert!(!email.is_dirty());
    }

    #[test]
    fn base64_body_parses() {
        let raw = base64_message(&PreferenceDocument::template().to_xml());
        let mut email = PreferenceEmail::from_bytes(3, &raw).unwrap();
        let doc = email.document(ParseFallback::Abort).unwrap();
        assert_eq!(doc.get("workDayStart"), Some("480"));
    }

    #[test]
    fn unedited_message_round_trips_verbatim() {
        let raw = plain_message(&PreferenceDocument::template().to_xml());
        let mut email = PreferenceEmail::from_bytes(1, &raw).unwrap();
        email.document(ParseFallback::Abort).unwrap();
        assert_eq!(email.to_bytes().unwrap(), raw);
    }

    #[test]
    fn edit_rewrites_body_and_keeps_extra_headers() {
        let mut raw = b"Received: from somewhere\r\n".to_vec();
        raw.extend_from_slice(&plain_message(&PreferenceDocument::template().to_xml()));

        let mut email = PreferenceEmail::from_bytes(1, &raw).unwrap();
        email
            .document_mut(ParseFallback::Abort)
            .unwrap()
            .set("locale", "de_DE");
        assert!(email.is_dirty());

        let bytes = email.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("Received: from somewhere\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: base64\r\n"));

        let mut reread = PreferenceEmail::from_bytes(1, &bytes).unwrap();
        let doc = reread.document(ParseFallback::Abort).unwrap();
        assert_eq!(doc.get("locale"), Some("de_DE"));
    }

    #[test]
    fn reencoded_body_lines_stay_short() {
        let email = PreferenceEmail::from_template("[prefs(v2.1) data]", "swa@scalix.com");
        let bytes = email.to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let body = text.split_once("\r\n\r\n").unwrap().1;
        assert!(body.lines().all(|l| l.len() <= ENCODED_LINE_LENGTH));
    }

    #[test]
    fn split_base64_body_parses_through_fallback() {
        // A body whose base64 was encoded per line, which a whole-body
        // decode cannot handle.
        let logical = PreferenceDocument::template().to_xml();
        let mut split = logical.len() / 2;
        while split % 3 != 1 {
            split += 1;
        }
        let (head, tail) = logical.split_at(split);

        let mut raw = b"Content-Transfer-Encoding: base64\r\n\r\n".to_vec();
        raw.extend_from_slice(encode_base64(head.as_bytes()).as_bytes());
        raw.extend_from_slice(b"\r\n");
        raw.extend_from_slice(tail.as_bytes());
        raw.extend_from_slice(b"\r\n");

        let mut email = PreferenceEmail::from_bytes(2, &raw).unwrap();
        let doc = email.document(ParseFallback::Abort).unwrap();
        assert_eq!(doc.get("locale"), Some("en_US"));
    }

    #[test]
    fn unusable_body_aborts_by_default() {
        let raw = plain_message("this is not a preference document");
        let mut email = PreferenceEmail::from_bytes(4, &raw).unwrap();
        let err = email.document(ParseFallback::Abort).unwrap_err();
        assert!(matches!(err, Error::Unusable(_)));
    }

    #[test]
    fn unusable_body_can_fall_back_to_template() {
        let raw = plain_message("this is not a preference document");
        let mut email = PreferenceEmail::from_bytes(4, &raw).unwrap();
        let doc = email.document(ParseFallback::UseTemplate).unwrap();
        assert_eq!(doc.get("locale"), Some("en_US"));
        assert!(email.is_dirty());
    }

    #[test]
    fn template_message_carries_marker_headers() {
        let email = PreferenceEmail::from_template("[prefs(v2.1) data]", "swa@scalix.com");
        assert_eq!(email.uid(), 0);
        assert_eq!(email.headers().get("X-Oddpost-Class"), Some("prefs"));
        assert_eq!(email.headers().get("Subject"), Some("[prefs(v2.1) data]"));
        assert_eq!(email.headers().get("From"), Some("swa@scalix.com"));
    }

    #[test]
    fn message_without_body_separator_is_rejected() {
        let err = PreferenceEmail::from_bytes(1, b"Subject: x\r\n").unwrap_err();
        assert!(matches!(err, Error::MissingBody));
    }
}
