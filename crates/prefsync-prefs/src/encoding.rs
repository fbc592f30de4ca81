//! Transfer-encoding helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Result;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Base64 leniently, stripping interior whitespace first.
///
/// # Errors
///
/// Returns an error if the cleaned input is not valid Base64.
pub fn decode_base64_lenient(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    decode_base64(&cleaned)
}

/// Whether a body line looks like one complete Base64 unit on its own.
///
/// Pre-split transfer-encoded bodies carry some lines that decode in
/// isolation (they end with `==` padding or a `+` byte) and some that
/// are already plain text. A lone `=` pad is not treated as evidence;
/// only the unambiguous endings qualify.
#[must_use]
pub fn looks_like_encoded_unit(line: &str) -> bool {
    line.ends_with("==") || line.as_bytes().last() == Some(&b'+')
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
    fn base64_round_trip() {
        let encoded = encode_base64(b"Hello, World!");
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64(&encoded).unwrap(), b"Hello, World!");
    }

    #[test]
    fn lenient_decode_strips_whitespace() {
        let decoded = decode_base64_lenient("SGVsbG8s\r\nIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn encoded_unit_heuristic() {
        assert!(looks_like_encoded_unit("PHByZWZlcmVuY2VzPg=="));
        assert!(looks_like_encoded_unit("abc+"));
        assert!(!looks_like_encoded_unit("<preferences>"));
        // A single padding byte does not qualify.
        assert!(!looks_like_encoded_unit("YWJjZGU="));
    }
}
