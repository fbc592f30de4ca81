//! # prefsync-prefs
//!
//! Preference document and message handling for webmail preference
//! synchronization.
//!
//! ## Features
//!
//! - **Document parsing**: Strict parse of the XML preference body
//! - **Fallback decode**: Recovery of base64 bodies delivered pre-split
//! - **Message round-trip**: Byte-faithful messages unless edited
//! - **Built-in template**: Default document for empty mailboxes
//!
//! ## Quick Start
//!
//! ```ignore
//! use prefsync_prefs::{ParseFallback, PreferenceEmail};
//!
//! let mut email = PreferenceEmail::from_bytes(uid, &raw)?;
//! email.document_mut(ParseFallback::Abort)?.set("locale", "de_DE");
//! let rewritten = email.to_bytes()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod document;
mod email;
pub mod encoding;
mod error;
mod headers;
mod template;

pub use document::{PreferenceDocument, PreferenceField};
pub use email::{ParseFallback, PreferenceEmail};
pub use error::{Error, Result};
pub use headers::Headers;
pub use template::DEFAULT_TEMPLATE;
