//! # prefsync-imap
//!
//! Minimal IMAP wire layer for the prefsync preference synchronizer.
//!
//! The heart of the crate is the fragment model: fetch-class replies
//! arrive as text segments interleaved with `{n}`-announced literal
//! payloads, and [`Reassembler`] rebuilds the one-record-per-item
//! correspondence the transport split apart. [`LogicalLine`] then
//! locates the authoritative payload for a size announcement by exact
//! length match.
//!
//! The [`MailSession`] trait is the narrow surface the synchronizer
//! consumes; [`Client`] implements it over any async transport.
//!
//! ```ignore
//! use prefsync_imap::{Client, MailSession, reassemble, connect_tls};
//!
//! let stream = connect_tls("mail.example.com", 993).await?;
//! let mut client = Client::connect(stream).await?;
//! client.login("admin", "secret").await?;
//!
//! let count = client.select("INBOX").await?;
//! let fragments = client.fetch("1:*", "(UID ENVELOPE FLAGS)").await?;
//! for line in reassemble(fragments)? {
//!     println!("{}", String::from_utf8_lossy(&line.text));
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
mod error;
mod framed;
mod fragment;
mod session;
pub mod stream;
mod types;

pub use client::Client;
pub use error::{Error, Result};
pub use fragment::{Fragment, LogicalLine, Reassembler, reassemble};
pub use framed::FramedStream;
pub use session::MailSession;
pub use stream::{ImapStream, connect_plain, connect_tls};
pub use types::{Flag, FlagOp, UidSet};
