//! # prefsync-core
//!
//! Scan and synchronization logic for webmail preference emails.
//!
//! This crate provides:
//! - Folder scanning for the active preference email and duplicates
//! - The find, edit and replace protocol with staged deletion
//! - Rollback of the deletion flag when the replacement fails

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod scanner;
mod sync;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use scanner::{ScanResult, fetch_rfc822, scan};
pub use sync::{FieldEdit, SyncOutcome, synchronize};
