//! The narrow mailbox surface the synchronizer consumes.

use crate::Result;
use crate::fragment::Fragment;
use crate::types::{Flag, FlagOp, UidSet};

/// A connected, authenticated mailbox session.
///
/// Exactly the primitives the preference-replace protocol needs, in the
/// shape the wire delivers them: fetch-class calls return the raw
/// fragment sequence for the caller to reassemble. Calls are issued
/// strictly sequentially; implementations never see concurrent
/// operations on one session.
#[allow(async_fn_in_trait)] // single-threaded sequential use, no Send bound needed
pub trait MailSession {
    /// Selects a mailbox folder; returns the total message count.
    async fn select(&mut self, folder: &str) -> Result<u32>;

    /// Flushes any pending server-side state (CHECK).
    async fn check(&mut self) -> Result<()>;

    /// Fetches `items` for a sequence-number set, e.g. `1:*`.
    async fn fetch(&mut self, set: &str, items: &str) -> Result<Vec<Fragment>>;

    /// Fetches `items` for a UID set.
    async fn uid_fetch(&mut self, set: &UidSet, items: &str) -> Result<Vec<Fragment>>;

    /// Adds or removes a flag on a UID set.
    async fn uid_store(&mut self, set: &UidSet, op: FlagOp, flag: &Flag) -> Result<()>;

    /// Appends a message to a folder with the given flags.
    async fn append(&mut self, folder: &str, flags: &[Flag], message: &[u8]) -> Result<()>;

    /// Physically removes all messages flagged `\Deleted`.
    async fn expunge(&mut self) -> Result<()>;
}
