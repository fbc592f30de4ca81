//! Wire client: one tagged command per call, replies collected as
//! fragments until the tagged completion line.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use crate::command::{self, TagGenerator};
use crate::framed::FramedStream;
use crate::fragment::Fragment;
use crate::session::MailSession;
use crate::types::{Flag, FlagOp, UidSet};
use crate::{Error, Result};

/// A connected IMAP client.
///
/// Created over any async transport (see [`crate::stream`]); becomes a
/// usable [`MailSession`] after [`Client::login`].
pub struct Client<S> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    internal_date: fn() -> String,
}

/// Outcome of one tagged command.
struct Reply {
    fragments: Vec<Fragment>,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a transport and consumes the server greeting.
    ///
    /// # Errors
    ///
    /// Fails if the greeting is missing or announces a rejection.
    pub async fn connect(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.read_line().await?;
        debug!(greeting = %String::from_utf8_lossy(&greeting), "server greeting");

        if !(greeting.starts_with(b"* OK") || greeting.starts_with(b"* PREAUTH")) {
            return Err(Error::Protocol(format!(
                "unexpected greeting: {}",
                String::from_utf8_lossy(&greeting)
            )));
        }

        Ok(Self {
            stream: framed,
            tags: TagGenerator::default(),
            internal_date: internal_date_now,
        })
    }

    /// Overrides the APPEND internal-date source, for deterministic
    /// tests.
    pub fn set_internal_date_source(&mut self, source: fn() -> String) {
        self.internal_date = source;
    }

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials.
    pub async fn login(&mut self, user: &str, pass: &str) -> Result<()> {
        let tag = self.tags.next();
        let cmd = command::login(&tag, user, pass);
        match self.run(&tag, &cmd).await {
            Ok(_) => Ok(()),
            Err(Error::No(msg) | Error::Bad(msg)) => Err(Error::Auth(msg)),
            Err(e) => Err(e),
        }
    }

    /// Gracefully disconnects.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next();
        let cmd = command::logout(&tag);
        let _ = self.run(&tag, &cmd).await;
        Ok(())
    }

    /// Writes one command and collects reply fragments until the
    /// tagged completion line.
    async fn run(&mut self, tag: &str, cmd: &[u8]) -> Result<Reply> {
        trace!(command = %String::from_utf8_lossy(cmd).trim_end(), "send");
        self.stream.write_command(cmd).await?;
        self.collect(tag).await
    }

    async fn collect(&mut self, tag: &str) -> Result<Reply> {
        let mut fragments = Vec::new();

        loop {
            let fragment = self.stream.read_fragment().await?;

            if let Fragment::Text(line) = &fragment {
                if let Some(status) = tagged_status(line, tag) {
                    return match status {
                        Status::Ok => Ok(Reply { fragments }),
                        Status::No(msg) => Err(Error::No(msg)),
                        Status::Bad(msg) => Err(Error::Bad(msg)),
                    };
                }
                if line.starts_with(b"* BYE") {
                    return Err(Error::Protocol(format!(
                        "server disconnecting: {}",
                        String::from_utf8_lossy(line)
                    )));
                }
            }

            fragments.push(fragment);
        }
    }
}

enum Status {
    Ok,
    No(String),
    Bad(String),
}

/// Parses `TAG OK|NO|BAD text` lines; returns None for untagged lines.
fn tagged_status(line: &[u8], tag: &str) -> Option<Status> {
    let rest = line.strip_prefix(tag.as_bytes())?.strip_prefix(b" ")?;
    let msg = |prefix: &[u8]| {
        String::from_utf8_lossy(rest.get(prefix.len()..).unwrap_or_default())
            .trim()
            .to_string()
    };
    if rest.starts_with(b"OK") {
        Some(Status::Ok)
    } else if rest.starts_with(b"NO") {
        Some(Status::No(msg(b"NO")))
    } else if rest.starts_with(b"BAD") {
        Some(Status::Bad(msg(b"BAD")))
    } else {
        None
    }
}

/// Parses an `* n EXISTS` line.
fn parse_exists(line: &[u8]) -> Option<u32> {
    let rest = line.strip_prefix(b"* ")?.strip_suffix(b" EXISTS")?;
    std::str::from_utf8(rest).ok()?.parse().ok()
}

/// Internal date string for APPEND, e.g. `30-Aug-2026 12:00:00 +0000`.
fn internal_date_now() -> String {
    chrono::Local::now().format("%d-%b-%Y %H:%M:%S %z").to_string()
}

impl<S> MailSession for Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn select(&mut self, folder: &str) -> Result<u32> {
        let tag = self.tags.next();
        let cmd = command::select(&tag, folder);
        let reply = self.run(&tag, &cmd).await?;

        for fragment in &reply.fragments {
            if let Fragment::Text(line) = fragment {
                if let Some(count) = parse_exists(line) {
                    debug!(folder, count, "selected");
                    return Ok(count);
                }
            }
        }
        Err(Error::Protocol(format!(
            "SELECT {folder} reply carried no EXISTS count"
        )))
    }

    async fn check(&mut self) -> Result<()> {
        let tag = self.tags.next();
        let cmd = command::check(&tag);
        self.run(&tag, &cmd).await?;
        Ok(())
    }

    async fn fetch(&mut self, set: &str, items: &str) -> Result<Vec<Fragment>> {
        let tag = self.tags.next();
        let cmd = command::fetch(&tag, set, items, false);
        Ok(self.run(&tag, &cmd).await?.fragments)
    }

    async fn uid_fetch(&mut self, set: &UidSet, items: &str) -> Result<Vec<Fragment>> {
        let tag = self.tags.next();
        let cmd = command::fetch(&tag, &set.to_string(), items, true);
        Ok(self.run(&tag, &cmd).await?.fragments)
    }

    async fn uid_store(&mut self, set: &UidSet, op: FlagOp, flag: &Flag) -> Result<()> {
        let tag = self.tags.next();
        let cmd = command::uid_store(&tag, set, op, flag);
        self.run(&tag, &cmd).await?;
        Ok(())
    }

    async fn append(&mut self, folder: &str, flags: &[Flag], message: &[u8]) -> Result<()> {
        let tag = self.tags.next();
        let date = (self.internal_date)();
        let cmd = command::append(&tag, folder, flags, &date, message.len());
        self.stream.write_command(&cmd).await?;

        // Wait for the continuation before sending the literal; the
        // server may refuse with a tagged NO instead.
        loop {
            let line = self.stream.read_line().await?;
            if line.starts_with(b"+") {
                break;
            }
            if let Some(status) = tagged_status(&line, &tag) {
                return match status {
                    Status::Ok => Err(Error::Protocol(
                        "APPEND completed before the literal was sent".to_string(),
                    )),
                    Status::No(msg) => Err(Error::No(msg)),
                    Status::Bad(msg) => Err(Error::Bad(msg)),
                };
            }
            // Untagged noise (e.g. EXISTS updates) is legal here.
        }

        self.stream.write_raw(message).await?;
        self.stream.write_raw(b"\r\n").await?;
        self.collect(&tag).await?;
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let tag = self.tags.next();
        let cmd = command::expunge(&tag);
        self.run(&tag, &cmd).await?;
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
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn connect_reads_greeting() {
        let mock = Builder::new().read(b"* OK IMAP ready\r\n").build();
        assert!(Client::connect(mock).await.is_ok());
    }

    #[tokio::test]
    async fn connect_rejects_bye_greeting() {
        let mock = Builder::new().read(b"* BYE busy\r\n").build();
        assert!(Client::connect(mock).await.is_err());
    }

    #[tokio::test]
    async fn login_maps_no_to_auth_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user pass\r\n")
            .read(b"A0000 NO invalid credentials\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        let err = client.login("user", "pass").await.unwrap_err();
        assert!(matches!(err, Error::Auth(msg) if msg == "invalid credentials"));
    }

    #[tokio::test]
    async fn select_returns_exists_count() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 SELECT INBOX\r\n")
            .read(b"* 7 EXISTS\r\n")
            .read(b"* 0 RECENT\r\n")
            .read(b"A0000 OK [READ-WRITE] SELECT completed\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        assert_eq!(client.select("INBOX").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn select_failure_is_no() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 SELECT Missing\r\n")
            .read(b"A0000 NO no such folder\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        assert!(matches!(
            client.select("Missing").await.unwrap_err(),
            Error::No(_)
        ));
    }

    #[tokio::test]
    async fn fetch_collects_fragments_with_literals() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 UID FETCH 444 (RFC822)\r\n")
            .read(b"* 1 FETCH (UID 444 RFC822 {6}\r\n")
            .read(b"abcdef")
            .read(b")\r\n")
            .read(b"A0000 OK FETCH completed\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        let set: UidSet = [444].into_iter().collect();
        let fragments = client.uid_fetch(&set, "(RFC822)").await.unwrap();

        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0],
            Fragment::Literal {
                text: b"* 1 FETCH (UID 444 RFC822 {6}".to_vec(),
                payload: b"abcdef".to_vec(),
            }
        );
        assert_eq!(fragments[1], Fragment::Text(b")".to_vec()));
    }

    fn fixed_date() -> String {
        "01-Jan-2026 12:00:00 +0000".to_string()
    }

    #[tokio::test]
    async fn append_waits_for_continuation() {
        let cmd = command::append("A0000", "INBOX", &[Flag::Seen], &fixed_date(), 5);

        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(&cmd)
            .read(b"+ Ready for literal data\r\n")
            .write(b"hello")
            .write(b"\r\n")
            .read(b"A0000 OK APPEND completed\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        client.set_internal_date_source(fixed_date);
        client
            .append("INBOX", &[Flag::Seen], b"hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn append_refused_without_continuation() {
        let cmd = command::append("A0000", "INBOX", &[Flag::Seen], &fixed_date(), 5);

        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(&cmd)
            .read(b"A0000 NO quota exceeded\r\n")
            .build();
        let mut client = Client::connect(mock).await.unwrap();
        client.set_internal_date_source(fixed_date);
        let err = client
            .append("INBOX", &[Flag::Seen], b"hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::No(msg) if msg == "quota exceeded"));
    }

    #[test]
    fn tagged_status_parsing() {
        assert!(matches!(
            tagged_status(b"A0001 OK done", "A0001"),
            Some(Status::Ok)
        ));
        assert!(matches!(
            tagged_status(b"A0001 NO nope", "A0001"),
            Some(Status::No(msg)) if msg == "nope"
        ));
        assert!(tagged_status(b"* 1 EXISTS", "A0001").is_none());
        assert!(tagged_status(b"A0002 OK done", "A0001").is_none());
    }

    #[test]
    fn exists_parsing() {
        assert_eq!(parse_exists(b"* 12 EXISTS"), Some(12));
        assert_eq!(parse_exists(b"* 0 EXISTS"), Some(0));
        assert_eq!(parse_exists(b"* 12 RECENT"), None);
    }
}
