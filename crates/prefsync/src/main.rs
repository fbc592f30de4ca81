//! `prefsync` - change webmail preferences stored in an IMAP folder.
//!
//! Connects to the mail server, finds the preference email, applies
//! the requested edits and replaces the message in place.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use prefsync_core::{FieldEdit, SyncConfig, synchronize};
use prefsync_imap::{Client, ImapStream, connect_plain, connect_tls};
use prefsync_prefs::ParseFallback;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const IMAP_PORT: u16 = 143;
const IMAP_SSL_PORT: u16 = 993;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "prefsync", version, about)]
struct Args {
    /// IMAP server hostname or IP address.
    #[arg(long)]
    host: String,

    /// Username to log in with.
    #[arg(long)]
    username: String,

    /// Password for the user.
    #[arg(long)]
    password: String,

    /// IMAP server port. Defaults to 993 when --use-ssl is given and
    /// the port is left unset.
    #[arg(long, default_value_t = IMAP_PORT)]
    port: u16,

    /// Connect over TLS.
    #[arg(long)]
    use_ssl: bool,

    /// Folder holding the preference email.
    #[arg(long, default_value = "#Scalix/Oddpost")]
    folder: String,

    /// Preference edit, as OPTION=VALUE. May be given multiple times.
    #[arg(long = "set", value_name = "OPTION=VALUE", required = true)]
    set: Vec<FieldEdit>,

    /// Replace an unparseable preference document with the built-in
    /// template instead of aborting.
    #[arg(long)]
    replace_invalid_xml: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "prefsync=info,prefsync_core=info,prefsync_imap=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let port = if args.use_ssl && args.port == IMAP_PORT {
        IMAP_SSL_PORT
    } else {
        args.port
    };

    let config = SyncConfig {
        folder: args.folder.clone(),
        fallback: if args.replace_invalid_xml {
            ParseFallback::UseTemplate
        } else {
            ParseFallback::Abort
        },
        ..SyncConfig::default()
    };

    info!(host = %args.host, port, tls = args.use_ssl, "connecting");
    let stream: ImapStream = if args.use_ssl {
        connect_tls(&args.host, port).await
    } else {
        connect_plain(&args.host, port).await
    }
    .context("could not connect to the IMAP server")?;

    let mut client = Client::connect(stream)
        .await
        .context("server greeting failed")?;
    client
        .login(&args.username, &args.password)
        .await
        .context("login failed")?;

    let outcome = synchronize(&mut client, &config, &args.set)
        .await
        .context("preference synchronization failed")?;

    info!(
        created_from_template = outcome.created_from_template,
        edits_applied = outcome.edits_applied,
        edits_requested = args.set.len(),
        orphans_flagged = outcome.orphans_flagged,
        "synchronization complete"
    );

    if let Err(err) = client.logout().await {
        warn!(%err, "logout failed");
    }

    Ok(())
}
