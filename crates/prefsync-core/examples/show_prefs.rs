#![allow(clippy::expect_used, clippy::print_stdout, clippy::uninlined_format_args)]
//! Example: Show the current preference document without changing it.
//!
//! Connects over TLS, finds the preference email and prints every
//! field it holds.
//!
//! ## Running
//!
//! ```bash
//! cargo run --package prefsync-core --example show_prefs
//! ```

use std::io::{self, Write};

use prefsync_core::{SyncConfig, scan};
use prefsync_imap::{Client, MailSession, connect_tls};
use prefsync_prefs::ParseFallback;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    print!("IMAP host: ");
    io::stdout().flush()?;
    let mut host = String::new();
    io::stdin().read_line(&mut host)?;
    let host = host.trim();

    print!("Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    let username = username.trim();

    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();

    println!("\nConnecting to {}:993...", host);
    let stream = connect_tls(host, 993).await?;
    let mut client = Client::connect(stream).await?;
    client.login(username, password).await?;

    let config = SyncConfig::default();
    let exists = client.select(&config.folder).await?;
    println!("Folder {} holds {} message(s)", config.folder, exists);
    if exists == 0 {
        client.logout().await?;
        return Ok(());
    }

    let result = scan(&mut client, &config).await?;
    match result.email {
        Some(mut email) => {
            println!("Preference email UID {}", email.uid());
            if !result.orphans.is_empty() {
                println!("Ignored duplicates: {}", result.orphans);
            }
            let document = email.document(ParseFallback::Abort)?;
            for field in document.fields() {
                match &field.value {
                    Some(value) => println!("  {} = {}", field.name, value),
                    None => println!("  {} (unset)", field.name),
                }
            }
        }
        None => println!("No preference email found"),
    }

    client.logout().await?;
    Ok(())
}
