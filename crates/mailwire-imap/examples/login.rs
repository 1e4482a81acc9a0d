#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: Log in to an IMAP server and list its capabilities
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=mailwire_imap=debug \
//!     cargo run --package mailwire-imap --example login -- imap.example.com 993
//! ```
//!
//! Port 993 uses implicit TLS, any other port uses STARTTLS.

use std::io::{self, Write};
use std::sync::Arc;

use mailwire_imap::{
    Command, Config, Connection, ErrorKind, NetworkTransport, Security, TracingSink,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "imap.example.com".to_string());
    let port: u16 = args.next().map_or(Ok(993), |p| p.parse())?;
    let security = if port == 993 {
        Security::Implicit
    } else {
        Security::StartTls
    };

    print!("Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;

    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    let config = Config::builder(host).port(port).security(security).build();
    println!("\nConnecting to {}...", config.address());

    let mut connection = Connection::new(NetworkTransport::new(config))
        .with_status_sink(Arc::new(TracingSink))
        .with_client_id(vec![("name".to_string(), "mailwire".to_string())]);
    connection.set_credentials(username.trim(), password.trim());

    match connection.open().await {
        Ok(()) => println!("✓ Authenticated"),
        Err(e) if e.kind() == ErrorKind::AuthenticationFailed => {
            println!("✗ Login rejected: {}", e.alert().unwrap_or_default());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    for response in connection.execute(&Command::capability()).await? {
        println!("  {}", response.payload().map_or("", |p| p.text.as_str()));
    }

    connection.logout().await?;
    println!("✓ Disconnected");

    Ok(())
}
