use std::io::Read;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hushlink_core::{create_link, fetch_secret, parse_link, Error, SecretOptions};

use hushlink::HttpTransport;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hushlink", about = "End-to-end encrypted one-time secret links", version)]
struct Cli {
    /// hushlink server URL (default: http://localhost:3000 or $HUSHLINK_SERVER)
    #[arg(long, env = "HUSHLINK_SERVER", default_value = "http://localhost:3000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the hushlink storage server
    Serve {
        /// Port to listen on (default: $HUSHLINK_PORT or 3000)
        #[arg(long, env = "HUSHLINK_PORT", default_value = "3000")]
        port: u16,
        /// Host to bind (default: $HUSHLINK_HOST or 0.0.0.0)
        #[arg(long, env = "HUSHLINK_HOST", default_value = "0.0.0.0")]
        host: String,
    },
    /// Encrypt a secret locally and print a one-time shareable link
    Seal {
        /// The secret text, or `-` to read it from stdin
        secret: String,
        /// Strengthen the link with a passphrase (shared out-of-band)
        #[arg(long)]
        passphrase: Option<String>,
        /// Optional passphrase hint, readable by anyone holding the link
        #[arg(long)]
        hint: Option<String>,
    },
    /// Fetch and decrypt a one-time link (this consumes it)
    Open {
        /// The full shareable link, including the #key fragment
        link: String,
        /// Passphrase, if the link requires one (prompted otherwise)
        #[arg(long)]
        passphrase: Option<String>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HUSHLINK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => cmd_serve(host, port).await,
        Commands::Seal {
            secret,
            passphrase,
            hint,
        } => cmd_seal(&cli.server, &secret, passphrase, hint).await,
        Commands::Open { link, passphrase } => cmd_open(&link, passphrase).await,
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16) -> Result<()> {
    let cfg = hushlink_server::ServerConfig {
        host,
        port,
        ..Default::default()
    };
    hushlink_server::run(cfg).await
}

async fn cmd_seal(
    server: &str,
    secret: &str,
    passphrase: Option<String>,
    hint: Option<String>,
) -> Result<()> {
    let secret = if secret == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read secret from stdin")?;
        buf
    } else {
        secret.to_owned()
    };

    let transport = HttpTransport::new(server)?;
    let options = SecretOptions { passphrase, hint };
    let created = create_link(&transport, &secret, &options).await?;

    println!("{}", created.url);
    if created.requires_passphrase {
        eprintln!("Share the passphrase through a separate channel.");
    }
    Ok(())
}

async fn cmd_open(link: &str, passphrase: Option<String>) -> Result<()> {
    let (id, material) = parse_link(link)?;

    let base = link
        .split("/secret/")
        .next()
        .context("link has no server part")?;
    let transport = HttpTransport::new(base)?;

    let mut retrieved = fetch_secret(&transport, &id, material).await?;

    if !retrieved.requires_passphrase() {
        println!("{}", retrieved.reveal(None)?);
        return Ok(());
    }

    if let Some(hint) = retrieved.hint() {
        eprintln!("Hint: {hint}");
    }

    // The record is already consumed; retries run against the cached
    // envelope only, so a typo does not destroy the secret.
    let mut next = passphrase;
    loop {
        let phrase = match next.take() {
            Some(p) => p,
            None => rpassword::prompt_password("Passphrase: ").context("read passphrase")?,
        };
        match retrieved.reveal(Some(&phrase)) {
            Ok(plaintext) => {
                println!("{plaintext}");
                return Ok(());
            }
            Err(Error::AuthenticationFailed) if retrieved.attempts_remaining() > 0 => {
                eprintln!(
                    "Cannot decrypt: incorrect passphrase or corrupted link ({} attempt(s) left).",
                    retrieved.attempts_remaining()
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}
