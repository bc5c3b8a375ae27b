//! znn-diag - diagnostic collector for znnd validator nodes.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use znn_diag::config::{self, CredentialSource, DiagConfig};
use znn_diag::pipeline;

#[derive(Parser)]
#[command(name = "znn-diag")]
#[command(
    author,
    version,
    about = "Diagnostic collector for znnd validator nodes"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Node RPC endpoint (host:port or full URL)
    #[arg(long, default_value = "")]
    endpoint: String,

    /// Systemd unit to check
    #[arg(long, default_value = config::DEFAULT_SERVICE)]
    service: String,

    /// Directory receiving the report and archive
    #[arg(long, short, default_value = ".")]
    out_dir: PathBuf,

    /// Install missing packages without asking
    #[arg(long, short = 'y')]
    yes: bool,

    /// Path to a gpg-encrypted credential bundle for report delivery
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Read delivery credentials from ZNN_DIAG_BOT_TOKEN / ZNN_DIAG_CHAT_ID
    #[arg(long, conflicts_with = "credentials")]
    credentials_env: bool,

    /// Environment variable holding the bundle passphrase
    #[arg(long, default_value = config::DEFAULT_PASSPHRASE_VAR)]
    passphrase_env: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let credential_source = if let Some(path) = cli.credentials {
        CredentialSource::File(path)
    } else if cli.credentials_env {
        CredentialSource::Env
    } else {
        CredentialSource::None
    };

    let config = DiagConfig {
        endpoint: config::normalize_endpoint(&cli.endpoint),
        service: cli.service,
        out_dir: cli.out_dir,
        auto_install: cli.yes,
        credential_source,
        passphrase_var: cli.passphrase_env,
    };

    pipeline::run(&config).await?;
    Ok(())
}
