//! Trading Journal - command-line client
//!
//! Main entry point for the `tradejournal` CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{api, auth};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Trading Journal - sign in and talk to the journal backend
#[derive(Parser)]
#[command(name = "tradejournal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml and logs
    #[arg(long, global = true, env = "TRADEJOURNAL_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Paste the redirect URL instead of listening on the loopback address
    #[arg(long, global = true)]
    pub paste: bool,

    /// Print the sign-in URL instead of launching the browser
    #[arg(long, global = true)]
    pub no_browser: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign out and inspect the session
    Auth(auth::AuthArgs),

    /// Call the journal backend with the session's token
    Api(api::ApiArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "tradejournal=debug,tradejournal_auth=debug,tradejournal_client=debug,tradejournal_config=debug,info"
    } else {
        "tradejournal=info,tradejournal_auth=info,tradejournal_client=info,warn"
    };

    let log_dir = cli
        .config_dir
        .clone()
        .or_else(tradejournal_config::xdg_config_dir)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tradejournal.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "tradejournal=trace,tradejournal_auth=trace,tradejournal_client=trace,tradejournal_config=trace,info",
                )),
        )
        .init();

    let loaded = tradejournal_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    for path in loaded.loaded_from() {
        tracing::debug!(path = %path.display(), "Loaded config layer");
    }

    let ctx = commands::Context {
        config: loaded.config,
        json_output: cli.json,
        verbose: cli.verbose,
        paste: cli.paste,
        open_browser: !cli.no_browser,
    };

    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Api(args) => api::run(args, &ctx).await,
    }
}
