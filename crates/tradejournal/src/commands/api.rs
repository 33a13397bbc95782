//! Api command - authenticated calls to the journal backend.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::Value;
use tradejournal_client::{ApiRequest, ListSignalsQuery, ListTradesQuery};

use super::Context;

/// Arguments for the api command.
#[derive(Args, Debug)]
pub struct ApiArgs {
    #[command(subcommand)]
    pub command: ApiCommand,
}

#[derive(Subcommand, Debug)]
pub enum ApiCommand {
    /// GET a path relative to the API base URL
    Get {
        /// Path such as `trades/12` or `bot-config`
        path: String,
    },

    /// Show the user the backend sees
    Whoami,

    /// Show trading statistics
    Stats,

    /// List trades
    Trades {
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },

    /// List signals
    Signals {
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Run the api command.
pub async fn run(args: ApiArgs, ctx: &Context) -> Result<()> {
    let session = ctx.signed_in().await?;
    let client = ctx.client(&session)?;

    let result = match args.command {
        ApiCommand::Get { path } => {
            client
                .send::<Value>(ApiRequest::get(path.trim_start_matches('/')))
                .await
        }
        ApiCommand::Whoami => client.account().current_user().await,
        ApiCommand::Stats => client.account().stats().await,
        ApiCommand::Trades { ticker, status } => {
            client
                .trades()
                .list(&ListTradesQuery {
                    ticker,
                    status,
                    ..Default::default()
                })
                .await
        }
        ApiCommand::Signals { ticker, limit } => {
            client
                .signals()
                .list(&ListSignalsQuery {
                    ticker,
                    limit,
                    ..Default::default()
                })
                .await
        }
    };

    session.shutdown();

    let value = result?;
    if ctx.json_output {
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
