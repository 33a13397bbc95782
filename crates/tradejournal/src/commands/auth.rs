//! Auth command - sign-in and session inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use tradejournal_auth::{SessionContext, SessionManager, SessionState, SessionStatus};

use super::Context;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in through the identity provider
    Login,

    /// Sign in, then show the session
    Status,

    /// Sign in, then end the session at the provider
    Logout,

    /// Sign in and print every session transition until Ctrl-C
    Watch,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login => cmd_login(ctx).await,
        AuthCommand::Status => cmd_status(ctx).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
        AuthCommand::Watch => cmd_watch(ctx).await,
    }
}

async fn cmd_login(ctx: &Context) -> Result<()> {
    let session = ctx.signed_in().await?;
    let state = session.state();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!();
        println!(
            "Signed in as {}",
            style(state.username.as_deref().unwrap_or("unknown")).bold()
        );
        if let Some(remaining) = session.remaining_validity() {
            println!("Token expires in: {} seconds", remaining);
        }
        println!();
    }

    session.shutdown();
    Ok(())
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let state = session.initialize().await;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state(&state, &session, ctx);
    }

    session.shutdown();
    Ok(())
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let session = ctx.signed_in().await?;
    let username = session.state().username;

    session.logout().await;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&session.state())?);
    } else {
        println!(
            "Signed out{}.",
            username.map(|u| format!(" {}", u)).unwrap_or_default()
        );
    }

    session.shutdown();
    Ok(())
}

async fn cmd_watch(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let mut mounted = SessionContext::mount(&session);

    let dim = Style::new().dim();
    if !ctx.json_output {
        println!("{}", dim.apply_to("Watching session (Ctrl-C to stop)"));
    }

    loop {
        tokio::select! {
            view = mounted.changed() => {
                if view.is_none() {
                    break;
                }
                let state = mounted.state();
                if ctx.json_output {
                    println!("{}", serde_json::to_string(&state)?);
                } else {
                    println!(
                        "{} {} {}",
                        dim.apply_to(chrono::Local::now().format("%H:%M:%S")),
                        status_label(state.status),
                        state.username.as_deref().unwrap_or("")
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupted");
                break;
            }
        }
    }

    mounted.unmount();
    session.shutdown();
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn status_label(status: SessionStatus) -> String {
    let style = match status {
        SessionStatus::Authenticated => Style::new().green(),
        SessionStatus::Unauthenticated => Style::new().red(),
        SessionStatus::Initializing | SessionStatus::Uninitialized => Style::new().yellow(),
    };
    style.apply_to(format!("● {}", status)).to_string()
}

fn print_state(state: &SessionState, session: &SessionManager, ctx: &Context) {
    let dim = Style::new().dim();
    let identity = ctx.config.identity();

    println!();
    println!("{}", style("Trading Journal Session").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!("  {} {}", dim.apply_to("Status:"), status_label(state.status));

    if let Some(username) = &state.username {
        println!("  {} {}", dim.apply_to("User:"), username);
    }
    if let Some(expires_at) = state.expires_at {
        let when = chrono::DateTime::from_timestamp(expires_at, 0)
            .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| expires_at.to_string());
        let remaining = session
            .remaining_validity()
            .map(|s| format!(" ({}s left)", s))
            .unwrap_or_default();
        println!("  {} {}{}", dim.apply_to("Expires:"), when, remaining);
    }

    println!(
        "  {} {} (realm {}, client {})",
        dim.apply_to("Provider:"),
        identity.url,
        identity.realm,
        identity.client_id
    );

    let policy = session.refresh_policy();
    println!(
        "  {} every {}s, below {}s validity",
        dim.apply_to("Refresh:"),
        policy.interval.as_secs(),
        policy.min_validity_secs
    );

    if ctx.verbose {
        if let Some(subject) = &state.subject {
            println!("  {} {}", dim.apply_to("Subject:"), subject);
        }
        if let Some(sid) = &state.session_id {
            println!("  {} {}", dim.apply_to("Session:"), sid);
        }
        if let Some(email) = state.claims.as_ref().and_then(|c| c.email.as_deref()) {
            println!("  {} {}", dim.apply_to("Email:"), email);
        }
        println!(
            "  {} refresh={} id={}",
            dim.apply_to("Tokens:"),
            state.has_refresh_token,
            state.has_id_token
        );
        if let Some(claims) = &state.claims
            && let Ok(pretty) = serde_json::to_string_pretty(claims)
        {
            println!("  {}", dim.apply_to("Claims:"));
            for line in pretty.lines() {
                println!("    {}", line);
            }
        }
    }

    if let Some(error) = &state.last_error {
        println!();
        println!(
            "  {} {}",
            dim.apply_to("Error:"),
            Style::new().red().apply_to(&error.message)
        );
    }

    println!();
}
