//! CLI commands

use anyhow::{Context, Result};
use campus_core::AuthError;
use campus_frontend_common::{
    AppContext, CampusConfig, FileTokenStore, RouteDecision, SessionSnapshot,
};
use clap::Subcommand;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and remember the session
    Login {
        /// Account username
        #[arg(short, long, env = "CAMPUS_USERNAME")]
        username: String,

        /// Account password (prompted for when omitted)
        #[arg(long, env = "CAMPUS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the session and forget the saved tokens
    Logout,

    /// Show the saved session
    Status {
        /// Print machine readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Check whether the current user may open a route
    CanAccess {
        /// Application route, e.g. /courses/4/manage/grades
        path: String,
    },

    /// GET an API path with the session's credentials
    Get {
        /// Path relative to the API base URL
        path: String,
    },

    /// Keep the session fresh in the foreground until interrupted
    Watch,

    /// Configuration file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with the default settings
    Init {
        /// Output file path (defaults to the platform config directory)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Commands {
    /// Commands that run until interrupted are exempt from the global timeout
    pub const fn is_long_running(&self) -> bool {
        matches!(self, Self::Watch)
    }

    pub async fn execute(self, settings: CampusConfig, state_dir: PathBuf) -> Result<()> {
        if let Self::Config { command } = self {
            return command.execute(&settings);
        }

        let store = Arc::new(FileTokenStore::new(config::session_path(&state_dir)));
        let ctx = AppContext::new(settings, store).context("Failed to create API client")?;
        ctx.session.restore();

        match self {
            Self::Login { username, password } => login(&ctx, &username, password).await,
            Self::Logout => {
                ctx.session.logout().await;
                println!("Logged out");
                Ok(())
            }
            Self::Status { json } => status(&ctx, json),
            Self::Refresh => refresh(&ctx).await,
            Self::CanAccess { path } => {
                can_access(&ctx, &path);
                Ok(())
            }
            Self::Get { path } => {
                let body = ctx.api.get_json(&path).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(())
            }
            Self::Watch => watch(&ctx).await,
            Self::Config { .. } => Ok(()),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, settings: &CampusConfig) -> Result<()> {
        match self {
            Self::Init { output, force } => {
                let path = output.unwrap_or_else(config::default_config_path);
                config::generate_default_config(&path, force)?;
                println!("Default configuration written to: {}", path.display());
                Ok(())
            }
            Self::Show => {
                print!("{}", toml::to_string_pretty(settings)?);
                Ok(())
            }
        }
    }
}

/// Attach the user-facing message to an auth failure
fn explain(error: AuthError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}

fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn login(ctx: &AppContext, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let user = ctx.session.login(username, &password).await.map_err(explain)?;

    match user {
        Some(user) => println!("Logged in as {} ({})", user.label(), user.role),
        None => println!("Logged in as {username}"),
    }
    if !ctx.session.is_persistent() {
        let notice = AuthError::storage_unavailable("session file not writable");
        println!("{}", notice.user_message());
    }
    Ok(())
}

fn describe(snapshot: &SessionSnapshot) -> String {
    match (&snapshot.user, snapshot.authenticated) {
        (Some(user), true) => format!(
            "{:?}: {} <{}> ({})",
            snapshot.status,
            user.label(),
            user.email,
            user.role
        ),
        (None, true) => format!("{:?}: profile unknown", snapshot.status),
        (_, false) => "Not logged in".to_string(),
    }
}

fn status(ctx: &AppContext, json: bool) -> Result<()> {
    let snapshot = ctx.session.snapshot();

    if json {
        let value = serde_json::json!({
            "status": format!("{:?}", snapshot.status).to_lowercase(),
            "authenticated": snapshot.authenticated,
            "hasRefreshToken": ctx.session.has_refresh_token(),
            "user": snapshot.user,
            "lastRefreshedAt": snapshot.last_refreshed_at,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", describe(&snapshot));
    }
    Ok(())
}

async fn refresh(ctx: &AppContext) -> Result<()> {
    if !ctx.session.has_refresh_token() {
        return Err(explain(AuthError::NotAuthenticated));
    }

    ctx.session.refresh_session().await.map_err(explain)?;
    println!("Session refreshed");
    Ok(())
}

fn can_access(ctx: &AppContext, path: &str) {
    let decision = ctx.guard.decide(&ctx.session.snapshot(), path);
    match (&decision, ctx.guard.redirect_target(&decision)) {
        (RouteDecision::Render, _) => println!("{path}: allowed"),
        (_, Some(target)) => println!("{path}: redirect to {target}"),
        (_, None) => println!("{path}: {decision:?}"),
    }
}

async fn watch(ctx: &AppContext) -> Result<()> {
    let handle = ctx.spawn_scheduler();
    let mut changes = ctx.session.subscribe();
    let interval = ctx.config().session.refresh_interval();
    info!(interval_secs = interval.as_secs(), "Watching session");

    println!("{}", describe(&changes.borrow_and_update()));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                println!("{}", describe(&snapshot));
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
