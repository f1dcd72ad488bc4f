//! dockhook daemon
//!
//! Runs container actions on Docker hosts when a webhook is called.

use clap::{Parser, Subcommand};
use color_eyre::Result;
use dockhook_api::ContainerAction;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod commands;
mod config;
mod factory;
mod records;
mod router;
mod state;
mod users;
mod webhooks;

use config::{Config, GlobalArgs, LogFormat, unknown_env_vars};

#[derive(Parser)]
#[command(name = "dockhook")]
#[command(author, version, about = "Webhook-triggered container actions", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the webhook API (default)
    Serve,

    /// Create a webhook for a container and print its UUID
    #[command(name = "create-webhook")]
    CreateWebhook {
        /// Host ID the container runs on
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Container ID or name
        #[arg(long)]
        container: String,

        /// Action the webhook performs
        #[arg(long)]
        action: ContainerAction,

        /// Registry user for image pulls
        #[arg(long, env = "DOCKHOOK_REGISTRY_USER", hide_env_values = true)]
        registry_user: Option<String>,

        /// Registry password or token for image pulls
        #[arg(long, env = "DOCKHOOK_REGISTRY_TOKEN", hide_env_values = true)]
        registry_token: Option<String>,

        /// Only consider containers managed by docker compose
        #[arg(long)]
        compose_only: bool,
    },

    /// Add a user for basic authentication
    #[command(name = "create-user")]
    CreateUser {
        #[arg(long)]
        username: String,

        /// Stored as a SHA-512 digest
        #[arg(long, env = "DOCKHOOK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Display name, defaults to the username
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Check that a running daemon is healthy
    Healthcheck,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let (config, source) = Config::resolve(&cli.global)?;

    init_tracing(&config);

    match source {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => info!("no configuration file found, using defaults"),
    }
    for name in unknown_env_vars(std::env::vars().map(|(name, _)| name)) {
        warn!(variable = %name, "unknown environment variable");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => commands::serve(config).await?,
        Command::CreateWebhook {
            host,
            container,
            action,
            registry_user,
            registry_token,
            compose_only,
        } => {
            commands::create_webhook(
                config,
                commands::CreateWebhook {
                    host,
                    container,
                    action,
                    registry_user,
                    registry_token,
                    compose_only,
                },
            )
            .await?;
        }
        Command::CreateUser {
            username,
            password,
            name,
            email,
        } => {
            commands::create_user(
                &config,
                commands::CreateUser {
                    username,
                    password,
                    name,
                    email,
                },
            )
            .await?;
        }
        Command::Healthcheck => commands::healthcheck(&config).await?,
    }

    Ok(())
}
