//! Subcommand implementations

use std::sync::Arc;

use chrono::Utc;
use dockhook_api::{ContainerAction, Webhook};
use dockhook_core::{ClientRegistry, CoreError};
use dockhook_engine::RegistryCredentials;
use eyre::{Result, WrapErr, bail};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::BasicAuth;
use crate::config::{AuthProvider, Config};
use crate::factory::DockerConnector;
use crate::records::RecordStoreError;
use crate::router::create_router;
use crate::state::AppState;
use crate::users::{User, UserDatabase};
use crate::webhooks::{WebhookDatabase, derive_uuid};

/// Label every compose-managed container carries
const COMPOSE_LABEL: &str = "com.docker.compose.project";

/// Run the HTTP daemon until Ctrl-C or SIGTERM
pub async fn serve(config: Config) -> Result<()> {
    let registry = ClientRegistry::build(&config.registry_config()?, &DockerConnector)
        .await
        .wrap_err("failed to connect to any container engine")?;
    info!(hosts = ?registry.host_ids(), "engine clients ready");

    let webhooks = WebhookDatabase::open(&config.data.webhooks).await?;
    info!(
        path = %webhooks.path().display(),
        count = webhooks.len().await,
        "webhooks loaded"
    );

    let auth = match config.server.auth_provider {
        AuthProvider::Basic => {
            let users = UserDatabase::open(&config.data.users).await?;
            let count = users.len().await;
            if count == 0 {
                warn!(
                    path = %users.path().display(),
                    "no users found, every request will be rejected; run `dockhook create-user`"
                );
            } else {
                info!(path = %users.path().display(), count, "users loaded");
            }
            Some(BasicAuth::new(users))
        }
        AuthProvider::None => {
            warn!("authentication is disabled");
            None
        }
    };

    let addr = config.bind_addr();
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(
        registry,
        webhooks,
        auth,
        config,
        shutdown.clone(),
    ));
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "dockhook listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .wrap_err("server error")?;

    info!("dockhook stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutting down");
    shutdown.cancel();
}

/// Options of `dockhook create-webhook`
#[derive(Debug, Clone)]
pub struct CreateWebhook {
    pub host: String,
    pub container: String,
    pub action: ContainerAction,
    pub registry_user: Option<String>,
    pub registry_token: Option<String>,
    pub compose_only: bool,
}

/// Create a webhook for a container and print its UUID
pub async fn create_webhook(config: Config, options: CreateWebhook) -> Result<()> {
    let mut registry_config = config.registry_config()?;
    if options.compose_only {
        registry_config
            .filters
            .entry("label".to_string())
            .or_default()
            .push(COMPOSE_LABEL.to_string());
    }

    let registry = ClientRegistry::build(&registry_config, &DockerConnector).await?;
    let client = registry.client(&options.host)?;

    let container = match client.find_container_by_id(&options.container).await {
        Ok(container) => container,
        Err(CoreError::ContainerNotFound(_)) => client
            .find_container_by_name(&options.container)
            .await
            .wrap_err_with(|| {
                format!("no container {} on {}", options.container, options.host)
            })?,
        Err(e) => return Err(e.into()),
    };

    let auth = match (&options.registry_user, &options.registry_token) {
        (Some(user), Some(token)) => Some(RegistryCredentials::basic(user, token).encode()?),
        (None, None) => None,
        _ => bail!("--registry-user and --registry-token must be given together"),
    };

    if options.action == ContainerAction::Pull {
        info!(image = %container.image, "checking registry access");
        client
            .try_image_pull(&container.image, auth.as_deref())
            .await
            .wrap_err_with(|| format!("unable to pull {}", container.image))?;
    }

    let uuid = derive_uuid(&container.id, &options.host, options.action);
    let webhook = Webhook {
        uuid: uuid.to_string(),
        container_id: container.id.clone(),
        container_name: container.name.clone(),
        host: options.host.clone(),
        action: options.action,
        auth,
        created: Utc::now(),
    };

    let webhooks = WebhookDatabase::open(&config.data.webhooks).await?;
    match webhooks.create(webhook).await {
        Ok(webhook) => {
            info!(
                container = %container.description(),
                action = %webhook.action,
                "webhook created"
            );
        }
        Err(RecordStoreError::AlreadyExists(_)) => {
            warn!(container = %container.description(), "webhook already exists");
        }
        Err(e) => return Err(e.into()),
    }

    println!("{uuid}");
    Ok(())
}

/// Options of `dockhook create-user`
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Add a user to the users file
pub async fn create_user(config: &Config, options: CreateUser) -> Result<()> {
    if options.username.is_empty() || options.username.contains(':') {
        bail!("username must be non-empty and may not contain ':'");
    }
    if options.password.is_empty() {
        bail!("password must not be empty");
    }

    let users = UserDatabase::open(&config.data.users).await?;
    let user = User::new(
        options.username,
        &options.password,
        options.name,
        options.email,
    );
    let user = users
        .create(user)
        .await
        .wrap_err_with(|| format!("failed to add user to {}", users.path().display()))?;

    info!(username = %user.username, path = %users.path().display(), "user created");
    Ok(())
}

/// URL of the healthcheck endpoint of a locally running daemon
fn healthcheck_url(config: &Config) -> String {
    let addr = config.server.addr.trim();
    let addr = match addr.strip_prefix("0.0.0.0") {
        Some(port) => format!("localhost{port}"),
        None if addr.starts_with(':') => format!("localhost{addr}"),
        None => addr.to_string(),
    };
    let scheme = if addr.starts_with("http") { "" } else { "http://" };
    format!("{scheme}{addr}{}/healthcheck", config.base_path())
}

/// Query the daemon's healthcheck, failing on a non-2xx response
pub async fn healthcheck(config: &Config) -> Result<()> {
    let url = healthcheck_url(config);
    let response = reqwest::get(&url)
        .await
        .wrap_err_with(|| format!("failed to reach {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("healthcheck failed with {status}");
    }

    println!("{}", response.text().await.unwrap_or_default());
    Ok(())
}
