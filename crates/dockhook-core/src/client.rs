//! Per-host engine client
//!
//! Wraps one [`ContainerEngine`] and normalizes what it returns into
//! [`Container`] values keyed by short ID.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Duration, Utc};
use dockhook_api::{Container, ContainerAction, ContainerEvent, Webhook};
use dockhook_engine::models::{
    ContainerSummary, EndpointSettings, EventMessageTypeEnum, LocalNodeState, SystemInfo,
};
use dockhook_engine::{
    ContainerEngine, ContainerSpec, LogOptions, LogStream, RegistryCredentials, StdType,
    with_default_tag,
};
use futures::{StreamExt, TryStreamExt};
use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ContainerFilters;
use crate::error::{ActionError, CoreError};
use crate::host::Host;

/// Length of the short container ID used as cache key
pub const SHORT_ID_LEN: usize = 12;

/// Lines of history sent before following a log stream
const LOG_TAIL: u32 = 100;

static PARENTHESIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([a-zA-Z]+)\)").expect("health pattern is valid"));

/// Truncate an engine ID to its short form
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Health from a status like `Up 2 hours (healthy)`
#[must_use]
pub fn parse_health(status: &str) -> Option<String> {
    PARENTHESIS_RE
        .captures(status)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Client for a single engine host
pub struct Client {
    engine: Arc<dyn ContainerEngine>,
    filters: ContainerFilters,
    host: Host,
    info: SystemInfo,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host.id)
            .field("engine", &self.engine.engine_type())
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client and record the engine's capacity on `host`
    ///
    /// A failing info call is logged and leaves the capacity at zero.
    pub async fn connect(
        engine: Arc<dyn ContainerEngine>,
        filters: ContainerFilters,
        mut host: Host,
    ) -> Self {
        let info = match engine.info().await {
            Ok(info) => info,
            Err(e) => {
                error!(host = %host.id, error = %e, "unable to get engine info");
                SystemInfo::default()
            }
        };

        host.n_cpu = info.ncpu.unwrap_or_default();
        host.mem_total = info.mem_total.unwrap_or_default();

        debug!(host = %host.id, filters = ?filters, "client created");

        Self {
            engine,
            filters,
            host,
            info,
        }
    }

    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Engine info captured at connect time
    #[must_use]
    pub fn system_info(&self) -> &SystemInfo {
        &self.info
    }

    #[must_use]
    pub fn is_swarm_mode(&self) -> bool {
        matches!(
            self.info.swarm.as_ref().and_then(|s| s.local_node_state.as_ref()),
            Some(state) if *state != LocalNodeState::INACTIVE && *state != LocalNodeState::EMPTY
        )
    }

    /// Ping the engine, returning its API version
    ///
    /// # Errors
    /// Returns the engine error if the host is unreachable
    pub async fn ping(&self) -> Result<String, CoreError> {
        Ok(self.engine.ping().await?)
    }

    /// All containers matching the configured filters, sorted by name
    ///
    /// # Errors
    /// Returns the engine error if the listing fails
    #[instrument(skip(self), fields(host = %self.host.id), level = "debug")]
    pub async fn list_containers(&self) -> Result<Vec<Container>, CoreError> {
        let summaries = self.engine.list_containers(&self.filters).await?;

        let mut containers = summaries
            .into_iter()
            .map(|summary| self.to_container(summary))
            .collect::<Result<Vec<_>, _>>()?;

        containers.sort_by_key(|c| c.name.to_lowercase());

        Ok(containers)
    }

    fn to_container(&self, summary: ContainerSummary) -> Result<Container, CoreError> {
        let id = summary
            .id
            .ok_or_else(|| CoreError::IncompleteContainer("container without id".to_string()))?;

        let names = summary.names.unwrap_or_default();
        let name = names
            .first()
            .map_or_else(|| "no name".to_string(), |n| n.trim_start_matches('/').to_string());

        let status = summary.status.unwrap_or_default();
        let health = parse_health(&status);

        Ok(Container {
            id: short_id(&id).to_string(),
            names,
            name,
            image: summary.image.unwrap_or_default(),
            image_id: summary.image_id.unwrap_or_default(),
            command: summary.command.unwrap_or_default(),
            created: summary
                .created
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or_default(),
            started_at: None,
            state: summary.state.map(|s| s.to_string()).unwrap_or_default(),
            status,
            health,
            host: self.host.id.clone(),
            tty: false,
            labels: summary.labels.unwrap_or_default(),
        })
    }

    /// Find a container by (short or full) ID
    ///
    /// # Errors
    /// Returns `CoreError::ContainerNotFound` if no listed container matches
    pub async fn find_container_by_id(&self, id: &str) -> Result<Container, CoreError> {
        let id = short_id(id);
        let container = self
            .list_containers()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::ContainerNotFound(id.to_string()))?;

        self.enrich(container).await
    }

    /// Find a container by name, with or without the leading `/`
    ///
    /// # Errors
    /// Returns `CoreError::ContainerNotFound` if no listed container matches
    pub async fn find_container_by_name(&self, name: &str) -> Result<Container, CoreError> {
        let name = name.trim_start_matches('/');
        let container = self
            .list_containers()
            .await?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CoreError::ContainerNotFound(name.to_string()))?;

        self.enrich(container).await
    }

    async fn enrich(&self, mut container: Container) -> Result<Container, CoreError> {
        let inspect = self.engine.inspect_container(&container.id).await?;

        container.tty = inspect
            .config
            .as_ref()
            .and_then(|c| c.tty)
            .unwrap_or_default();
        container.started_at = inspect
            .state
            .as_ref()
            .and_then(|s| s.started_at.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(container)
    }

    /// Follow a container's output, starting after `since`
    #[must_use]
    pub fn container_logs(
        &self,
        id: &str,
        since: Option<DateTime<Utc>>,
        std: StdType,
    ) -> LogStream {
        debug!(host = %self.host.id, container = %id, since = ?since, std = ?std, "streaming logs");

        let since = since.map(|t| t + Duration::milliseconds(1));
        let lines = self.engine.logs(
            id,
            LogOptions {
                stdout: std.includes_stdout(),
                stderr: std.includes_stderr(),
                follow: true,
                tail: Some(LOG_TAIL),
                timestamps: true,
                since,
                until: None,
            },
        );
        within(lines, since, None)
    }

    /// Output written between `from` and `to`, without following
    #[must_use]
    pub fn container_logs_between_dates(
        &self,
        id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        std: StdType,
    ) -> LogStream {
        debug!(host = %self.host.id, container = %id, %from, %to, "fetching logs");

        let lines = self.engine.logs(
            id,
            LogOptions {
                stdout: std.includes_stdout(),
                stderr: std.includes_stderr(),
                follow: false,
                tail: None,
                timestamps: true,
                since: Some(from),
                until: Some(to),
            },
        );
        within(lines, Some(from), Some(to))
    }

    /// Forward container events into `sink` until `cancel` fires
    ///
    /// Returns `Ok` when cancelled or when the receiver is gone.
    ///
    /// # Errors
    /// Returns the stream error, or `CoreError::EventStreamClosed` if the
    /// engine ends the stream
    pub async fn events(
        &self,
        cancel: CancellationToken,
        sink: mpsc::Sender<ContainerEvent>,
    ) -> Result<(), CoreError> {
        let mut stream = self.engine.events();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                next = stream.next() => next,
            };

            let message = next.ok_or(CoreError::EventStreamClosed)??;
            if message.typ != Some(EventMessageTypeEnum::CONTAINER) {
                continue;
            }

            let Some(actor_id) = message
                .actor
                .and_then(|actor| actor.id)
                .filter(|id| !id.is_empty())
            else {
                continue;
            };

            let event = ContainerEvent::new(
                short_id(&actor_id),
                message.action.unwrap_or_default(),
                self.host.id.as_str(),
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                sent = sink.send(event) => {
                    if sent.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run a webhook's action against its container
    ///
    /// Pull resolves the container by name since a recreate changes the ID.
    ///
    /// # Errors
    /// `ActionError::NotFound` if the container cannot be resolved,
    /// `ActionError::Failed` if the engine call fails
    #[instrument(skip(self, webhook), fields(host = %self.host.id, action = %webhook.action))]
    pub async fn container_actions(&self, webhook: &Webhook) -> Result<Container, ActionError> {
        let (lookup, target) = match webhook.action {
            ContainerAction::Pull => (
                webhook.container_name.as_str(),
                self.find_container_by_name(&webhook.container_name).await,
            ),
            _ => (
                webhook.container_id.as_str(),
                self.find_container_by_id(&webhook.container_id).await,
            ),
        };

        let container = target.map_err(|e| {
            warn!(container = %lookup, error = %e, "unable to resolve container");
            ActionError::NotFound(lookup.to_string())
        })?;

        let failed = |source: CoreError| {
            error!(container = %container.id, error = %source, "action failed");
            ActionError::Failed {
                action: webhook.action,
                container: lookup.to_string(),
                source,
            }
        };

        let result = match webhook.action {
            ContainerAction::Start => self
                .engine
                .start_container(&container.id)
                .await
                .map_err(CoreError::from)
                .map(|()| container.clone()),
            ContainerAction::Stop => self
                .engine
                .stop_container(&container.id)
                .await
                .map_err(CoreError::from)
                .map(|()| container.clone()),
            ContainerAction::Restart => self
                .engine
                .restart_container(&container.id)
                .await
                .map_err(CoreError::from)
                .map(|()| container.clone()),
            ContainerAction::Pull => {
                self.pull_and_recreate(&container, webhook.auth.as_deref())
                    .await
            }
        };

        let updated = result.map_err(failed)?;
        info!(container = %updated.description(), "action completed");
        Ok(updated)
    }

    /// Pull the container's image and recreate it with the same settings
    ///
    /// Nothing is stopped or removed unless the pull succeeds. A failure
    /// after the stop leaves the container stopped or removed.
    #[instrument(skip(self, container, auth), fields(container = %container.id))]
    pub async fn pull_and_recreate(
        &self,
        container: &Container,
        auth: Option<&str>,
    ) -> Result<Container, CoreError> {
        let credentials = auth.map(RegistryCredentials::decode).transpose()?.flatten();

        let inspect = self.engine.inspect_container(&container.id).await?;
        let config = inspect.config.ok_or_else(|| {
            CoreError::IncompleteContainer(format!("{} has no config", container.id))
        })?;
        let image = config.image.clone().ok_or_else(|| {
            CoreError::IncompleteContainer(format!("{} has no image", container.id))
        })?;
        let name = inspect
            .name
            .as_deref()
            .map_or_else(|| container.name.clone(), |n| n.trim_start_matches('/').to_string());
        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or_default();
        let networks = inspect
            .network_settings
            .and_then(|n| n.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(network, endpoint)| (network, reusable_endpoint(endpoint, &container.id)))
            .collect();

        let reference = with_default_tag(&image);
        info!(image = %reference, "pulling image");
        self.engine.pull_image(&reference, credentials.as_ref()).await?;

        if running {
            self.engine.stop_container(&container.id).await?;
        }
        self.engine.remove_container(&container.id).await?;

        let new_id = self
            .engine
            .create_container(ContainerSpec {
                name: name.clone(),
                config,
                host_config: inspect.host_config,
                networks,
            })
            .await?;
        self.engine.start_container(&new_id).await?;

        info!(old = %container.id, new = %short_id(&new_id), name = %name, "container recreated");

        self.find_container_by_name(&name).await
    }

    /// Check that `image` can be pulled with `auth`
    ///
    /// # Errors
    /// Returns the decode or pull error
    pub async fn try_image_pull(&self, image: &str, auth: Option<&str>) -> Result<(), CoreError> {
        let credentials = auth.map(RegistryCredentials::decode).transpose()?.flatten();
        self.engine
            .pull_image(&with_default_tag(image), credentials.as_ref())
            .await?;
        Ok(())
    }
}

/// Drop lines stamped before `since` or after `until`
///
/// The engine only honors whole seconds, so it may send lines from the
/// edges of the range. Lines without a timestamp are kept.
fn within(
    lines: LogStream,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> LogStream {
    lines
        .try_filter(move |line| {
            let keep = line.timestamp().is_none_or(|at| {
                since.is_none_or(|since| at >= since) && until.is_none_or(|until| at <= until)
            });
            futures::future::ready(keep)
        })
        .boxed()
}

/// Keep only the user-supplied parts of an endpoint
///
/// Runtime fields (endpoint ID, assigned addresses) belong to the old
/// container and the engine rejects or overrides them.
fn reusable_endpoint(endpoint: EndpointSettings, old_id: &str) -> EndpointSettings {
    EndpointSettings {
        ipam_config: endpoint.ipam_config,
        links: endpoint.links,
        aliases: endpoint
            .aliases
            .map(|aliases| aliases.into_iter().filter(|a| a != old_id).collect()),
        driver_opts: endpoint.driver_opts,
        ..Default::default()
    }
}
