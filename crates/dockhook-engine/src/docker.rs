//! Docker engine access using `bollard`

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, NetworkingConfig, RemoveContainerOptions, RestartContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerInspectResponse, ContainerSummary, SystemInfo};
use bollard::system::EventsOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, info, instrument};

use crate::auth::RegistryCredentials;
use crate::error::EngineError;
use crate::image::{DEFAULT_TAG, split_reference};
use crate::traits::{ContainerEngine, EventStream, LogStream};
use crate::types::{ContainerSpec, LogLine, LogOptions, StdType};

/// Request timeout in seconds for remote engines
const REMOTE_TIMEOUT_SECS: u64 = 120;

/// Docker engine reached over the local socket or TCP
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using the local defaults (`DOCKER_HOST` or the unix socket)
    ///
    /// # Errors
    /// Returns `EngineError::ConnectionFailed` if the client cannot be built
    pub fn connect_local() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::ConnectionFailed(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Connect to a plain TCP endpoint such as `tcp://10.0.0.5:2375`
    ///
    /// # Errors
    /// Returns `EngineError::ConnectionFailed` if the client cannot be built
    pub fn connect_http(addr: &str) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_http(addr, REMOTE_TIMEOUT_SECS, API_DEFAULT_VERSION)
            .map_err(|e| EngineError::ConnectionFailed(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Connect to a TCP endpoint with mutual TLS
    ///
    /// # Errors
    /// Returns `EngineError::ConnectionFailed` if the certificates cannot be loaded
    pub fn connect_tls(addr: &str, key: &Path, cert: &Path, ca: &Path) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_ssl(
            addr,
            key,
            cert,
            ca,
            REMOTE_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )
        .map_err(|e| EngineError::ConnectionFailed(e.to_string()))?;
        Ok(Self { docker })
    }
}

/// Lower log bound in whole seconds, 0 means unbounded
///
/// Docker only takes seconds, so the bound is widened to the start of its
/// second. Callers drop the extra lines by timestamp.
fn since_seconds(at: Option<DateTime<Utc>>) -> i64 {
    at.map_or(0, |t| t.timestamp())
}

/// Upper log bound in whole seconds, rounded up, 0 means unbounded
fn until_seconds(at: Option<DateTime<Utc>>) -> i64 {
    at.map_or(0, |t| {
        if t.timestamp_subsec_nanos() == 0 {
            t.timestamp()
        } else {
            t.timestamp() + 1
        }
    })
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    #[instrument(skip(self), level = "debug")]
    async fn list_containers(
        &self,
        filters: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<ContainerSummary>, EngineError> {
        let options = ListContainersOptions {
            all: true,
            filters: filters.clone(),
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;
        debug!(count = containers.len(), "listed containers");
        Ok(containers)
    }

    #[instrument(skip(self), level = "debug")]
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, EngineError> {
        let response = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(response)
    }

    #[instrument(skip(self), level = "debug")]
    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn stop_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn restart_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .restart_container(id, None::<RestartContainerOptions>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .remove_container(id, None::<RemoveContainerOptions>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name), level = "debug")]
    async fn create_container(&self, spec: ContainerSpec) -> Result<String, EngineError> {
        let ContainerSpec {
            name,
            config,
            host_config,
            networks,
        } = spec;

        let mut config = Config::from(config);
        config.host_config = host_config;
        if !networks.is_empty() {
            config.networking_config = Some(NetworkingConfig {
                endpoints_config: networks,
            });
        }

        let options = CreateContainerOptions {
            name,
            platform: None,
        };

        let response = self.docker.create_container(Some(options), config).await?;
        debug!(id = %response.id, warnings = ?response.warnings, "container created");
        Ok(response.id)
    }

    #[instrument(skip(self, credentials), level = "debug")]
    async fn pull_image(
        &self,
        image: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<(), EngineError> {
        // An empty tag makes the engine pull every tag of the repository
        let (repository, tag) = split_reference(image);
        let options = CreateImageOptions::<String> {
            from_image: repository.to_string(),
            tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
            ..Default::default()
        };

        let mut progress =
            self.docker
                .create_image(Some(options), None, credentials.cloned().map(Into::into));

        while let Some(item) = progress.next().await {
            let item = item?;
            if let Some(error) = item.error {
                return Err(EngineError::PullFailed(error));
            }
            if let Some(status) = item.status {
                debug!(image = %image, status = %status, "pull progress");
            }
        }

        info!(image = %image, "image pulled");
        Ok(())
    }

    async fn ping(&self) -> Result<String, EngineError> {
        self.docker.ping().await?;
        let version = self.docker.version().await?;
        version
            .api_version
            .ok_or_else(|| EngineError::IncompleteResponse("version without api version".into()))
    }

    async fn info(&self) -> Result<SystemInfo, EngineError> {
        Ok(self.docker.info().await?)
    }

    fn logs(&self, id: &str, options: LogOptions) -> LogStream {
        let request = LogsOptions::<String> {
            follow: options.follow,
            stdout: options.stdout,
            stderr: options.stderr,
            since: since_seconds(options.since),
            until: until_seconds(options.until),
            timestamps: options.timestamps,
            tail: options
                .tail
                .map_or_else(|| "all".to_string(), |n| n.to_string()),
        };

        self.docker
            .logs(id, Some(request))
            .filter_map(|item| async move {
                match item {
                    Ok(LogOutput::StdOut { message }) => Some(Ok(LogLine {
                        stream: StdType::Stdout,
                        message: String::from_utf8_lossy(&message).into_owned(),
                    })),
                    // Containers with a TTY have a single multiplexed stream
                    Ok(LogOutput::Console { message }) => Some(Ok(LogLine {
                        stream: StdType::All,
                        message: String::from_utf8_lossy(&message).into_owned(),
                    })),
                    Ok(LogOutput::StdErr { message }) => Some(Ok(LogLine {
                        stream: StdType::Stderr,
                        message: String::from_utf8_lossy(&message).into_owned(),
                    })),
                    Ok(LogOutput::StdIn { .. }) => None,
                    Err(e) => Some(Err(EngineError::from(e))),
                }
            })
            .boxed()
    }

    fn events(&self) -> EventStream {
        self.docker
            .events(Some(EventsOptions::<String>::default()))
            .map(|item| item.map_err(EngineError::from))
            .boxed()
    }

    fn engine_type(&self) -> &'static str {
        "docker"
    }
}
