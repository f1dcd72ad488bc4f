//! Container engine capability trait

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::models::{ContainerInspectResponse, ContainerSummary, EventMessage, SystemInfo};
use futures::stream::BoxStream;

use crate::auth::RegistryCredentials;
use crate::error::EngineError;
use crate::types::{ContainerSpec, LogLine, LogOptions};

/// Log output of a single container
pub type LogStream = BoxStream<'static, Result<LogLine, EngineError>>;

/// Live engine event feed
pub type EventStream = BoxStream<'static, Result<EventMessage, EngineError>>;

/// Operations the core needs from one engine host
///
/// Implemented by [`crate::DockerEngine`] for real hosts and by test doubles.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// List running and stopped containers matching `filters`
    async fn list_containers(
        &self,
        filters: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<ContainerSummary>, EngineError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    async fn stop_container(&self, id: &str) -> Result<(), EngineError>;

    async fn restart_container(&self, id: &str) -> Result<(), EngineError>;

    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;

    /// Create a container and return its full ID
    async fn create_container(&self, spec: ContainerSpec) -> Result<String, EngineError>;

    /// Pull `image`, draining the progress stream to completion
    async fn pull_image(
        &self,
        image: &str,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<(), EngineError>;

    /// Ping the engine and return its API version
    async fn ping(&self) -> Result<String, EngineError>;

    async fn info(&self) -> Result<SystemInfo, EngineError>;

    fn logs(&self, id: &str, options: LogOptions) -> LogStream;

    fn events(&self) -> EventStream;

    /// Implementation name for logging
    fn engine_type(&self) -> &'static str;
}
