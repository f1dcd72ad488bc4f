//! Core error types for dockhook-core

use dockhook_api::ContainerAction;
use dockhook_engine::EngineError;
use thiserror::Error;

/// Errors that can occur in client, registry and store operations
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// No container matched the lookup
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// No client is registered for the host ID
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// Engine call failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Connection string could not be parsed
    #[error("invalid connection string {input:?}: {reason}")]
    InvalidConnection {
        /// Raw connection string
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// Remote hosts must use `tcp://`
    #[error("unsupported scheme {scheme:?} in {input:?}, only tcp is supported")]
    UnsupportedScheme {
        /// Raw connection string
        input: String,
        /// Scheme found in the URL
        scheme: String,
    },

    /// Neither the local engine nor any remote host could be reached
    #[error("could not connect to any docker engine")]
    NoClients,

    /// Container filter is not `key=value`
    #[error("invalid filter {0:?}, expected key=value")]
    InvalidFilter(String),

    /// Engine event stream ended without being cancelled
    #[error("event stream closed")]
    EventStreamClosed,

    /// Store event loop is gone
    #[error("container store is closed")]
    StoreClosed,

    /// Engine returned a container without an ID or creation time
    #[error("incomplete container record: {0}")]
    IncompleteContainer(String),
}

impl CoreError {
    /// Check if this is a not-found condition
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ContainerNotFound(_) | CoreError::Engine(EngineError::NotFound(_))
        )
    }
}

/// Result of dispatching a webhook action
#[derive(Error, Debug, Clone)]
pub enum ActionError {
    /// Target container could not be resolved
    #[error("container {0} not found")]
    NotFound(String),

    /// Engine rejected or failed the action
    #[error("{action} failed for container {container}: {source}")]
    Failed {
        /// Requested action
        action: ContainerAction,
        /// Container ID or name from the webhook
        container: String,
        /// Underlying failure
        #[source]
        source: CoreError,
    },
}

impl ActionError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ActionError::NotFound(_))
    }
}
