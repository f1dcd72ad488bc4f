//! Application state shared across HTTP handlers

use std::collections::HashMap;
use std::sync::Arc;

use dockhook_core::{ClientRegistry, ContainerStore, CoreError};
use tokio_util::sync::CancellationToken;

use crate::auth::BasicAuth;
use crate::config::Config;
use crate::webhooks::WebhookDatabase;

/// Application state shared across all handlers
pub struct AppState {
    /// Connected engine clients
    pub registry: Arc<ClientRegistry>,
    /// One container cache per connected host
    pub stores: HashMap<String, ContainerStore>,
    pub webhooks: WebhookDatabase,
    /// `None` leaves every route public
    pub auth: Option<Arc<BasicAuth>>,
    pub config: Arc<Config>,
    /// Cancelled on shutdown, parent of every store and SSE stream
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create state with a container store for every registered host
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        registry: ClientRegistry,
        webhooks: WebhookDatabase,
        auth: Option<BasicAuth>,
        config: Config,
        shutdown: CancellationToken,
    ) -> Self {
        let stores = registry
            .iter()
            .map(|client| {
                (
                    client.host().id.clone(),
                    ContainerStore::new(&shutdown, Arc::clone(client)),
                )
            })
            .collect();

        Self {
            registry: Arc::new(registry),
            stores,
            webhooks,
            auth: auth.map(Arc::new),
            config: Arc::new(config),
            shutdown,
        }
    }

    /// Container store for a host
    ///
    /// # Errors
    /// Returns `CoreError::HostNotFound` if the host is not connected
    pub fn store(&self, host_id: &str) -> Result<&ContainerStore, CoreError> {
        self.stores
            .get(host_id)
            .ok_or_else(|| CoreError::HostNotFound(host_id.to_string()))
    }
}
