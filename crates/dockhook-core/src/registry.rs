//! Multi-host client registry

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dockhook_engine::{ContainerEngine, EngineError};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::RegistryConfig;
use crate::error::CoreError;
use crate::host::{Host, parse_connection};

/// Factory for engine connections
///
/// Lets the registry be built against test engines.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Connect to the local engine
    async fn connect_local(&self) -> Result<Arc<dyn ContainerEngine>, EngineError>;

    /// Connect to a remote engine described by `host`
    async fn connect_remote(&self, host: &Host) -> Result<Arc<dyn ContainerEngine>, EngineError>;
}

/// Connected clients keyed by host ID
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<String, Arc<Client>>,
}

impl ClientRegistry {
    /// Connect the local engine and every configured remote host
    ///
    /// The local engine is retried until `wait_for_docker` is used up.
    /// Unreachable remote hosts are skipped with a warning.
    ///
    /// # Errors
    /// Returns a parse error for a malformed remote connection string and
    /// `CoreError::NoClients` if nothing could be reached
    pub async fn build(
        config: &RegistryConfig,
        connector: &dyn EngineConnector,
    ) -> Result<Self, CoreError> {
        let mut clients = BTreeMap::new();

        if let Some(client) = connect_local(config, connector).await {
            clients.insert(client.host().id.clone(), Arc::new(client));
        }

        for connection in &config.remote_hosts {
            let host = parse_connection(connection, &config.certs_dir)?;

            if !host.valid_certs() {
                warn!(host = %host.id, "no ca.pem found, connecting over plain TCP");
            }

            info!(host = %host.id, name = %host.name, "creating remote client");

            let engine = match connector.connect_remote(&host).await {
                Ok(engine) => engine,
                Err(e) => {
                    warn!(host = %host.id, error = %e, "could not create client");
                    continue;
                }
            };

            let client = Client::connect(engine, config.filters.clone(), host).await;
            match client.list_containers().await {
                Ok(_) => {
                    debug!(
                        host = %client.host().id,
                        swarm = client.is_swarm_mode(),
                        "connected to remote engine"
                    );
                    clients.insert(client.host().id.clone(), Arc::new(client));
                }
                Err(e) => {
                    warn!(host = %client.host().id, error = %e, "could not connect to remote host");
                }
            }
        }

        if clients.is_empty() {
            return Err(CoreError::NoClients);
        }

        info!(count = clients.len(), "connected to docker engines");
        Ok(Self { clients })
    }

    /// Registry over already connected clients
    #[must_use]
    pub fn from_clients(clients: impl IntoIterator<Item = Arc<Client>>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.host().id.clone(), c))
                .collect(),
        }
    }

    /// Look up the client for a host ID
    ///
    /// # Errors
    /// Returns `CoreError::HostNotFound` if the host is not connected
    pub fn client(&self, host_id: &str) -> Result<Arc<Client>, CoreError> {
        self.clients
            .get(host_id)
            .cloned()
            .ok_or_else(|| CoreError::HostNotFound(host_id.to_string()))
    }

    #[must_use]
    pub fn host_ids(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Client>> {
        self.clients.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

async fn connect_local(config: &RegistryConfig, connector: &dyn EngineConnector) -> Option<Client> {
    let mut remaining = config.wait_for_docker;

    for attempt in 1.. {
        let failure = match connector.connect_local().await {
            Ok(engine) => {
                let mut host = Host::local();
                if let Some(name) = config.hostname.as_deref().filter(|n| !n.is_empty()) {
                    host.name = name.to_string();
                }

                let client = Client::connect(engine, config.filters.clone(), host).await;
                match client.list_containers().await {
                    Ok(_) => {
                        debug!(swarm = client.is_swarm_mode(), "connected to local engine");
                        return Some(client);
                    }
                    Err(e) => e,
                }
            }
            Err(e) => CoreError::from(e),
        };

        if remaining.is_zero() {
            debug!(error = %failure, "local engine not found");
            break;
        }

        info!(attempt, error = %failure, "waiting for local engine");
        tokio::time::sleep(config.retry_interval).await;
        remaining = remaining.saturating_sub(config.retry_interval);
    }

    None
}
