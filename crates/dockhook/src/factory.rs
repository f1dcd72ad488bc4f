//! Engine connector backed by bollard

use std::sync::Arc;

use async_trait::async_trait;
use dockhook_core::{EngineConnector, Host};
use dockhook_engine::{ContainerEngine, DockerEngine, EngineError};
use tracing::debug;

/// Production connector creating `DockerEngine`s
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerConnector;

#[async_trait]
impl EngineConnector for DockerConnector {
    async fn connect_local(&self) -> Result<Arc<dyn ContainerEngine>, EngineError> {
        Ok(Arc::new(DockerEngine::connect_local()?))
    }

    async fn connect_remote(&self, host: &Host) -> Result<Arc<dyn ContainerEngine>, EngineError> {
        let url = host
            .url
            .as_ref()
            .ok_or_else(|| EngineError::ConnectionFailed(format!("{} has no url", host.id)))?;

        let engine = match &host.tls {
            Some(tls) => {
                debug!(host = %host.id, certs = %tls.ca.display(), "using TLS client config");
                DockerEngine::connect_tls(url.as_str(), &tls.key, &tls.cert, &tls.ca)?
            }
            None => {
                debug!(host = %host.id, "using plain TCP");
                DockerEngine::connect_http(url.as_str())?
            }
        };

        Ok(Arc::new(engine))
    }
}
