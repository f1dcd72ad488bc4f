//! Engine host identity and connection string parsing

use std::path::{Path, PathBuf};

use dockhook_api::HostSummary;
use tracing::debug;
use url::Url;

use crate::error::CoreError;

/// ID and display name of the local engine
pub const LOCAL_HOST_ID: &str = "localhost";

/// Mutual TLS files for a remote engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Identity of one engine endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Stable ID, the connection URL with every `/` removed
    pub id: String,
    /// Display name
    pub name: String,
    /// Connection URL, `None` for the local socket
    pub url: Option<Url>,
    /// TLS material, present only when `ca.pem` exists
    pub tls: Option<TlsFiles>,
    /// CPU count reported by the engine
    pub n_cpu: i64,
    /// Memory in bytes reported by the engine
    pub mem_total: i64,
}

impl Host {
    /// The local engine reached through `DOCKER_HOST` or the unix socket
    #[must_use]
    pub fn local() -> Self {
        Self {
            id: LOCAL_HOST_ID.to_string(),
            name: LOCAL_HOST_ID.to_string(),
            url: None,
            tls: None,
            n_cpu: 0,
            mem_total: 0,
        }
    }

    #[must_use]
    pub fn valid_certs(&self) -> bool {
        self.tls.is_some()
    }

    /// Summary exposed over HTTP
    #[must_use]
    pub fn summary(&self) -> HostSummary {
        HostSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            n_cpu: self.n_cpu,
            mem_total: self.mem_total,
        }
    }
}

/// Parse `tcp://host:port` or `tcp://host:port|name` into a [`Host`]
///
/// Certificates are looked up in `{certs_dir}/{hostname}/` when that
/// directory exists, otherwise directly in `certs_dir`.
///
/// # Errors
/// Returns `CoreError::InvalidConnection` for a malformed string and
/// `CoreError::UnsupportedScheme` for anything but `tcp`
pub fn parse_connection(connection: &str, certs_dir: &Path) -> Result<Host, CoreError> {
    let invalid = |reason: String| CoreError::InvalidConnection {
        input: connection.to_string(),
        reason,
    };

    let parts: Vec<&str> = connection.split('|').collect();
    if parts.len() > 2 {
        return Err(invalid("more than one '|' separator".to_string()));
    }

    let url = Url::parse(parts[0].trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "tcp" {
        return Err(CoreError::UnsupportedScheme {
            input: connection.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    let hostname = url
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?
        .to_string();

    let name = match parts.get(1).map(|n| n.trim()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => hostname.clone(),
    };

    let tls = resolve_tls(certs_dir, &hostname);

    Ok(Host {
        id: url.to_string().replace('/', ""),
        name,
        url: Some(url),
        tls,
        n_cpu: 0,
        mem_total: 0,
    })
}

fn resolve_tls(certs_dir: &Path, hostname: &str) -> Option<TlsFiles> {
    let base = std::path::absolute(certs_dir).unwrap_or_else(|_| certs_dir.to_path_buf());

    let host_dir = base.join(hostname);
    let dir = if host_dir.is_dir() {
        host_dir
    } else {
        debug!(
            path = %host_dir.display(),
            fallback = %base.display(),
            "host certificate directory does not exist"
        );
        base
    };

    let ca = dir.join("ca.pem");
    if !ca.exists() {
        return None;
    }

    Some(TlsFiles {
        ca,
        cert: dir.join("cert.pem"),
        key: dir.join("key.pem"),
    })
}
