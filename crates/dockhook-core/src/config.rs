//! Registry configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// Engine-side container filters, `key -> values`
pub type ContainerFilters = HashMap<String, Vec<String>>;

/// Settings used by [`crate::ClientRegistry::build`]
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Display name override for the local host
    pub hostname: Option<String>,
    /// Filters applied to every container listing
    pub filters: ContainerFilters,
    /// Remote connection strings, `tcp://host:port[|name]`
    pub remote_hosts: Vec<String>,
    /// Total time to keep retrying the local engine
    pub wait_for_docker: Duration,
    /// Pause between local connection attempts
    pub retry_interval: Duration,
    /// Base directory for per-host TLS material
    pub certs_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            filters: ContainerFilters::new(),
            remote_hosts: Vec::new(),
            wait_for_docker: Duration::ZERO,
            retry_interval: Duration::from_secs(5),
            certs_dir: PathBuf::from("./certs"),
        }
    }
}

/// Parse `key=value` filter strings into engine filters
///
/// Repeated keys accumulate values. The value may itself contain `=`
/// (`label=com.example=1`).
///
/// # Errors
/// Returns `CoreError::InvalidFilter` for an entry without `=` or with an empty key
pub fn parse_filters<S: AsRef<str>>(entries: &[S]) -> Result<ContainerFilters, CoreError> {
    let mut filters = ContainerFilters::new();

    for entry in entries {
        let entry = entry.as_ref();
        let (key, value) = entry
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| CoreError::InvalidFilter(entry.to_string()))?;

        filters
            .entry(key.trim().to_string())
            .or_default()
            .push(value.trim().to_string());
    }

    Ok(filters)
}
