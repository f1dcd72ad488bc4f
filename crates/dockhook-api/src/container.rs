//! Container and host projections

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Point-in-time view of an engine container
///
/// `id` is always the 12-character short form of the engine ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Short (12 character) container ID
    pub id: String,
    /// Raw engine names, with leading `/`
    pub names: Vec<String>,
    /// Primary name without the leading `/`
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
    /// Image digest ID
    pub image_id: String,
    /// Command line
    pub command: String,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Start time, known only after an inspect call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Engine state (`running`, `exited`, ...)
    pub state: String,
    /// Human readable status (`Up 2 hours (healthy)`)
    pub status: String,
    /// Health parsed from the status suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    /// Owning host ID
    pub host: String,
    /// Whether the container was created with a TTY
    #[serde(skip)]
    pub tty: bool,
    /// Container labels
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

impl Container {
    /// Short description used in log lines and CLI output
    #[must_use]
    pub fn description(&self) -> String {
        format!("Id: {} --> Name: {} --> Image: {}", self.id, self.name, self.image)
    }
}

/// Connected engine host as exposed over HTTP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostSummary {
    /// Stable host ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Number of CPUs reported by the engine
    #[serde(rename = "nCPU")]
    pub n_cpu: i64,
    /// Total memory in bytes reported by the engine
    pub mem_total: i64,
}
