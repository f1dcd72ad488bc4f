//! Container event types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized engine event for a single container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerEvent {
    /// Short (12 character) ID of the container the event is about
    pub actor_id: String,
    /// Raw engine action name (`start`, `die`, `health_status: healthy`, ...)
    pub name: String,
    /// Owning host ID
    pub host: String,
}

/// Health reported by a `health_status` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Event names that change cached container state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    Destroy,
    Die,
    Health(HealthStatus),
    Other,
}

impl ContainerEvent {
    /// Create a new event
    pub fn new(
        actor_id: impl Into<String>,
        name: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            name: name.into(),
            host: host.into(),
        }
    }

    /// Classify the event name
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self.name.as_str() {
            "start" => EventKind::Start,
            "destroy" => EventKind::Destroy,
            "die" => EventKind::Die,
            "health_status: healthy" => EventKind::Health(HealthStatus::Healthy),
            "health_status: unhealthy" => EventKind::Health(HealthStatus::Unhealthy),
            _ => EventKind::Other,
        }
    }
}
