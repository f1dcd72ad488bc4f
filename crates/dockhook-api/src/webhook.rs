//! Webhook records and container actions

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Action a webhook performs on its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
    /// Pull the image and recreate the container from it
    Pull,
}

impl ContainerAction {
    /// Every supported action
    pub const ALL: [ContainerAction; 4] = [
        ContainerAction::Start,
        ContainerAction::Stop,
        ContainerAction::Restart,
        ContainerAction::Pull,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
            ContainerAction::Pull => "pull",
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown action name
#[derive(Debug, Clone, Error)]
#[error("unknown action: {0}")]
pub struct ParseActionError(pub String);

impl FromStr for ContainerAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContainerAction::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseActionError(s.to_string()))
    }
}

/// Persisted webhook definition
///
/// The UUID is the key of the record in the webhook database and is not
/// part of the stored body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    #[serde(skip)]
    pub uuid: String,
    /// Short ID of the container at creation time
    pub container_id: String,
    /// Container name, used to find the container again after a recreate
    pub container_name: String,
    /// Host ID the container lives on
    pub host: String,
    /// Action to perform
    pub action: ContainerAction,
    /// Base64 JSON registry credentials for pulls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// Creation timestamp
    pub created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_str() {
        assert_eq!("pull".parse::<ContainerAction>().unwrap(), ContainerAction::Pull);
        assert_eq!("RESTART".parse::<ContainerAction>().unwrap(), ContainerAction::Restart);
        assert!("recreate".parse::<ContainerAction>().is_err());
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_string(&ContainerAction::Stop).unwrap();
        assert_eq!(json, "\"stop\"");
    }
}
