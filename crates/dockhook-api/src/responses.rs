//! Response types for the API

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::container::Container;
use crate::webhook::ContainerAction;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VersionResponse {
    pub version: String,
}

/// Result of a webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    pub status: String,
    pub action: ContainerAction,
    /// Container after the action; a new ID after a pull
    pub container: Container,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
