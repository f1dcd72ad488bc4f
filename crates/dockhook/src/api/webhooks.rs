//! Webhook delivery endpoint

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use dockhook_api::{ActionResponse, ErrorResponse};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::error::AppError;
use crate::state::AppState;

/// Run the action bound to a webhook
///
/// # Errors
/// 400 for a malformed UUID, 404 for an unknown webhook or container,
/// 500 when the host is not connected or the engine call fails
#[utoipa::path(
    post,
    path = "/api/webhooks/{uuid}",
    params(("uuid" = String, Path, description = "Webhook UUID")),
    responses(
        (status = 200, description = "Action performed", body = ActionResponse),
        (status = 400, description = "Malformed webhook ID", body = ErrorResponse),
        (status = 401, description = "Missing or wrong credentials", body = ErrorResponse),
        (status = 404, description = "Unknown webhook or container", body = ErrorResponse),
        (status = 429, description = "User blocked after too many attempts", body = ErrorResponse),
        (status = 500, description = "Action failed", body = ErrorResponse),
    ),
    tag = "webhooks"
)]
pub async fn trigger_webhook(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let uuid = Uuid::parse_str(&uuid).map_err(|_| AppError::bad_request("invalid webhook id"))?;

    let webhook = state
        .webhooks
        .find(&uuid.to_string())
        .await
        .ok_or_else(|| AppError::not_found("webhook not found"))?;

    let client = state.registry.client(&webhook.host).map_err(|_| {
        error!(host = %webhook.host, webhook = %webhook.uuid, "no client found for host");
        AppError::internal()
    })?;

    let container = client.container_actions(&webhook).await?;

    info!(
        action = %webhook.action,
        container = %container.id,
        "container action performed"
    );

    Ok(Json(ActionResponse {
        status: "ok".to_string(),
        action: webhook.action,
        container,
    }))
}
