//! System endpoints

use std::sync::Arc;

use axum::{Json, extract::State};
use dockhook_api::{ErrorResponse, HealthResponse, VersionResponse};
use tracing::error;
use utoipa::OpenApi;

use crate::api::ApiDoc;
use crate::api::error::AppError;
use crate::state::AppState;

/// Ping the first connected engine
///
/// # Errors
/// 500 when no engine answers
#[utoipa::path(
    get,
    path = "/healthcheck",
    responses(
        (status = 200, description = "Engine reachable", body = HealthResponse),
        (status = 500, description = "Engine unreachable", body = ErrorResponse),
    ),
    tag = "system"
)]
pub async fn healthcheck(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, AppError> {
    let client = state.registry.iter().next().ok_or_else(|| {
        error!("healthcheck without a connected engine");
        AppError::internal()
    })?;

    let api_version = client.ping().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        api_version,
    }))
}

/// Daemon version
#[utoipa::path(
    get,
    path = "/version",
    responses((status = 200, description = "Daemon version", body = VersionResponse)),
    tag = "system"
)]
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// OpenAPI document for the HTTP API
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
