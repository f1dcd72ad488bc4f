//! API route handlers

pub mod error;
pub mod hosts;
pub mod system;
pub mod webhooks;

use dockhook_api::{
    ActionResponse, Container, ContainerAction, ContainerEvent, ErrorResponse, HealthResponse,
    HostSummary, VersionResponse,
};
use utoipa::OpenApi;

pub use error::AppError;

#[derive(OpenApi)]
#[openapi(
    info(title = "dockhook", description = "Webhook-triggered container actions"),
    paths(
        webhooks::trigger_webhook,
        hosts::list_hosts,
        hosts::list_containers,
        hosts::host_events,
        system::healthcheck,
        system::version,
    ),
    components(schemas(
        ActionResponse,
        Container,
        ContainerAction,
        ContainerEvent,
        ErrorResponse,
        HealthResponse,
        HostSummary,
        VersionResponse,
    )),
    tags(
        (name = "webhooks", description = "Webhook delivery"),
        (name = "hosts", description = "Connected hosts and their containers"),
        (name = "system", description = "Health and version"),
    )
)]
pub struct ApiDoc;
