//! dockhook-api: Shared API types and schemas
//!
//! Contains the container, event, and webhook types exchanged between the
//! core, the daemon, and HTTP consumers, plus the response bodies and their
//! OpenAPI schema definitions.

pub mod container;
pub mod events;
pub mod responses;
pub mod webhook;

pub use container::{Container, HostSummary};
pub use events::{ContainerEvent, EventKind, HealthStatus};
pub use responses::{ActionResponse, ErrorResponse, HealthResponse, VersionResponse};
pub use webhook::{ContainerAction, ParseActionError, Webhook};
