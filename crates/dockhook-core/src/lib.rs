//! dockhook-core: Engine clients, host registry and container cache
//!
//! Implements the per-host `Client`, the `ClientRegistry` that connects
//! the local and remote engines, and the event-driven `ContainerStore`.

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod registry;
pub mod store;

pub use client::{Client, SHORT_ID_LEN, parse_health, short_id};
pub use config::{ContainerFilters, RegistryConfig, parse_filters};
pub use error::{ActionError, CoreError};
pub use host::{Host, LOCAL_HOST_ID, TlsFiles, parse_connection};
pub use registry::{ClientRegistry, EngineConnector};
pub use store::{ContainerStore, Subscription, SubscriptionKind};
