//! dockhook-engine: Container engine abstraction
//!
//! Provides the `ContainerEngine` capability trait consumed by the core and
//! its Docker implementation on top of `bollard`.

pub mod auth;
pub mod docker;
pub mod error;
pub mod image;
pub mod traits;
pub mod types;

pub use auth::RegistryCredentials;
pub use docker::DockerEngine;
pub use error::EngineError;
pub use image::{DEFAULT_TAG, split_reference, with_default_tag};
pub use traits::{ContainerEngine, EventStream, LogStream};
pub use types::{ContainerSpec, LogLine, LogOptions, StdType};

// Engine payloads are passed through unchanged
pub use bollard::models;
