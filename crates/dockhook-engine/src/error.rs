//! Error types for dockhook-engine

use thiserror::Error;

/// Errors that can occur while talking to a container engine
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Failed to build a connection to the engine
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Engine API returned an error
    #[error("engine API error: {0}")]
    Api(String),

    /// Engine answered 404 for the requested object
    #[error("not found: {0}")]
    NotFound(String),

    /// Image pull reported an error
    #[error("image pull failed: {0}")]
    PullFailed(String),

    /// Registry credentials could not be decoded
    #[error("invalid registry auth: {0}")]
    InvalidAuth(String),

    /// Engine response is missing a required field
    #[error("incomplete engine response: {0}")]
    IncompleteResponse(String),
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error;

        match err {
            Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => EngineError::NotFound(message),
            Error::DockerStreamError { error } => EngineError::PullFailed(error),
            Error::IOError { .. } | Error::HyperResponseError { .. } => {
                EngineError::ConnectionFailed(err.to_string())
            }
            other => EngineError::Api(other.to_string()),
        }
    }
}
