//! Registry credential encoding
//!
//! Webhooks store registry auth the way the Docker API expects it in the
//! `X-Registry-Auth` header: a base64url encoded JSON object.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use bollard::auth::DockerCredentials;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;

/// Credentials for a private image registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serveraddress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identitytoken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrytoken: Option<String>,
}

impl RegistryCredentials {
    /// Username/password (or access token) credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Decode a base64 JSON auth payload
    ///
    /// Returns `Ok(None)` for an empty payload, which means anonymous access.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidAuth` if the payload is not base64 JSON
    pub fn decode(encoded: &str) -> Result<Option<Self>, EngineError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Ok(None);
        }

        let bytes = URL_SAFE
            .decode(encoded)
            .or_else(|_| STANDARD.decode(encoded))
            .map_err(|e| EngineError::InvalidAuth(e.to_string()))?;

        let credentials: RegistryCredentials =
            serde_json::from_slice(&bytes).map_err(|e| EngineError::InvalidAuth(e.to_string()))?;

        debug!(
            username = credentials.username.as_deref().unwrap_or(""),
            "decoded registry credentials"
        );

        Ok(Some(credentials))
    }

    /// Encode as base64url JSON
    ///
    /// # Errors
    /// Returns `EngineError::InvalidAuth` if serialization fails
    pub fn encode(&self) -> Result<String, EngineError> {
        let json = serde_json::to_vec(self).map_err(|e| EngineError::InvalidAuth(e.to_string()))?;
        Ok(URL_SAFE.encode(json))
    }
}

impl From<RegistryCredentials> for DockerCredentials {
    fn from(value: RegistryCredentials) -> Self {
        DockerCredentials {
            username: value.username,
            password: value.password,
            auth: value.auth,
            email: value.email,
            serveraddress: value.serveraddress,
            identitytoken: value.identitytoken,
            registrytoken: value.registrytoken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let credentials = RegistryCredentials::basic("deploy", "ghp_token");
        let encoded = credentials.encode().unwrap();

        let decoded = RegistryCredentials::decode(&encoded).unwrap();
        assert_eq!(decoded, Some(credentials));
    }

    #[test]
    fn test_decode_standard_alphabet() {
        let encoded = STANDARD.encode(r#"{"username":"u","password":"p"}"#);

        let decoded = RegistryCredentials::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded.username.as_deref(), Some("u"));
        assert_eq!(decoded.password.as_deref(), Some("p"));
    }

    #[test]
    fn test_decode_empty_is_anonymous() {
        assert_eq!(RegistryCredentials::decode("  ").unwrap(), None);
    }

    #[test]
    fn test_decode_garbage() {
        let result = RegistryCredentials::decode("not base64 at all!");
        assert!(matches!(result, Err(EngineError::InvalidAuth(_))));

        let not_json = URL_SAFE.encode("plain text");
        let result = RegistryCredentials::decode(&not_json);
        assert!(matches!(result, Err(EngineError::InvalidAuth(_))));
    }
}
