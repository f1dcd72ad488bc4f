//! Webhook database and webhook IDs

use dockhook_api::{ContainerAction, Webhook};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::records::{Record, RecordFile};

/// Webhooks stored as `[webhooks."<uuid>"]` tables
pub type WebhookDatabase = RecordFile<Webhook>;

impl Record for Webhook {
    const TABLE: &'static str = "webhooks";

    fn key(&self) -> &str {
        &self.uuid
    }

    fn set_key(&mut self, key: &str) {
        self.uuid = key.to_string();
    }

    fn validate(&self) -> Result<(), String> {
        Uuid::parse_str(&self.uuid)
            .map(|_| ())
            .map_err(|e| format!("invalid webhook id: {e}"))
    }
}

/// Deterministic webhook ID for a container, host and action
///
/// First 16 bytes of the SHA-256 of `"{container_id}:{host}:{action}"`,
/// stamped as a version 7, RFC 4122 variant UUID.
#[must_use]
pub fn derive_uuid(container_id: &str, host: &str, action: ContainerAction) -> Uuid {
    let hash = Sha256::digest(format!("{container_id}:{host}:{action}").as_bytes());

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    bytes[6] = (bytes[6] & 0x0f) | 0x70;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}
