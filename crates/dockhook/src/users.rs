//! User accounts for HTTP authentication
//!
//! Users live in a TOML file keyed by username. Passwords are stored as
//! hex SHA-512 digests:
//!
//! ```toml
//! [users.admin]
//! name = "Admin"
//! email = "admin@example.com"
//! password = "c7ad44cbad762a5da0a452f9e854fdc1e0e7a52a38015f23f3eab1d80b931dd4..."
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::records::{Record, RecordFile};

/// Length of a hex SHA-512 digest
const PASSWORD_HASH_LEN: usize = 128;

/// Users stored as `[users."<username>"]` tables
pub type UserDatabase = RecordFile<User>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Hex SHA-512 of the password
    pub password: String,
}

impl User {
    /// New user with `password` hashed
    pub fn new(
        username: impl Into<String>,
        password: &str,
        name: Option<String>,
        email: Option<String>,
    ) -> Self {
        let username = username.into();
        Self {
            name: name.unwrap_or_else(|| username.clone()),
            email: email.unwrap_or_default(),
            password: hash_password(password),
            username,
        }
    }

    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        self.password.eq_ignore_ascii_case(&hash_password(password))
    }
}

impl Record for User {
    const TABLE: &'static str = "users";

    fn key(&self) -> &str {
        &self.username
    }

    fn set_key(&mut self, key: &str) {
        self.username = key.to_string();
        if self.name.is_empty() {
            self.name = key.to_string();
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.password.is_empty() {
            return Err("user has no password".to_string());
        }
        if self.password.len() != PASSWORD_HASH_LEN || hex::decode(&self.password).is_err() {
            return Err("password is not a hex SHA-512 digest".to_string());
        }
        Ok(())
    }
}

/// Hex SHA-512 of `password`
#[must_use]
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha512::digest(password.as_bytes()))
}

impl UserDatabase {
    /// The user named `username` if `password` matches
    pub async fn find_by_password(&self, username: &str, password: &str) -> Option<User> {
        self.find(username)
            .await
            .filter(|user| user.verify_password(password))
    }
}
