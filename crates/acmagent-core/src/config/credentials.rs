//! IMAP credentials: strict loading for the mailbox session.
//!
//! Unlike the general config loader, nothing here falls back to defaults:
//! a missing file, broken JSON, or a missing key is reported to the user
//! before any connection is attempted.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::schema::ImapConfig;

/// Required keys, in the order they are checked.
const REQUIRED_KEYS: [&str; 3] = ["server", "username", "password"];

/// Credentials loading failures.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("IMAP credentials file: {} is not found", .0.display())]
    NotFound(PathBuf),

    #[error("IMAP credentials file: {} is not valid JSON or YAML", .0.display())]
    InvalidFile(PathBuf),

    #[error("IMAP credentials file is empty or not well formatted")]
    Malformed,

    #[error("Missing IMAP property \"{0}\", check the credentials file")]
    MissingProperty(String),
}

/// Login details for one mail server. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct MailboxCredentials {
    server: String,
    username: String,
    password: String,
}

impl MailboxCredentials {
    /// Build credentials, rejecting empty fields.
    pub fn new(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let creds = Self {
            server: server.into(),
            username: username.into(),
            password: password.into(),
        };
        for (key, value) in REQUIRED_KEYS.iter().zip(creds.fields()) {
            if value.trim().is_empty() {
                return Err(CredentialsError::MissingProperty((*key).to_string()));
            }
        }
        Ok(creds)
    }

    /// Build credentials from a parsed JSON object.
    pub fn from_value(value: &Value) -> Result<Self, CredentialsError> {
        let obj = value.as_object().ok_or(CredentialsError::Malformed)?;
        let field = |key: &str| -> Result<String, CredentialsError> {
            match obj.get(key) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                Some(_) => Err(CredentialsError::Malformed),
                None => Err(CredentialsError::MissingProperty(key.to_string())),
            }
        };
        Self::new(field("server")?, field("username")?, field("password")?)
    }

    /// Build credentials from the `imap` config section.
    pub fn from_config(imap: &ImapConfig) -> Result<Self, CredentialsError> {
        Self::new(&imap.server, &imap.username, &imap.password)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    fn fields(&self) -> [&str; 3] {
        [&self.server, &self.username, &self.password]
    }
}

impl std::fmt::Debug for MailboxCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Load credentials from an explicit file, either JSON
/// (`{"server": "...", "username": "...", "password": "..."}`) or the
/// YAML mapping older `~/.acmagent` files use.
pub fn load_credentials(path: &Path) -> Result<MailboxCredentials, CredentialsError> {
    debug!("Opening IMAP credentials file {}", path.display());
    let content = std::fs::read_to_string(path)
        .map_err(|_| CredentialsError::NotFound(path.to_path_buf()))?;
    let value: Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(_) => serde_yaml::from_str(&content)
            .map_err(|_| CredentialsError::InvalidFile(path.to_path_buf()))?,
    };
    MailboxCredentials::from_value(&value)
}
