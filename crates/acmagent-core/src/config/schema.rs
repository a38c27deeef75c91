//! Configuration schema.
//!
//! Hierarchy: `Config` → `ImapConfig`, `ConfirmConfig`, `AcmConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};

/// Root configuration, loaded from `~/.acmagent/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub imap: ImapConfig,
    pub confirm: ConfirmConfig,
    pub acm: AcmConfig,
}

// ─────────────────────────────────────────────
// IMAP
// ─────────────────────────────────────────────

/// Mailbox the issuer sends validation emails to.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImapConfig {
    /// IMAP server hostname.
    pub server: String,
    /// IMAP login username.
    pub username: String,
    /// IMAP login password.
    pub password: String,
    /// IMAP server port (default 993 for IMAPS).
    pub port: u16,
    /// Use IMAPS (TLS from the start). Default true.
    pub use_ssl: bool,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: String::new(),
            password: String::new(),
            port: default_imap_port(),
            use_ssl: true,
        }
    }
}

impl std::fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConfig")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .finish_non_exhaustive()
    }
}

fn default_imap_port() -> u16 {
    993
}

// ─────────────────────────────────────────────
// Confirmation polling
// ─────────────────────────────────────────────

/// What the orchestrator does when one candidate message fails to confirm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidatePolicy {
    /// Abort the whole attempt on the first failing candidate.
    #[default]
    FailFast,
    /// Log the failure and move on to the next candidate.
    TryNext,
}

/// Polling defaults for `confirm-certificate`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfirmConfig {
    /// Number of polling attempts.
    pub attempts: u32,
    /// Seconds to wait before each attempt.
    pub wait: u64,
    /// Candidate failure policy.
    pub policy: CandidatePolicy,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            wait: 5,
            policy: CandidatePolicy::FailFast,
        }
    }
}

// ─────────────────────────────────────────────
// ACM
// ─────────────────────────────────────────────

/// Certificate Manager API settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcmConfig {
    /// AWS region; falls back to `AWS_REGION` / `AWS_DEFAULT_REGION`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint URL (overrides `https://acm.<region>.amazonaws.com`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}
