//! Configuration system: schema, loading, env var overrides, and the
//! strict IMAP credentials loader.
//!
//! # Usage
//! ```no_run
//! use acmagent_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("IMAP server: {}", cfg.imap.server);
//! ```

pub mod credentials;
pub mod loader;
pub mod schema;

// Re-export key types
pub use credentials::{load_credentials, CredentialsError, MailboxCredentials};
pub use loader::{get_config_path, load_config};
pub use schema::{AcmConfig, CandidatePolicy, Config, ConfirmConfig, ImapConfig};
