//! Config loader: reads `~/.acmagent/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.acmagent/config.json`
//! 3. Environment variables `ACMAGENT_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Supported overrides:
/// - `ACMAGENT_IMAP__SERVER` → `imap.server`
/// - `ACMAGENT_IMAP__USERNAME` → `imap.username`
/// - `ACMAGENT_IMAP__PASSWORD` → `imap.password`
/// - `ACMAGENT_IMAP__PORT` → `imap.port`
/// - `ACMAGENT_CONFIRM__ATTEMPTS` → `confirm.attempts`
/// - `ACMAGENT_CONFIRM__WAIT` → `confirm.wait`
/// - `ACMAGENT_ACM__REGION` → `acm.region`
/// - `ACMAGENT_ACM__ENDPOINT` → `acm.endpoint`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("ACMAGENT_IMAP__SERVER") {
        config.imap.server = val;
    }
    if let Ok(val) = std::env::var("ACMAGENT_IMAP__USERNAME") {
        config.imap.username = val;
    }
    if let Ok(val) = std::env::var("ACMAGENT_IMAP__PASSWORD") {
        config.imap.password = val;
    }
    if let Ok(val) = std::env::var("ACMAGENT_IMAP__PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.imap.port = p;
        }
    }

    if let Ok(val) = std::env::var("ACMAGENT_CONFIRM__ATTEMPTS") {
        if let Ok(n) = val.parse::<u32>() {
            config.confirm.attempts = n;
        }
    }
    if let Ok(val) = std::env::var("ACMAGENT_CONFIRM__WAIT") {
        if let Ok(n) = val.parse::<u64>() {
            config.confirm.wait = n;
        }
    }

    if let Ok(val) = std::env::var("ACMAGENT_ACM__REGION") {
        config.acm.region = Some(val);
    }
    if let Ok(val) = std::env::var("ACMAGENT_ACM__ENDPOINT") {
        config.acm.endpoint = Some(val);
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
