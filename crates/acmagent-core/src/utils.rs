//! Path helpers and log file rotation.

use std::io;
use std::path::{Path, PathBuf};

/// Get the acmagent data directory (e.g. `~/.acmagent/`).
pub fn get_data_path() -> PathBuf {
    let home = dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".acmagent")
}

/// Default log file used when `--debug` is not given.
pub fn get_log_path() -> PathBuf {
    std::env::temp_dir().join("acmagent.log")
}

/// Rotate `path` once it has reached `max_bytes`: `log` becomes `log.1`,
/// `log.1` becomes `log.2`, and so on. At most `backups` old files are kept.
/// A missing file is not an error.
pub fn rotate_log(path: &Path, max_bytes: u64, backups: u32) -> io::Result<()> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < max_bytes {
        return Ok(());
    }
    if backups == 0 {
        return std::fs::remove_file(path);
    }

    for n in (1..backups).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            std::fs::rename(&from, backup_path(path, n + 1))?;
        }
    }
    std::fs::rename(path, backup_path(path, 1))
}

fn backup_path(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs_next::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
