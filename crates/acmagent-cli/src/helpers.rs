//! Shared CLI helpers: file locations and terminal output.

use std::path::PathBuf;

use colored::Colorize;

use acmagent_core::utils::expand_home;

/// Accept both `file://` URLs and plain paths (with `~` expansion).
pub fn resolve_location(location: &str) -> PathBuf {
    let path = location.strip_prefix("file://").unwrap_or(location);
    expand_home(path)
}

pub fn print_success(message: &str) {
    println!("{}", message.green());
}

/// Single terminal failure line on stderr.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {err:#}", "error:".red().bold());
}
