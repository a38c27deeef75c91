//! acmagent CLI entry point.
//!
//! # Commands
//!
//! - `acmagent request-certificate` requests an email-validated certificate
//!   and prints its id
//! - `acmagent confirm-certificate --certificate-id ID` polls the mailbox
//!   and approves the certificate

mod confirm_cmd;
mod helpers;
mod request_cmd;

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, Subcommand};

use acmagent_core::utils::{get_log_path, rotate_log};

/// Log file size that triggers rotation.
const LOG_MAX_BYTES: u64 = 1024 * 1024;
/// Rotated log files kept next to the current one.
const LOG_BACKUPS: u32 = 3;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// ACM agent: request and confirm ACM certificates from the command line
#[derive(Parser)]
#[command(name = "acmagent", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a certificate validated over email
    RequestCertificate(request_cmd::RequestArgs),

    /// Approve a requested certificate from its confirmation email
    ConfirmCertificate(confirm_cmd::ConfirmArgs),
}

impl Commands {
    fn debug(&self) -> bool {
        match self {
            Commands::RequestCertificate(args) => args.debug,
            Commands::ConfirmCertificate(args) => args.debug,
        }
    }
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.debug());

    let result = match cli.command {
        Commands::RequestCertificate(args) => request_cmd::run(args).await,
        Commands::ConfirmCertificate(args) => confirm_cmd::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            helpers::print_error(&e);
            ExitCode::from(2)
        }
    }
}

/// `--debug` logs to stderr; otherwise logs are appended to the log file,
/// which is rotated at startup once it reaches `LOG_MAX_BYTES`.
fn init_logging(debug: bool) {
    use tracing_subscriber::EnvFilter;

    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("acmagent=debug,warn"))
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
        return;
    }

    let log_path = get_log_path();
    let rotation = rotate_log(&log_path, LOG_MAX_BYTES, LOG_BACKUPS);

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("acmagent=info,warn"))
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("warn"))
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init(),
    }

    if let Err(e) = rotation {
        tracing::warn!(path = %log_path.display(), error = %e, "Log rotation failed");
    }
}
