//! `acmagent confirm-certificate`.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use acmagent_confirm::{
    run_confirmation_polling, CandidatePolicy, ConfirmSettings, Confirmer, HttpConfirmationPage,
    ImapConnector, RetryPolicy, TokioPause,
};
use acmagent_core::config::Config;
use acmagent_core::{load_config, load_credentials, MailboxCredentials};

use crate::helpers;

#[derive(Args)]
pub struct ConfirmArgs {
    /// Certificate id, as printed by request-certificate
    #[arg(long)]
    pub certificate_id: String,

    /// Seconds to wait before each mailbox check [default: 5]
    #[arg(long)]
    pub wait: Option<u64>,

    /// Number of mailbox checks [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: Option<u32>,

    /// IMAP credentials file (JSON with server, username, password)
    #[arg(long)]
    pub credentials: Option<String>,

    /// What to do when a matching email cannot be confirmed [default: fail-fast]
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Send logging to stderr
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Stop at the first email that fails
    FailFast,
    /// Move on to the next matching email
    TryNext,
}

impl From<PolicyArg> for CandidatePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::FailFast => CandidatePolicy::FailFast,
            PolicyArg::TryNext => CandidatePolicy::TryNext,
        }
    }
}

pub async fn run(args: ConfirmArgs) -> Result<()> {
    let config = load_config(None);
    let credentials = resolve_credentials(&args, &config)?;
    let policy = retry_policy(&args, &config)?;
    let settings = ConfirmSettings {
        policy: args.policy.map(Into::into).unwrap_or(config.confirm.policy),
        ..ConfirmSettings::default()
    };

    info!(
        certificate_id = %args.certificate_id,
        attempts = policy.max_attempts.get(),
        wait = policy.delay.as_secs(),
        "Starting certificate confirmation"
    );

    let confirmer = Confirmer::new(
        Arc::new(ImapConnector::new(config.imap.port, config.imap.use_ssl)),
        Arc::new(HttpConfirmationPage::default()),
        credentials,
    )
    .with_settings(settings);

    run_confirmation_polling(&confirmer, &TokioPause, &args.certificate_id, policy).await?;

    helpers::print_success("Success: certificate has been confirmed");
    Ok(())
}

/// `--credentials` file if given, otherwise the `imap` config section.
fn resolve_credentials(args: &ConfirmArgs, config: &Config) -> Result<MailboxCredentials> {
    match &args.credentials {
        Some(location) => Ok(load_credentials(&helpers::resolve_location(location))?),
        None => MailboxCredentials::from_config(&config.imap)
            .context("IMAP credentials are not configured; pass --credentials or set the imap section"),
    }
}

/// Command-line flags win over the `confirm` config section.
fn retry_policy(args: &ConfirmArgs, config: &Config) -> Result<RetryPolicy> {
    let attempts = args.attempts.unwrap_or(config.confirm.attempts);
    let max_attempts = NonZeroU32::new(attempts).context("--attempts must be at least 1")?;
    let wait = args.wait.unwrap_or(config.confirm.wait);
    Ok(RetryPolicy::new(max_attempts, Duration::from_secs(wait)))
}
