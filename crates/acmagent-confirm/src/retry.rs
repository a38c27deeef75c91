//! Retry driver: polls the orchestrator until the email shows up or
//! attempts run out.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use acmagent_core::config::ConfirmConfig;

use crate::error::{AttemptOutcome, ConfirmError};
use crate::orchestrator::{Confirmed, Confirmer};

/// One confirmation attempt.
#[async_trait]
pub trait ConfirmAttempt: Send + Sync {
    async fn attempt(&self, certificate_id: &str) -> Result<Confirmed, ConfirmError>;
}

#[async_trait]
impl ConfirmAttempt for Confirmer {
    async fn attempt(&self, certificate_id: &str) -> Result<Confirmed, ConfirmError> {
        self.confirm_certificate(certificate_id).await
    }
}

/// Wait between polls.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, delay: Duration);
}

pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: NonZeroU32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// `None` when the configured attempt count is zero.
    pub fn from_config(config: &ConfirmConfig) -> Option<Self> {
        let attempts = NonZeroU32::new(config.attempts)?;
        Some(Self::new(attempts, Duration::from_secs(config.wait)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(NonZeroU32::MIN, Duration::from_secs(5))
    }
}

/// Poll until confirmed.
///
/// Sleeps before every attempt, the first included. Only
/// [`ConfirmError::is_retryable`] failures start another attempt; anything
/// else ends the run immediately.
pub async fn run_confirmation_polling(
    confirmer: &dyn ConfirmAttempt,
    pause: &dyn Pause,
    certificate_id: &str,
    policy: RetryPolicy,
) -> Result<Confirmed, ConfirmError> {
    let max_attempts = policy.max_attempts.get();
    let mut remaining = max_attempts;

    loop {
        remaining -= 1;
        let attempt = max_attempts - remaining;

        info!(
            certificate_id,
            attempt,
            max_attempts,
            "Waiting {}s before checking the mailbox",
            policy.delay.as_secs()
        );
        pause.pause(policy.delay).await;

        let result = confirmer.attempt(certificate_id).await;
        let outcome = match &result {
            Ok(_) => AttemptOutcome::Confirmed,
            Err(e) => e.outcome(),
        };
        debug!(attempt, ?outcome, "Attempt finished");

        match result {
            Err(e) if e.is_retryable() && remaining > 0 => {
                warn!(attempt, remaining, error = %e, "Retrying");
            }
            other => return other,
        }
    }
}
