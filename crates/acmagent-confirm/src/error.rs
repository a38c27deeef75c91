//! Confirmation failure taxonomy.
//!
//! Every failure inside one attempt aborts that attempt. Whether the
//! polling loop tries again is decided by [`ConfirmError::is_retryable`],
//! never by matching on variant names at the call site.

use thiserror::Error;

/// Coarse classification of how an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Confirmed,
    NoMatchingEmail,
    TransientParseOrProtocolFailure,
    FatalFailure,
}

/// Errors raised by the confirmation workflow.
#[derive(Debug, Error)]
pub enum ConfirmError {
    /// Mailbox unreachable, TLS failure, login rejected, or folder selection failed.
    #[error("Can't establish connection with \"{server}\" server: {reason}")]
    Connection { server: String, reason: String },

    /// Message retrieval (or marking it read) failed.
    #[error("Failed to fetch email \"{message_id}\": {reason}")]
    Fetch { message_id: String, reason: String },

    #[error("Email \"{message_id}\" is not in the text/html Content-Type")]
    UnsupportedContentType { message_id: String },

    #[error("Url with \"id={anchor_id}\" is not found in the email")]
    MissingConfirmationLink { anchor_id: String },

    #[error(
        "The certificate has been confirmed or the confirmation link: \"{url}\" has expired"
    )]
    ExpiredOrMissingForm { url: String },

    #[error("An unknown error has occurred while requesting url:\"{url}\" (HTTP {status})")]
    SubmissionFailed { url: String, status: u16 },

    /// Transport failure talking to the confirmation page.
    #[error("Request to \"{url}\" failed: {reason}")]
    Http { url: String, reason: String },

    #[error("Failed to find email for certificate {certificate_id} in {folder} folder")]
    NoMatchingEmail {
        certificate_id: String,
        folder: String,
    },

    /// Unexpected protocol state, e.g. a SEARCH answered with NO or BAD.
    #[error("An unknown error has occurred while reading emails, state={state}")]
    Fatal { state: String },
}

impl ConfirmError {
    /// Only a missing email is worth polling for again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoMatchingEmail { .. })
    }

    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::NoMatchingEmail { .. } => AttemptOutcome::NoMatchingEmail,
            Self::Fetch { .. }
            | Self::UnsupportedContentType { .. }
            | Self::MissingConfirmationLink { .. }
            | Self::ExpiredOrMissingForm { .. }
            | Self::SubmissionFailed { .. }
            | Self::Http { .. } => AttemptOutcome::TransientParseOrProtocolFailure,
            Self::Connection { .. } | Self::Fatal { .. } => AttemptOutcome::FatalFailure,
        }
    }
}
