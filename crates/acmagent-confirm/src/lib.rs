//! acmagent confirm: email-based certificate confirmation.
//!
//! This crate provides:
//! - **mailbox**: the `Mailbox` session trait and its IMAP implementation
//! - **parser**: HTML body and confirmation link extraction
//! - **page**: the confirmation page client (GET form, POST approval)
//! - **orchestrator**: `Confirmer`, one attempt per call
//! - **retry**: `run_confirmation_polling`, the polling loop

pub mod error;
mod imap;
pub mod mailbox;
pub mod orchestrator;
pub mod page;
pub mod parser;
pub mod retry;

pub use acmagent_core::CandidatePolicy;
pub use error::{AttemptOutcome, ConfirmError};
pub use mailbox::{ImapConnector, Mailbox, MailboxConnector, MessageId, RawMessage};
pub use orchestrator::{ConfirmSettings, Confirmed, Confirmer};
pub use page::{ConfirmationPage, FormPayload, HttpConfirmationPage, PageSettings};
pub use retry::{run_confirmation_polling, ConfirmAttempt, Pause, RetryPolicy, TokioPause};
