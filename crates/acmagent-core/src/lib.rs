//! acmagent core: configuration, IMAP credentials, and path helpers
//! shared by the confirmation workflow, the certificate request client,
//! and the CLI.

pub mod config;
pub mod utils;

pub use config::{
    load_config, load_credentials, CandidatePolicy, Config, CredentialsError,
    MailboxCredentials,
};
