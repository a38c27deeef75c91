use thiserror::Error;

/// Errors raised while building or sending a certificate request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A required argument was not supplied; carries the CLI flag name.
    #[error("{0} is required")]
    MissingArgument(&'static str),

    #[error("Unknown property {0} in the specified json file")]
    UnknownProperty(String),

    #[error("Property {property} in the specified json file must be {expected}")]
    InvalidProperty {
        property: &'static str,
        expected: &'static str,
    },

    #[error("Specified file \"{0}\" is missing file URL scheme")]
    MissingFileScheme(String),

    #[error("Specified file \"{0}\" is not readable")]
    UnreadableFile(String),

    #[error("Specified file \"{0}\" is not valid json")]
    InvalidJson(String),

    #[error("{0} is not set")]
    MissingAwsCredential(&'static str),

    #[error("Request to ACM failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ACM returned {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Unexpected ACM response: {0}")]
    InvalidResponse(String),
}
