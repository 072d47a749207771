//! Transport error types
//!
//! Errors stay transport-shaped inside this crate and convert into the
//! core taxonomy at the store boundary, so callers above the resolver
//! never see raw HTTP failures.

/// Transport result type
pub type Result<T> = std::result::Result<T, Error>;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Row already exists (unique constraint on the remote table)
    #[error("Conflicting row")]
    Conflict,

    #[error("Unexpected response: {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<Error> for marquee_core::Error {
    fn from(err: Error) -> Self {
        match err {
            // Uniqueness violations are user errors, not transport ones
            Error::Conflict => marquee_core::Error::DuplicateEmail,
            // Everything else is recoverable: callers fall back to the mirror
            other => marquee_core::Error::StoreUnreachable(other.to_string()),
        }
    }
}
