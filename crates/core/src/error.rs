//! Error types for Marquee Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An account with this normalized email already exists.
    #[error("An account with this email already exists")]
    DuplicateEmail,

    /// Unknown email or wrong secret; deliberately does not say which.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The primary store could not be reached. Recoverable: callers fall
    /// back to the local mirror.
    #[error("Primary store unreachable: {0}")]
    StoreUnreachable(String),

    /// The current session is past its expiry. Terminal for that session.
    #[error("Session expired")]
    SessionExpired,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for failures that should trigger a local-mirror fallback.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::StoreUnreachable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
