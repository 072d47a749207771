//! User and session models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A storefront account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Stored normalized (trimmed, lowercased); unique across the store
    pub email: String,
    pub password_hash: String,
    pub marketing_opt_in: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: String,
        email: &str,
        password_hash: String,
        marketing_opt_in: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email: normalize_email(email),
            password_hash,
            marketing_opt_in,
            created_at: Utc::now(),
        }
    }
}

/// Normalize an email for uniqueness checks and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Bearer session bound to an account
///
/// Valid iff `now < expires_at`; expiry is absolute, never sliding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Default session lifetime: one week
    pub const DEFAULT_HOURS: i64 = 24 * 7;

    pub fn new(token: String, user_id: Uuid, duration_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            token,
            user_id,
            created_at: now,
            expires_at: now + Duration::hours(duration_hours),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at < self.expires_at
    }

    /// Strict-expiry check as a typed error. Expiry is terminal for the
    /// session; callers clear it and read as signed-out.
    pub fn ensure_valid(&self) -> Result<()> {
        self.ensure_valid_at(Utc::now())
    }

    pub fn ensure_valid_at(&self, at: DateTime<Utc>) -> Result<()> {
        if self.is_valid_at(at) {
            Ok(())
        } else {
            Err(Error::SessionExpired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalized_on_construction() {
        let user = User::new(
            "Ada".to_string(),
            "  Ada@Example.COM ",
            "hash".to_string(),
            false,
        );
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_session_expiry_is_strict() {
        let session = Session::new("tok".to_string(), Uuid::new_v4(), 24);
        assert!(session.is_valid_at(session.expires_at - Duration::milliseconds(1)));
        assert!(!session.is_valid_at(session.expires_at));
        assert!(!session.is_valid_at(session.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn test_ensure_valid_reports_expiry() {
        let session = Session::new("tok".to_string(), Uuid::new_v4(), 24);
        assert!(session.ensure_valid_at(session.created_at).is_ok());

        let err = session.ensure_valid_at(session.expires_at).unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
    }
}
