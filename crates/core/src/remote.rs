//! Primary-store trait seams
//!
//! The resolver and rental library reach the remote backend only through
//! these traits, allowing HTTP, mock, or future backends. Implementations
//! map transport failures to `Error::StoreUnreachable` so callers can fall
//! back to the local mirror.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Rental, Session, User};

/// Identity operations against the primary store
#[async_trait]
pub trait RemoteIdentityStore: Send + Sync {
    /// Insert a new user; `Error::DuplicateEmail` on a uniqueness violation
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Look up a user by normalized email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by id
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Record a session
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Find a session by bearer token, expired or not
    async fn find_session(&self, token: &str) -> Result<Option<Session>>;

    /// Delete a session by bearer token
    async fn delete_session(&self, token: &str) -> Result<()>;
}

/// Rental operations against the primary store
#[async_trait]
pub trait RemoteRentalStore: Send + Sync {
    /// Unexpired rentals for one user
    async fn list_active_rentals(&self, user_id: Uuid) -> Result<Vec<Rental>>;

    /// Persist a new grant
    async fn create_rental(&self, rental: &Rental) -> Result<()>;
}
