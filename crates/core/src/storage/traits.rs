//! Local mirror traits
//!
//! These traits define the mirror interface the resolver and rental
//! library compose against, allowing for different implementations
//! (SQLite, mock, future backends). The mirror is never authoritative
//! while the primary store is reachable.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Rental, Session, User};

/// Cached identity operations
pub trait LocalIdentityCache {
    /// Insert a new cached user; `DuplicateEmail` on a normalized-email
    /// collision
    fn create_cached_user(&self, user: &User) -> Result<()>;

    /// Refresh a cached user from an authoritative primary-store row
    fn cache_user(&self, user: &User) -> Result<()>;

    /// Find cached user by id
    fn find_cached_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Find cached user by email (normalized before lookup)
    fn find_cached_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Make this the device's current session
    fn set_current_session(&self, session: &Session) -> Result<()>;

    /// The device's current session, expired or not
    fn current_session(&self) -> Result<Option<Session>>;

    /// Drop the current session unconditionally
    fn clear_current_session(&self) -> Result<()>;
}

/// Cached rental operations
pub trait LocalRentalCache {
    /// Cache a single grant
    fn cache_rental(&self, rental: &Rental) -> Result<()>;

    /// Replace all cached rentals for a user with authoritative rows
    fn replace_cached_rentals(&self, user_id: Uuid, rentals: &[Rental]) -> Result<()>;

    /// Unexpired cached rentals for a user (device-scoped list when None)
    fn active_cached_rentals(
        &self,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Rental>>;

    /// Drop already-expired grants for one video
    fn prune_expired_for_video(&self, video_id: &str, now: DateTime<Utc>) -> Result<u64>;
}

/// Combined mirror interface
pub trait Mirror: LocalIdentityCache + LocalRentalCache {}

// Blanket implementation: any type implementing both caches is a Mirror
impl<T> Mirror for T where T: LocalIdentityCache + LocalRentalCache {}
