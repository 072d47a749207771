//! SQLite-backed local mirror for Marquee
//!
//! Three independently-keyed collections: cached users, the current
//! session, and cached rentals. Absence or corruption of any row reads
//! as "empty", never as a fatal error.

mod migrations;
mod parse;
mod rentals;
mod session;
mod traits;
mod users;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Rental, Session, User};

pub use rentals::RentalStore;
pub use session::SessionStore;
pub use traits::{LocalIdentityCache, LocalRentalCache, Mirror};
pub use users::UserStore;

/// Main mirror database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the mirror at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory mirror (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get cached user store
    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(&self.conn)
    }

    /// Get current-session store
    pub fn sessions(&self) -> SessionStore<'_> {
        SessionStore::new(&self.conn)
    }

    /// Get cached rental store
    pub fn rentals(&self) -> RentalStore<'_> {
        RentalStore::new(&self.conn)
    }

    /// Housekeeping: drop expired sessions and rentals
    pub fn cleanup_expired(&self) -> Result<u64> {
        let sessions = self.sessions().cleanup_expired()?;
        let rentals = self.rentals().cleanup_expired()?;
        Ok(sessions + rentals)
    }
}

// Implement mirror traits for Database
// This enables composing the resolver against the trait interface

impl LocalIdentityCache for Database {
    fn create_cached_user(&self, user: &User) -> Result<()> {
        self.users().create(user)
    }

    fn cache_user(&self, user: &User) -> Result<()> {
        self.users().upsert(user)
    }

    fn find_cached_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users().find_by_id(id)
    }

    fn find_cached_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.users().find_by_email(email)
    }

    fn set_current_session(&self, session: &Session) -> Result<()> {
        self.sessions().set_current(session)
    }

    fn current_session(&self) -> Result<Option<Session>> {
        self.sessions().current()
    }

    fn clear_current_session(&self) -> Result<()> {
        self.sessions().clear()
    }
}

impl LocalRentalCache for Database {
    fn cache_rental(&self, rental: &Rental) -> Result<()> {
        self.rentals().save(rental)
    }

    fn replace_cached_rentals(&self, user_id: Uuid, rentals: &[Rental]) -> Result<()> {
        self.rentals().replace_for_user(user_id, rentals)
    }

    fn active_cached_rentals(
        &self,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Rental>> {
        self.rentals().list_active(user_id, now)
    }

    fn prune_expired_for_video(&self, video_id: &str, now: DateTime<Utc>) -> Result<u64> {
        self.rentals().prune_expired_for_video(video_id, now)
    }
}
