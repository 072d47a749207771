//! Cached account storage (local mirror of the primary store's users)

use rusqlite::{params, Connection};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::parse::{discard_wrong_typed, parse_datetime, parse_uuid, OptionalExt};
use crate::error::{Error, Result};
use crate::models::{normalize_email, User};

/// Raw row as stored; decoded leniently so a corrupt row reads as absent
type RawUser = (String, String, String, String, bool, String);

fn decode_user(raw: RawUser) -> Option<User> {
    let (id, name, email, password_hash, marketing_opt_in, created_at) = raw;

    let id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(_) => {
            warn!(%email, "Discarding cached user with malformed id");
            return None;
        }
    };
    let created_at = match parse_datetime(&created_at) {
        Ok(dt) => dt,
        Err(_) => {
            warn!(%email, "Discarding cached user with malformed created_at");
            return None;
        }
    };

    Some(User {
        id,
        name,
        email,
        password_hash,
        marketing_opt_in,
        created_at,
    })
}

pub struct UserStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new cached user; `DuplicateEmail` if the normalized email
    /// is already present
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub fn create(&self, user: &User) -> Result<()> {
        let result = self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, marketing_opt_in, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.marketing_opt_in,
                user.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Refresh a cached user from an authoritative primary-store row
    /// (replaces any existing row for the same id or email)
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub fn upsert(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO users (id, name, email, password_hash, marketing_opt_in, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.password_hash,
                user.marketing_opt_in,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find cached user by id
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, name, email, password_hash, marketing_opt_in, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional();

        Ok(discard_wrong_typed(raw, "user")?.and_then(decode_user))
    }

    /// Find cached user by email (normalized before lookup)
    #[instrument(skip(self, email))]
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, name, email, password_hash, marketing_opt_in, created_at
                 FROM users WHERE email = ?1",
                params![normalize_email(email)],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional();

        Ok(discard_wrong_typed(raw, "user")?.and_then(decode_user))
    }
}
