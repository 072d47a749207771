//! Current-session storage
//!
//! The device holds at most one session. The token -> user_id mapping is
//! written here at session creation, so identity recovery never has to
//! inspect the token itself.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{instrument, warn};

use super::parse::{discard_wrong_typed, parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::Session;

type RawSession = (String, String, String, String);

fn decode_session(raw: RawSession) -> Option<Session> {
    let (token, user_id, created_at, expires_at) = raw;

    let user_id = match parse_uuid(&user_id) {
        Ok(id) => id,
        Err(_) => {
            warn!("Discarding cached session with malformed user_id");
            return None;
        }
    };
    let created_at = match parse_datetime(&created_at) {
        Ok(dt) => dt,
        Err(_) => {
            warn!("Discarding cached session with malformed created_at");
            return None;
        }
    };
    let expires_at = match parse_datetime(&expires_at) {
        Ok(dt) => dt,
        Err(_) => {
            warn!("Discarding cached session with malformed expires_at");
            return None;
        }
    };

    Some(Session {
        token,
        user_id,
        created_at,
        expires_at,
    })
}

pub struct SessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Make this the device's current session, replacing any previous one
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub fn set_current(&self, session: &Session) -> Result<()> {
        self.conn.execute("DELETE FROM sessions", [])?;
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.user_id.to_string(),
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The device's current session, expired or not; callers decide what
    /// an expired one means
    #[instrument(skip(self))]
    pub fn current(&self) -> Result<Option<Session>> {
        let raw = self
            .conn
            .query_row(
                "SELECT token, user_id, created_at, expires_at FROM sessions LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional();

        Ok(discard_wrong_typed(raw, "session")?.and_then(decode_session))
    }

    /// Drop the current session unconditionally
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM sessions", [])?;
        Ok(())
    }

    /// Clean up expired sessions
    pub fn cleanup_expired(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::storage::Database;
    use uuid::Uuid;

    fn create_test_user(db: &Database) -> Uuid {
        let user = User::new(
            "Test".to_string(),
            &format!("{}@example.com", Uuid::new_v4()),
            "hash".to_string(),
            false,
        );
        db.users().create(&user).unwrap();
        user.id
    }

    #[test]
    fn test_set_current_replaces_previous() {
        let db = Database::open_in_memory().unwrap();
        let user_id = create_test_user(&db);

        let first = Session::new("tok-1".to_string(), user_id, 24);
        let second = Session::new("tok-2".to_string(), user_id, 24);
        db.sessions().set_current(&first).unwrap();
        db.sessions().set_current(&second).unwrap();

        let current = db.sessions().current().unwrap().unwrap();
        assert_eq!(current.token, "tok-2");
        assert_eq!(current.user_id, user_id);
    }

    #[test]
    fn test_clear_removes_session() {
        let db = Database::open_in_memory().unwrap();
        let user_id = create_test_user(&db);

        let session = Session::new("tok".to_string(), user_id, 24);
        db.sessions().set_current(&session).unwrap();
        db.sessions().clear().unwrap();

        assert!(db.sessions().current().unwrap().is_none());
    }

    #[test]
    fn test_wrong_typed_column_reads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        let user_id = create_test_user(&db);
        // created_at holds a blob; typed extraction fails before decoding
        db.conn
            .execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES ('tok', ?1, x'00ff', '2999-01-01T00:00:00+00:00')",
                params![user_id.to_string()],
            )
            .unwrap();

        assert!(db.sessions().current().unwrap().is_none());
    }

    #[test]
    fn test_malformed_session_reads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        let user_id = create_test_user(&db);
        db.conn
            .execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES ('tok', ?1, 'garbage', 'garbage')",
                params![user_id.to_string()],
            )
            .unwrap();

        assert!(db.sessions().current().unwrap().is_none());
    }
}
