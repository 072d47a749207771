//! Cached rental storage
//!
//! Mirrors the primary store's rentals for one user, plus the
//! device-scoped list (user_id NULL) used when no identity is resolved.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, parse_uuid_opt};
use crate::error::Result;
use crate::models::{Plan, Rental};

type RawRental = (
    String,
    String,
    Option<String>,
    String,
    u32,
    String,
    String,
);

fn decode_rental(raw: RawRental) -> Option<Rental> {
    let (id, video_id, user_id, plan, price_cents, granted_at, expires_at) = raw;

    let id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(_) => {
            warn!(%video_id, "Discarding cached rental with malformed id");
            return None;
        }
    };
    let user_id = match parse_uuid_opt(user_id) {
        Ok(uid) => uid,
        Err(_) => {
            warn!(%video_id, "Discarding cached rental with malformed user_id");
            return None;
        }
    };
    let plan = match Plan::parse(&plan) {
        Some(plan) => plan,
        None => {
            warn!(%video_id, %plan, "Discarding cached rental with unknown plan");
            return None;
        }
    };
    let granted_at = match parse_datetime(&granted_at) {
        Ok(dt) => dt,
        Err(_) => {
            warn!(%video_id, "Discarding cached rental with malformed granted_at");
            return None;
        }
    };
    let expires_at = match parse_datetime(&expires_at) {
        Ok(dt) => dt,
        Err(_) => {
            warn!(%video_id, "Discarding cached rental with malformed expires_at");
            return None;
        }
    };

    Some(Rental {
        id,
        video_id,
        user_id,
        plan,
        price_cents,
        granted_at,
        expires_at,
    })
}

/// A wrong-typed column fails inside the row mapper, before
/// `decode_rental` ever sees the row; such rows are discarded with a
/// warn so one corrupt row never fails a cached read
fn collect_active(rows: impl Iterator<Item = rusqlite::Result<RawRental>>) -> Vec<Rental> {
    let mut rentals = Vec::new();
    for row in rows {
        match row {
            Ok(raw) => rentals.extend(decode_rental(raw)),
            Err(e) => warn!(error = %e, "Discarding cached rental row with wrong-typed column"),
        }
    }
    rentals
}

pub struct RentalStore<'a> {
    conn: &'a Connection,
}

impl<'a> RentalStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Cache a single grant
    #[instrument(skip(self, rental), fields(video_id = %rental.video_id))]
    pub fn save(&self, rental: &Rental) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO rentals
                 (id, video_id, user_id, plan, price_cents, granted_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rental.id.to_string(),
                rental.video_id,
                rental.user_id.map(|id| id.to_string()),
                rental.plan.as_str(),
                rental.price_cents,
                rental.granted_at.to_rfc3339(),
                rental.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Replace all cached rentals for a user with authoritative rows
    #[instrument(skip(self, rentals), fields(count = rentals.len()))]
    pub fn replace_for_user(&self, user_id: Uuid, rentals: &[Rental]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM rentals WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        for rental in rentals {
            self.save(rental)?;
        }
        Ok(())
    }

    /// Unexpired cached rentals for a user, or the device-scoped list
    /// when `user_id` is None
    #[instrument(skip(self))]
    pub fn list_active(
        &self,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Rental>> {
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<RawRental> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        };

        let now = now.to_rfc3339();
        let rentals = match user_id {
            Some(uid) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, video_id, user_id, plan, price_cents, granted_at, expires_at
                     FROM rentals WHERE user_id = ?1 AND expires_at > ?2",
                )?;
                let rows = stmt.query_map(params![uid.to_string(), now], map_row)?;
                collect_active(rows)
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, video_id, user_id, plan, price_cents, granted_at, expires_at
                     FROM rentals WHERE user_id IS NULL AND expires_at > ?1",
                )?;
                let rows = stmt.query_map(params![now], map_row)?;
                collect_active(rows)
            }
        };

        Ok(rentals)
    }

    /// Drop already-expired grants for one video before appending a new
    /// one; no observable effect on active queries
    pub fn prune_expired_for_video(&self, video_id: &str, now: DateTime<Utc>) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM rentals WHERE video_id = ?1 AND expires_at <= ?2",
            params![video_id, now.to_rfc3339()],
        )?;
        Ok(count as u64)
    }

    /// Clean up all expired grants
    pub fn cleanup_expired(&self) -> Result<u64> {
        let count = self.conn.execute(
            "DELETE FROM rentals WHERE expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::storage::Database;

    #[test]
    fn test_save_and_list_active_scoped_by_user() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let mine = Rental::grant_at("vid-1".to_string(), Some(user_id), Plan::Hours24, now);
        let anon = Rental::grant_at("vid-2".to_string(), None, Plan::Hours24, now);
        db.rentals().save(&mine).unwrap();
        db.rentals().save(&anon).unwrap();

        let for_user = db.rentals().list_active(Some(user_id), now).unwrap();
        assert_eq!(for_user.len(), 1);
        assert_eq!(for_user[0].video_id, "vid-1");

        let device = db.rentals().list_active(None, now).unwrap();
        assert_eq!(device.len(), 1);
        assert_eq!(device[0].video_id, "vid-2");
    }

    #[test]
    fn test_expired_rentals_not_listed() {
        let db = Database::open_in_memory().unwrap();
        let granted = Utc::now() - Duration::hours(25);

        let rental = Rental::grant_at("vid-1".to_string(), None, Plan::Hours24, granted);
        db.rentals().save(&rental).unwrap();

        assert!(db.rentals().list_active(None, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_replace_for_user_reconciles() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let stale = Rental::grant_at("vid-old".to_string(), Some(user_id), Plan::Hours24, now);
        db.rentals().save(&stale).unwrap();

        let fresh = Rental::grant_at("vid-new".to_string(), Some(user_id), Plan::Hours48, now);
        db.rentals().replace_for_user(user_id, &[fresh]).unwrap();

        let listed = db.rentals().list_active(Some(user_id), now).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].video_id, "vid-new");
    }

    #[test]
    fn test_prune_expired_keeps_unexpired() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        let expired =
            Rental::grant_at("vid-1".to_string(), None, Plan::Hours24, now - Duration::hours(30));
        let live = Rental::grant_at("vid-1".to_string(), None, Plan::Hours48, now);
        db.rentals().save(&expired).unwrap();
        db.rentals().save(&live).unwrap();

        let pruned = db.rentals().prune_expired_for_video("vid-1", now).unwrap();
        assert_eq!(pruned, 1);

        let listed = db.rentals().list_active(None, now).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);
    }

    #[test]
    fn test_wrong_typed_column_reads_as_empty() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        // price_cents holds text; typed extraction fails before decoding
        db.conn
            .execute(
                "INSERT INTO rentals (id, video_id, user_id, plan, price_cents, granted_at, expires_at)
                 VALUES ('corrupt', 'vid-1', NULL, '24', 'not-a-number', ?1, '2999-01-01T00:00:00+00:00')",
                params![now.to_rfc3339()],
            )
            .unwrap();
        assert!(db.rentals().list_active(None, now).unwrap().is_empty());

        // A healthy row alongside the corrupt one still lists
        let live = Rental::grant_at("vid-2".to_string(), None, Plan::Hours24, now);
        db.rentals().save(&live).unwrap();

        let listed = db.rentals().list_active(None, now).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, live.id);
    }

    #[test]
    fn test_malformed_rental_reads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO rentals (id, video_id, user_id, plan, price_cents, granted_at, expires_at)
                 VALUES ('bad', 'vid-1', NULL, '24', 399, 'garbage', '2999-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        assert!(db.rentals().list_active(None, Utc::now()).unwrap().is_empty());
    }
}
