//! Wire records for primary-store rows
//!
//! Rows travel as JSON with millisecond-since-epoch timestamps; models
//! use `DateTime<Utc>`. Conversion lives here so the client stays free
//! of timestamp arithmetic.

use chrono::{DateTime, TimeZone, Utc};
use marquee_core::{Plan, Rental, Session, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_millis(ms: i64, field: &str) -> Result<DateTime<Utc>, Error> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::MalformedRecord(format!("{field}: {ms} out of range")))
}

/// Row in the remote `users` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub marketing_opt_in: bool,
    pub created_at: i64,
}

impl UserRecord {
    pub fn from_model(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            marketing_opt_in: user.marketing_opt_in,
            created_at: to_millis(user.created_at),
        }
    }

    pub fn into_model(self) -> Result<User, Error> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            marketing_opt_in: self.marketing_opt_in,
            created_at: from_millis(self.created_at, "users.created_at")?,
        })
    }
}

/// Row in the remote `sessions` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: i64,
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn from_model(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            user_id: session.user_id,
            created_at: to_millis(session.created_at),
            expires_at: to_millis(session.expires_at),
        }
    }

    pub fn into_model(self) -> Result<Session, Error> {
        Ok(Session {
            token: self.token,
            user_id: self.user_id,
            created_at: from_millis(self.created_at, "sessions.created_at")?,
            expires_at: from_millis(self.expires_at, "sessions.expires_at")?,
        })
    }
}

/// Row in the remote `rentals` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalRecord {
    pub id: Uuid,
    pub video_id: String,
    pub user_id: Option<Uuid>,
    pub plan: String,
    pub price_paid: u32,
    pub granted_at: i64,
    pub expires_at: i64,
}

impl RentalRecord {
    pub fn from_model(rental: &Rental) -> Self {
        Self {
            id: rental.id,
            video_id: rental.video_id.clone(),
            user_id: rental.user_id,
            plan: rental.plan.as_str().to_string(),
            price_paid: rental.price_cents,
            granted_at: to_millis(rental.granted_at),
            expires_at: to_millis(rental.expires_at),
        }
    }

    pub fn into_model(self) -> Result<Rental, Error> {
        let plan = Plan::parse(&self.plan)
            .ok_or_else(|| Error::MalformedRecord(format!("rentals.plan: {:?}", self.plan)))?;
        Ok(Rental {
            id: self.id,
            video_id: self.video_id,
            user_id: self.user_id,
            plan,
            price_cents: self.price_paid,
            granted_at: from_millis(self.granted_at, "rentals.granted_at")?,
            expires_at: from_millis(self.expires_at, "rentals.expires_at")?,
        })
    }
}
