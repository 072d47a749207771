//! HTTP client for the primary store
//!
//! Speaks PostgREST-style row filters (`email=eq.<value>`) against
//! `<endpoint>/rest/v1/<table>`. Implements the core remote traits;
//! transport failures convert to `StoreUnreachable` at that boundary so
//! the resolver can fall back to the local mirror.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use marquee_core::{
    normalize_email, Rental, RemoteIdentityStore, RemoteRentalStore, Session, User,
};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::records::{RentalRecord, SessionRecord, UserRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client handle for the remote store
pub struct HttpStore {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.endpoint, table)
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .http
            .get(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(filters)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }

    async fn insert_row<T: Serialize>(&self, table: &str, row: &T) -> Result<()> {
        let response = self
            .http
            .post(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(Error::Conflict);
        }
        if !status.is_success() {
            return Err(Error::UnexpectedResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }

    async fn delete_rows(&self, table: &str, filters: &[(&str, String)]) -> Result<()> {
        let response = self
            .http
            .delete(self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(filters)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteIdentityStore for HttpStore {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: &User) -> marquee_core::Result<()> {
        self.insert_row("users", &UserRecord::from_model(user))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, email))]
    async fn find_user_by_email(&self, email: &str) -> marquee_core::Result<Option<User>> {
        let filters = [("email", format!("eq.{}", normalize_email(email)))];
        let mut rows: Vec<UserRecord> = self.fetch_rows("users", &filters).await?;

        match rows.pop() {
            Some(record) => Ok(Some(record.into_model()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, id: Uuid) -> marquee_core::Result<Option<User>> {
        let filters = [("id", format!("eq.{id}"))];
        let mut rows: Vec<UserRecord> = self.fetch_rows("users", &filters).await?;

        match rows.pop() {
            Some(record) => Ok(Some(record.into_model()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn create_session(&self, session: &Session) -> marquee_core::Result<()> {
        self.insert_row("sessions", &SessionRecord::from_model(session))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn find_session(&self, token: &str) -> marquee_core::Result<Option<Session>> {
        let filters = [("token", format!("eq.{token}"))];
        let mut rows: Vec<SessionRecord> = self.fetch_rows("sessions", &filters).await?;

        match rows.pop() {
            Some(record) => Ok(Some(record.into_model()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, token))]
    async fn delete_session(&self, token: &str) -> marquee_core::Result<()> {
        let filters = [("token", format!("eq.{token}"))];
        self.delete_rows("sessions", &filters).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteRentalStore for HttpStore {
    #[instrument(skip(self))]
    async fn list_active_rentals(&self, user_id: Uuid) -> marquee_core::Result<Vec<Rental>> {
        let filters = [
            ("user_id", format!("eq.{user_id}")),
            ("expires_at", format!("gt.{}", Utc::now().timestamp_millis())),
        ];
        let rows: Vec<RentalRecord> = self.fetch_rows("rentals", &filters).await?;

        let mut rentals = Vec::with_capacity(rows.len());
        for record in rows {
            match record.into_model() {
                Ok(rental) => rentals.push(rental),
                Err(e) => debug!(error = %e, "Skipping malformed rental row"),
            }
        }
        Ok(rentals)
    }

    #[instrument(skip(self, rental), fields(video_id = %rental.video_id))]
    async fn create_rental(&self, rental: &Rental) -> marquee_core::Result<()> {
        self.insert_row("rentals", &RentalRecord::from_model(rental))
            .await?;
        Ok(())
    }
}
