//! Test doubles for the primary store

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use marquee_core::{
    normalize_email, Database, Error, Rental, RemoteIdentityStore, RemoteRentalStore, Result,
    Session, User,
};

pub fn memory_mirror() -> Arc<Mutex<Database>> {
    Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
}

/// In-memory primary store with a reachability switch
#[derive(Default)]
pub struct FakeRemote {
    users: Mutex<Vec<User>>,
    sessions: Mutex<Vec<Session>>,
    rentals: Mutex<Vec<Rental>>,
    unreachable: AtomicBool,
    /// Session lookups issued against the store
    pub session_lookups: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, value: bool) {
        self.unreachable.store(value, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(Error::StoreUnreachable("fake store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteIdentityStore for FakeRemote {
    async fn create_user(&self, user: &User) -> Result<()> {
        self.check_reachable()?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(Error::DuplicateEmail);
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.check_reachable()?;
        let email = normalize_email(email);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.check_reachable()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        self.check_reachable()?;
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>> {
        self.session_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        self.check_reachable()?;
        self.sessions.lock().unwrap().retain(|s| s.token != token);
        Ok(())
    }
}

#[async_trait]
impl RemoteRentalStore for FakeRemote {
    async fn list_active_rentals(&self, user_id: Uuid) -> Result<Vec<Rental>> {
        self.check_reachable()?;
        let now = Utc::now();
        Ok(self
            .rentals
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == Some(user_id) && r.is_active_at(now))
            .cloned()
            .collect())
    }

    async fn create_rental(&self, rental: &Rental) -> Result<()> {
        self.check_reachable()?;
        self.rentals.lock().unwrap().push(rental.clone());
        Ok(())
    }
}
