//! Session resolver
//!
//! Cache-aside identity resolution: the primary store is authoritative
//! whenever it is reachable; the local mirror serves synchronous reads
//! and offline fallback. Writes go remote first and are mirrored
//! locally; on unreachability they degrade to mirror-only with a warn.

use std::sync::{Arc, Mutex};

use base64::Engine;
use futures::future::{BoxFuture, FutureExt, Shared};
use rand::RngCore;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use marquee_core::{
    Database, Error, LocalIdentityCache, RemoteIdentityStore, Result, Session, User,
};

use crate::credentials::{hash_secret, verify_secret};

type RemoteHandle = Arc<dyn RemoteIdentityStore>;
type InitFuture = Shared<BoxFuture<'static, Option<User>>>;

/// Startup verification progress. A single state object owned by the
/// resolver, not free-floating flags.
enum InitState {
    Idle,
    Initializing(InitFuture),
    Ready(Option<User>),
}

/// Opaque bearer token. Identity is recovered through the stored
/// `token -> user_id` mapping, never by inspecting this value.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Produces the currently authenticated identity
pub struct SessionResolver {
    mirror: Arc<Mutex<Database>>,
    remote: Option<RemoteHandle>,
    init: Mutex<InitState>,
    ready_tx: watch::Sender<bool>,
}

impl SessionResolver {
    pub fn new(mirror: Arc<Mutex<Database>>, remote: Option<RemoteHandle>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            mirror,
            remote,
            init: Mutex::new(InitState::Idle),
            ready_tx,
        }
    }

    /// Create an account and open a session for it
    ///
    /// Email is normalized before the uniqueness check. When the primary
    /// store is unreachable the signup degrades to mirror-only.
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        secret: &str,
        marketing_opt_in: bool,
    ) -> Result<User> {
        let password_hash = hash_secret(secret)?;
        let user = User::new(name.to_string(), email, password_hash, marketing_opt_in);

        if let Some(remote) = &self.remote {
            match remote.create_user(&user).await {
                Ok(()) => {
                    {
                        let db = self.mirror.lock().unwrap();
                        db.cache_user(&user)?;
                    }
                    self.open_session(user.id).await?;
                    return Ok(user);
                }
                Err(e) if e.is_unreachable() => {
                    warn!(error = %e, "Primary store unreachable; degraded mirror-only signup");
                }
                Err(e) => return Err(e),
            }
        }

        // Mirror-only path; the UNIQUE column enforces normalized-email
        // uniqueness against the cache
        {
            let db = self.mirror.lock().unwrap();
            db.create_cached_user(&user)?;
        }
        self.open_session(user.id).await?;
        Ok(user)
    }

    /// Authenticate and open a session
    ///
    /// Never reveals whether the email or the secret was wrong.
    pub async fn login(&self, email: &str, secret: &str) -> Result<User> {
        let user = match self.lookup_for_login(email).await? {
            Some(user) => user,
            None => return Err(Error::InvalidCredentials),
        };

        if !verify_secret(secret, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }

        {
            let db = self.mirror.lock().unwrap();
            db.cache_user(&user)?;
        }
        self.open_session(user.id).await?;
        Ok(user)
    }

    async fn lookup_for_login(&self, email: &str) -> Result<Option<User>> {
        if let Some(remote) = &self.remote {
            match remote.find_user_by_email(email).await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_unreachable() => {
                    warn!(error = %e, "Primary store unreachable; login against mirror");
                }
                Err(e) => return Err(e),
            }
        }

        let db = self.mirror.lock().unwrap();
        db.find_cached_user_by_email(email)
    }

    async fn open_session(&self, user_id: Uuid) -> Result<Session> {
        let session = Session::new(generate_token(), user_id, Session::DEFAULT_HOURS);

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.create_session(&session).await {
                // The local session is the durable guarantee
                warn!(error = %e, "Could not record session remotely");
            }
        }

        let db = self.mirror.lock().unwrap();
        db.set_current_session(&session)?;
        Ok(session)
    }

    /// End the current session. Remote deletion is best-effort; the
    /// local clear always happens and this never fails.
    pub async fn logout(&self) {
        let current = {
            let db = self.mirror.lock().unwrap();
            db.current_session().unwrap_or_else(|e| {
                warn!(error = %e, "Could not read cached session during logout");
                None
            })
        };

        if let (Some(remote), Some(session)) = (&self.remote, &current) {
            if let Err(e) = remote.delete_session(&session.token).await {
                warn!(error = %e, "Could not delete remote session; local logout proceeds");
            }
        }

        let db = self.mirror.lock().unwrap();
        if let Err(e) = db.clear_current_session() {
            warn!(error = %e, "Could not clear local session");
        }
    }

    /// The current identity from the mirror only; performs no network
    /// I/O. An expired session is cleared and reads as signed-out.
    pub fn current_user_sync(&self) -> Option<User> {
        Self::resolve_sync(&self.mirror)
    }

    fn resolve_sync(mirror: &Mutex<Database>) -> Option<User> {
        let db = mirror.lock().unwrap();

        let session = match db.current_session() {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Could not read cached session");
                return None;
            }
        };

        if let Err(e) = session.ensure_valid() {
            info!(error = %e, "Clearing cached session");
            if let Err(e) = db.clear_current_session() {
                warn!(error = %e, "Could not clear expired session");
            }
            return None;
        }

        match db.find_cached_user_by_id(session.user_id) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Could not resolve cached session to a user");
                None
            }
        }
    }

    /// Verify the session against the primary store and refresh the
    /// mirror with the authoritative row; falls back to the sync path
    /// when the store is unreachable.
    pub async fn current_user_fresh(&self) -> Result<Option<User>> {
        Self::fresh(self.mirror.clone(), self.remote.clone()).await
    }

    async fn fresh(
        mirror: Arc<Mutex<Database>>,
        remote: Option<RemoteHandle>,
    ) -> Result<Option<User>> {
        let session = {
            let db = mirror.lock().unwrap();
            match db.current_session() {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, "Could not read cached session");
                    None
                }
            }
        };
        let Some(session) = session else {
            return Ok(None);
        };

        if let Err(e) = session.ensure_valid() {
            info!(error = %e, "Clearing cached session");
            let db = mirror.lock().unwrap();
            db.clear_current_session()?;
            return Ok(None);
        }

        let Some(remote) = remote else {
            return Ok(Self::resolve_sync(&mirror));
        };

        match remote.find_session(&session.token).await {
            Ok(Some(verified)) if verified.is_valid() => {
                match remote.find_user_by_id(verified.user_id).await {
                    Ok(Some(user)) => {
                        let db = mirror.lock().unwrap();
                        db.cache_user(&user)?;
                        Ok(Some(user))
                    }
                    Ok(None) => {
                        let db = mirror.lock().unwrap();
                        db.clear_current_session()?;
                        Ok(None)
                    }
                    Err(e) if e.is_unreachable() => {
                        warn!(error = %e, "Primary store unreachable; using mirror");
                        Ok(Self::resolve_sync(&mirror))
                    }
                    Err(e) => Err(e),
                }
            }
            Ok(_) => {
                // Expired or unknown to the primary store: terminal for
                // this session
                let db = mirror.lock().unwrap();
                db.clear_current_session()?;
                Ok(None)
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "Primary store unreachable; using mirror");
                Ok(Self::resolve_sync(&mirror))
            }
            Err(e) => Err(e),
        }
    }

    /// Idempotent startup verification. Concurrent callers share one
    /// in-flight round trip; completion fires the auth-ready signal.
    pub async fn initialize_on_startup(&self) -> Option<User> {
        let fut = {
            let mut state = self.init.lock().unwrap();
            match &*state {
                InitState::Ready(user) => return user.clone(),
                InitState::Initializing(fut) => fut.clone(),
                InitState::Idle => {
                    let mirror = self.mirror.clone();
                    let remote = self.remote.clone();
                    let fut: InitFuture = async move {
                        match Self::fresh(mirror, remote).await {
                            Ok(user) => user,
                            Err(e) => {
                                warn!(error = %e, "Startup verification failed");
                                None
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    *state = InitState::Initializing(fut.clone());
                    fut
                }
            }
        };

        let user = fut.await;

        let mut state = self.init.lock().unwrap();
        if matches!(&*state, InitState::Initializing(_)) {
            *state = InitState::Ready(user.clone());
            // send() drops the value when no receiver is alive;
            // send_replace stores it so late subscribers still see it
            self.ready_tx.send_replace(true);
        }
        user
    }

    /// One-shot auth-ready signal: flips to true once startup
    /// verification completes. Components that rendered before identity
    /// was known watch this to re-check.
    pub fn auth_ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }
}
