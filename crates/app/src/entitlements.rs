//! Rental entitlement library
//!
//! In-memory view over the current identity's unexpired grants.
//! `load_for_current_user` is a required initialization step: until it
//! runs, synchronous queries see an empty list.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use marquee_core::{Database, LocalRentalCache, Plan, RemoteRentalStore, Rental, Result};

use crate::resolver::SessionResolver;

type RemoteHandle = Arc<dyn RemoteRentalStore>;

/// Records and queries time-boxed access grants
pub struct RentalLibrary {
    mirror: Arc<Mutex<Database>>,
    resolver: Arc<SessionResolver>,
    remote: Option<RemoteHandle>,
    loaded: Mutex<Vec<Rental>>,
}

impl RentalLibrary {
    pub fn new(
        mirror: Arc<Mutex<Database>>,
        resolver: Arc<SessionResolver>,
        remote: Option<RemoteHandle>,
    ) -> Self {
        Self {
            mirror,
            resolver,
            remote,
            loaded: Mutex::new(Vec::new()),
        }
    }

    fn current_user_id(&self) -> Option<Uuid> {
        self.resolver.current_user_sync().map(|user| user.id)
    }

    /// Populate the in-memory list with the resolved identity's
    /// unexpired grants. With a primary store configured and no
    /// identity, the list is empty; unreachable or local-only falls
    /// back to the device-scoped cache.
    pub async fn load_for_current_user(&self) -> Result<()> {
        let user_id = self.current_user_id();

        let rentals = match (&self.remote, user_id) {
            (Some(remote), Some(uid)) => match remote.list_active_rentals(uid).await {
                Ok(rentals) => {
                    let db = self.mirror.lock().unwrap();
                    db.replace_cached_rentals(uid, &rentals)?;
                    rentals
                }
                Err(e) if e.is_unreachable() => {
                    warn!(error = %e, "Primary store unreachable; loading cached rentals");
                    let db = self.mirror.lock().unwrap();
                    db.active_cached_rentals(Some(uid), Utc::now())?
                }
                Err(e) => return Err(e),
            },
            // Entitlements are never anonymous when a remote store is
            // configured
            (Some(_), None) => Vec::new(),
            (None, uid) => {
                let db = self.mirror.lock().unwrap();
                db.active_cached_rentals(uid, Utc::now())?
            }
        };

        *self.loaded.lock().unwrap() = rentals;
        Ok(())
    }

    /// True iff a loaded grant for this video is unexpired. Pure over
    /// loaded state; no I/O.
    pub fn is_active(&self, video_id: &str) -> bool {
        self.is_active_at(video_id, Utc::now())
    }

    pub fn is_active_at(&self, video_id: &str, at: DateTime<Utc>) -> bool {
        self.loaded
            .lock()
            .unwrap()
            .iter()
            .any(|rental| rental.video_id == video_id && rental.is_active_at(at))
    }

    /// Number of currently active loaded grants
    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        self.loaded
            .lock()
            .unwrap()
            .iter()
            .filter(|rental| rental.is_active_at(now))
            .count()
    }

    /// Record a new grant for `expires_at = now + plan.duration()`.
    ///
    /// Never deduplicates against existing unexpired grants for the
    /// same video: a re-grant adds another valid window.
    pub async fn grant(&self, video_id: &str, plan: Plan) -> Result<Rental> {
        let user_id = self.current_user_id();
        let rental = Rental::grant(video_id.to_string(), user_id, plan);

        match (&self.remote, user_id) {
            (Some(remote), Some(_)) => match remote.create_rental(&rental).await {
                Ok(()) => self.cache_grant(&rental)?,
                Err(e) if e.is_unreachable() => {
                    warn!(error = %e, "Primary store unreachable; recording grant locally only");
                    self.cache_grant(&rental)?;
                }
                Err(e) => return Err(e),
            },
            _ => self.cache_grant(&rental)?,
        }

        self.loaded.lock().unwrap().push(rental.clone());
        Ok(rental)
    }

    /// Write-through to the mirror. Already-expired grants for the same
    /// video are dropped first; no observable effect on active queries.
    fn cache_grant(&self, rental: &Rental) -> Result<()> {
        let db = self.mirror.lock().unwrap();
        db.prune_expired_for_video(&rental.video_id, rental.granted_at)?;
        db.cache_rental(rental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_mirror, FakeRemote};
    use chrono::Duration;
    use marquee_core::RemoteIdentityStore;

    fn local_only_library() -> RentalLibrary {
        let mirror = memory_mirror();
        let resolver = Arc::new(SessionResolver::new(mirror.clone(), None));
        RentalLibrary::new(mirror, resolver, None)
    }

    fn remote_library(remote: &Arc<FakeRemote>) -> (RentalLibrary, Arc<SessionResolver>) {
        let mirror = memory_mirror();
        let resolver = Arc::new(SessionResolver::new(
            mirror.clone(),
            Some(remote.clone() as Arc<dyn RemoteIdentityStore>),
        ));
        let library = RentalLibrary::new(
            mirror,
            resolver.clone(),
            Some(remote.clone() as Arc<dyn RemoteRentalStore>),
        );
        (library, resolver)
    }

    #[tokio::test]
    async fn test_is_active_lifecycle() {
        let library = local_only_library();
        library.load_for_current_user().await.unwrap();

        assert!(!library.is_active("vid-1"));

        let rental = library.grant("vid-1", Plan::Hours24).await.unwrap();
        assert!(library.is_active("vid-1"));
        assert!(library.is_active_at("vid-1", rental.expires_at - Duration::milliseconds(1)));
        assert!(!library.is_active_at("vid-1", rental.expires_at));
        assert!(!library
            .is_active_at("vid-1", rental.granted_at + Duration::hours(24) + Duration::milliseconds(1)));

        // Other videos stay inactive
        assert!(!library.is_active("vid-2"));
    }

    #[tokio::test]
    async fn test_overlapping_grants_union_window() {
        let library = local_only_library();
        library.load_for_current_user().await.unwrap();

        let first = library.grant("vid-1", Plan::Hours48).await.unwrap();
        let second = library.grant("vid-1", Plan::Hours72).await.unwrap();

        // Continuous coverage across the first window's end
        assert!(library.is_active_at("vid-1", first.expires_at - Duration::milliseconds(1)));
        assert!(library.is_active_at("vid-1", first.expires_at));
        assert!(library.is_active_at("vid-1", first.expires_at + Duration::milliseconds(1)));

        // Never shorter than the longer plan from its own grant instant
        assert!(library
            .is_active_at("vid-1", second.granted_at + Duration::hours(72) - Duration::milliseconds(1)));
        assert!(!library.is_active_at("vid-1", second.expires_at));
    }

    #[tokio::test]
    async fn test_grants_persist_to_device_cache() {
        let mirror = memory_mirror();
        let resolver = Arc::new(SessionResolver::new(mirror.clone(), None));
        let library = RentalLibrary::new(mirror.clone(), resolver.clone(), None);

        library.grant("vid-1", Plan::Hours24).await.unwrap();

        // A fresh library over the same mirror sees the grant after load
        let library2 = RentalLibrary::new(mirror, resolver, None);
        assert!(!library2.is_active("vid-1"));
        library2.load_for_current_user().await.unwrap();
        assert!(library2.is_active("vid-1"));
    }

    #[tokio::test]
    async fn test_anonymous_is_empty_when_remote_configured() {
        let remote = Arc::new(FakeRemote::new());
        let (library, _resolver) = remote_library(&remote);

        // Device cache has a grant, but nobody is signed in
        {
            let db = library.mirror.lock().unwrap();
            db.cache_rental(&Rental::grant("vid-1".to_string(), None, Plan::Hours24))
                .unwrap();
        }

        library.load_for_current_user().await.unwrap();
        assert!(!library.is_active("vid-1"));
        assert_eq!(library.active_count(), 0);
    }

    #[tokio::test]
    async fn test_load_mirrors_remote_grants() {
        let remote = Arc::new(FakeRemote::new());
        let (library, resolver) = remote_library(&remote);

        resolver
            .sign_up("Ada", "ada@example.com", "hunter2", false)
            .await
            .unwrap();
        library.load_for_current_user().await.unwrap();
        library.grant("vid-1", Plan::Hours24).await.unwrap();

        // Offline now: the mirrored copy still answers
        remote.set_unreachable(true);
        library.load_for_current_user().await.unwrap();
        assert!(library.is_active("vid-1"));
    }

    #[tokio::test]
    async fn test_grant_degrades_to_mirror_when_unreachable() {
        let remote = Arc::new(FakeRemote::new());
        let (library, resolver) = remote_library(&remote);

        resolver
            .sign_up("Ada", "ada@example.com", "hunter2", false)
            .await
            .unwrap();
        library.load_for_current_user().await.unwrap();

        remote.set_unreachable(true);
        library.grant("vid-1", Plan::Hours48).await.unwrap();
        assert!(library.is_active("vid-1"));

        // Still present after a reload from the mirror
        library.load_for_current_user().await.unwrap();
        assert!(library.is_active("vid-1"));
    }
}
