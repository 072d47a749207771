//! Application state wiring
//!
//! One long-lived `AppState` per process owns the mirror, the optional
//! primary-store client, the resolver, and the rental library.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;

use marquee_core::{Database, Error, RemoteIdentityStore, RemoteRentalStore, Result};
use marquee_net::{Config, HttpStore};

use crate::entitlements::RentalLibrary;
use crate::resolver::SessionResolver;

/// Main application state
pub struct AppState {
    pub resolver: Arc<SessionResolver>,
    pub rentals: Arc<RentalLibrary>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => Self::data_path()?,
        };
        std::fs::create_dir_all(&data_dir)?;

        let mirror = Arc::new(Mutex::new(Database::open(data_dir.join("marquee.db"))?));

        let store = match &config.store {
            Some(store_config) => {
                Some(Arc::new(HttpStore::new(store_config).map_err(Error::from)?))
            }
            None => None,
        };

        let resolver = Arc::new(SessionResolver::new(
            mirror.clone(),
            store
                .clone()
                .map(|s| s as Arc<dyn RemoteIdentityStore>),
        ));
        let rentals = Arc::new(RentalLibrary::new(
            mirror,
            resolver.clone(),
            store.map(|s| s as Arc<dyn RemoteRentalStore>),
        ));

        Ok(Self { resolver, rentals })
    }

    fn data_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "marquee", "marquee").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;

        Ok(dirs.data_dir().to_path_buf())
    }

    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "marquee", "marquee")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
