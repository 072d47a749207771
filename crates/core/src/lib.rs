//! Marquee Core Library
//!
//! Domain models, error taxonomy, the local mirror (SQLite), and the
//! primary-store trait seams for the Marquee rental storefront.

pub mod error;
pub mod models;
pub mod remote;
pub mod storage;

pub use error::{Error, Result};
pub use models::*;
pub use remote::{RemoteIdentityStore, RemoteRentalStore};
pub use storage::{Database, LocalIdentityCache, LocalRentalCache, Mirror};
