//! Marquee primary-store client
//!
//! HTTP/JSON client for the remote store backing identities, sessions,
//! and rentals, plus the connection settings that toggle remote mode.

pub mod client;
pub mod config;
pub mod error;
pub mod records;

pub use client::HttpStore;
pub use config::{Config, StoreConfig};
pub use error::{Error, Result};
