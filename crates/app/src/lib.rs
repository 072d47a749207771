//! Marquee application layer
//!
//! Composes the local mirror and the primary-store client into the
//! Session Resolver and the Rental Library. Callers go through
//! `AppState`, one long-lived instance per process.

pub mod credentials;
pub mod entitlements;
pub mod resolver;
pub mod state;

#[cfg(test)]
mod testing;

pub use entitlements::RentalLibrary;
pub use resolver::SessionResolver;
pub use state::AppState;
