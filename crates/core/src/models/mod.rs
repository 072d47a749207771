//! Data models for Marquee

mod rental;
mod user;

pub use rental::*;
pub use user::*;
