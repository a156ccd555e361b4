//! Test doubles for external services
//!
//! - Redis (networked cache engine)

pub mod redis;

pub use self::redis::*;
