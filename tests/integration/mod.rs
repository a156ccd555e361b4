//! Integration tests for Warden
//!
//! These tests exercise the cache façade over every engine and the
//! revocation, rate limiting and one-time code flows built on it.

mod rate_limiting;
mod revocation;
