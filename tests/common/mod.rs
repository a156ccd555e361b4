//! Common test utilities for Warden
//!
//! Shared fixtures for building caches over each engine, configuration
//! and token records.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use warden::auth::{AccessTokenRecord, TokenKind};
use warden::cache::{Cache, EmbeddedEngine, InMemoryEngine};
use warden::config::{Config, EmbeddedConfig};

/// Test configuration constants
pub mod constants {
    /// Phone number used by rate limit and OTP scenarios
    pub const TEST_PHONE: &str = "+886900000000";
    pub const TEST_EMAIL: &str = "test@example.com";
    pub const TEST_ADMIN_ID: &str = "admin_1";
}

/// Configuration with every default and the given overrides
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// Fresh in-memory cache
pub fn memory_cache() -> Arc<Cache> {
    Arc::new(Cache::new(Arc::new(InMemoryEngine::new())))
}

/// Embedded cache stored under `dir`
pub fn embedded_cache(dir: &Path) -> Arc<Cache> {
    let config = EmbeddedConfig {
        path: dir.to_path_buf(),
        in_memory: false,
        disable_logging: true,
    };
    Arc::new(Cache::new(Arc::new(EmbeddedEngine::open(&config).unwrap())))
}

/// Admin token expiring `hours` from now
pub fn admin_token(hours: i64) -> AccessTokenRecord {
    AccessTokenRecord::issue(
        TokenKind::Admin,
        constants::TEST_ADMIN_ID,
        Some(Utc::now() + Duration::hours(hours)),
    )
}

/// Admin token already marked revoked in its durable record
pub fn revoked_admin_token(hours: i64) -> AccessTokenRecord {
    let mut record = admin_token(hours);
    record.revoked_at = Some(Utc::now());
    record
}
