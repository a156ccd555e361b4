//! Warden - cache-backed token revocation and rate limiting
//!
//! This library provides a typed cache over interchangeable storage engines
//! (in-process map, embedded on-disk store, Redis) and the authentication
//! state built on it: the token revocation list, sliding-window rate limiters
//! and one-time verification codes.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod otp;
pub mod rate_limiter;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

pub use crate::auth::{Authenticator, RevocationList, TokenStore};
pub use crate::cache::{Cache, PutOptions};
pub use crate::config::Config;
pub use crate::error::{AppError, AppResult, CacheError, CacheResult};
pub use crate::otp::OneTimeCodes;
pub use crate::rate_limiter::RateLimiter;

/// Application state shared by every consumer
pub struct AppState {
    pub config: Config,
    pub start_time: Instant,
    pub cache: Arc<Cache>,
    pub token_store: Arc<dyn TokenStore>,
    pub revocations: Arc<RevocationList>,
    pub authenticator: Arc<Authenticator>,
    pub one_time_codes: Arc<OneTimeCodes>,
}

impl AppState {
    /// Create a new application state
    ///
    /// Opens the configured cache engine and restores the revocation list.
    /// Fails if either step fails; the service must not start with an
    /// unknown revocation state.
    pub async fn new(config: Config, token_store: Arc<dyn TokenStore>) -> Result<Self> {
        let cache = Arc::new(
            cache::open(&config.cache)
                .await
                .context("Failed to open cache engine")?,
        );
        Self::with_cache(config, cache, token_store).await
    }

    /// Create the state over an already-open cache
    pub async fn with_cache(
        config: Config,
        cache: Arc<Cache>,
        token_store: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let revocations = Arc::new(RevocationList::new(cache.clone(), token_store.clone()));
        let loaded = revocations
            .load_revocation_list()
            .await
            .context("Failed to load revocation list")?;
        info!(revocations = loaded, engine = cache.engine_name(), "Application state ready");

        let authenticator = Arc::new(Authenticator::new(revocations.clone()));
        let one_time_codes = Arc::new(OneTimeCodes::new(cache.clone(), config.otp.clone()));

        Ok(Self {
            config,
            start_time: Instant::now(),
            cache,
            token_store,
            revocations,
            authenticator,
            one_time_codes,
        })
    }

    /// Rate limiter over the shared cache
    pub fn rate_limiter<S: AsRef<str>>(
        &self,
        namespace: &str,
        ids: &[S],
        window: std::time::Duration,
    ) -> RateLimiter {
        RateLimiter::new(self.cache.clone(), namespace, ids, window)
    }

    /// Close the cache engine
    pub async fn shutdown(&self) -> Result<()> {
        self.cache.close().await.context("Failed to close cache")?;
        info!(uptime_secs = self.start_time.elapsed().as_secs(), "Cache closed");
        Ok(())
    }
}
