//! Cache-backed rate limiting
//!
//! Every attempt is one cache entry at `rl:<namespace>:<ids>:<unix seconds>`
//! expiring after the window. The number of live entries under the prefix
//! is the count for the trailing window, so no cleanup pass is needed.
//! Two attempts in the same second share a key and count once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::cache::{keys, Cache, PutOptions};
use crate::error::{AppError, AppResult};
use crate::metrics;

/// Sliding-window counter for one (namespace, id tuple)
#[derive(Debug, Clone)]
pub struct RateLimiter {
    cache: Arc<Cache>,
    namespace: String,
    prefix: String,
    window: Duration,
}

impl RateLimiter {
    /// Limiter over `ids` in `namespace`
    ///
    /// A zero `window` makes attempts permanent.
    pub fn new<S: AsRef<str>>(
        cache: Arc<Cache>,
        namespace: &str,
        ids: &[S],
        window: Duration,
    ) -> Self {
        Self {
            cache,
            namespace: namespace.to_string(),
            prefix: keys::rate_limit_prefix(namespace, ids),
            window,
        }
    }

    /// Shared key prefix, `rl:<namespace>:<id1>_<id2>...`
    pub fn key_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Attempts in the current window
    ///
    /// Fails open: a scan error is logged and counted as zero.
    pub async fn count(&self) -> usize {
        match self.attempt_keys().await {
            Ok(keys) => keys.len(),
            Err(e) => {
                warn!(
                    prefix = %self.prefix,
                    error = %e,
                    "Rate limit count failed, allowing request"
                );
                0
            }
        }
    }

    /// Reject once `max` attempts are already recorded
    ///
    /// Does not record an attempt itself.
    #[instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn guard(&self, max: usize) -> AppResult<()> {
        let used = self.count().await;
        if used >= max {
            metrics::record_rate_limit_rejection(&self.namespace);
            debug!(limit = max, used, "Rate limit exceeded");
            return Err(AppError::RateLimited { limit: max, used });
        }
        Ok(())
    }

    /// Record one attempt at the current second
    pub async fn record_attempt(&self) -> AppResult<()> {
        self.put_attempt(chrono::Utc::now().timestamp()).await
    }

    /// Record one attempt at an explicit unix second
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn record_attempt_at(&self, unix_seconds: i64) -> AppResult<()> {
        self.put_attempt(unix_seconds).await
    }

    /// Delete every attempt under the prefix
    #[instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn clear(&self) -> AppResult<()> {
        let keys = self.attempt_keys().await?;
        for key in &keys {
            self.cache.delete(key).await?;
        }
        debug!(cleared = keys.len(), "Rate limiter cleared");
        Ok(())
    }

    async fn put_attempt(&self, unix_seconds: i64) -> AppResult<()> {
        let key = keys::rate_limit_attempt(&self.prefix, unix_seconds);
        self.cache
            .put_int(&key, unix_seconds, PutOptions::expire_in(self.window))
            .await?;
        Ok(())
    }

    // The trailing separator keeps `abc` from matching `abcd`'s attempts.
    async fn attempt_keys(&self) -> AppResult<Vec<String>> {
        let scan_prefix = format!("{}:", self.prefix);
        Ok(self.cache.get_keys_with_prefix(&scan_prefix).await?)
    }
}
