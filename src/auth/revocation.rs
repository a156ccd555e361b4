//! Token revocation list
//!
//! A cache-backed denylist of token ids. Each revoked token gets a marker
//! at `auth:revoked_<id>` that lives until the token's own expiry plus a
//! safety margin, so the list only ever holds tokens that would otherwise
//! still be accepted. The durable `revoked_at` flag on the token record is
//! the source of truth; `load_revocation_list` rebuilds the markers from it
//! after a restart.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::token::{AccessTokenRecord, TokenKind, TokenStore};
use crate::cache::{keys, Cache, PutOptions};
use crate::error::{AppError, AppResult};
use crate::metrics;

/// Extra lifetime given to a marker past the token's expiry
pub const REVOCATION_MARGIN: Duration = Duration::from_secs(60 * 60);

/// Lifetime of a marker whose deadline has already passed
///
/// Non-zero, since a zero expiration means the marker never expires.
pub const MIN_MARKER_TTL: Duration = Duration::from_millis(1);

/// Revocation list over the shared cache and the durable token store
pub struct RevocationList {
    cache: Arc<Cache>,
    store: Arc<dyn TokenStore>,
}

impl RevocationList {
    pub fn new(cache: Arc<Cache>, store: Arc<dyn TokenStore>) -> Self {
        Self { cache, store }
    }

    /// Revoke a token
    ///
    /// Persists `revoked_at` on the record (kept if already set), then writes
    /// the cache marker. Returns the stored record.
    #[instrument(skip(self, record), fields(token_id = %record.id))]
    pub async fn revoke(&self, mut record: AccessTokenRecord) -> AppResult<AccessTokenRecord> {
        let now = Utc::now();
        if record.revoked_at.is_none() {
            record.revoked_at = Some(now);
            self.store.save(&record).await?;
        }

        self.mark_revoked(&record, now).await?;
        metrics::record_token_revoked(record.kind.as_str());
        info!(kind = %record.kind, "Access token revoked");

        Ok(record)
    }

    /// Revoke the token with this id (logout)
    pub async fn revoke_by_id(&self, token_id: &str) -> AppResult<AccessTokenRecord> {
        let record = self
            .store
            .find(token_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("access token {}", token_id)))?;
        self.revoke(record).await
    }

    /// Whether a revocation marker exists for this token id
    pub async fn is_revoked(&self, token_id: &str) -> AppResult<bool> {
        Ok(self.cache.has(&keys::revoked_token(token_id)).await?)
    }

    /// Restore markers for every revoked, unexpired token in the store
    ///
    /// Must complete before the service accepts traffic; any failure is
    /// returned to the caller.
    pub async fn load_revocation_list(&self) -> AppResult<usize> {
        let now = Utc::now();
        let mut loaded = 0;

        for kind in TokenKind::ALL {
            let records = self.store.revoked_unexpired(kind, now).await?;
            for record in &records {
                self.mark_revoked(record, now).await?;
            }
            debug!(kind = %kind, count = records.len(), "Revocation markers restored");
            loaded += records.len();
        }

        metrics::set_revocations_loaded(loaded);
        info!(count = loaded, "Revocation list loaded");
        Ok(loaded)
    }

    async fn mark_revoked(&self, record: &AccessTokenRecord, now: DateTime<Utc>) -> AppResult<()> {
        let options = PutOptions {
            expiration: revocation_ttl(record.expired_at, now),
        };
        self.cache
            .put_value(&keys::revoked_token(&record.id), &true, options)
            .await?;
        Ok(())
    }
}

/// Marker lifetime: until `REVOCATION_MARGIN` past the token's expiry
///
/// The deadline is pegged to the expiry, not to `now`, so a token revoked
/// after it expired keeps only what is left of the margin. Past the deadline
/// the marker gets `MIN_MARKER_TTL`. Tokens that never expire get a marker
/// that never expires.
pub fn revocation_ttl(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Duration> {
    let margin = chrono::Duration::seconds(REVOCATION_MARGIN.as_secs() as i64);
    expires_at.map(|exp| {
        (exp + margin - now)
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(MIN_MARKER_TTL)
    })
}
