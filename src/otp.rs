//! One-time verification codes
//!
//! Codes are cache markers at `auth:code_<medium>_<credential>:<code>` that
//! expire on their own. Sending is rate limited per (medium, credential);
//! a successful verification consumes the code and resets that limiter.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, instrument};

use crate::cache::{keys, Cache, PutOptions};
use crate::config::OtpConfig;
use crate::error::AppResult;
use crate::rate_limiter::RateLimiter;

const SEND_NAMESPACE: &str = "otp";

/// Issues and checks one-time codes
pub struct OneTimeCodes {
    cache: Arc<Cache>,
    config: OtpConfig,
}

impl OneTimeCodes {
    pub fn new(cache: Arc<Cache>, config: OtpConfig) -> Self {
        Self { cache, config }
    }

    /// Limiter guarding code sends to one destination
    pub fn send_limiter(&self, medium: &str, credential: &str) -> RateLimiter {
        RateLimiter::new(
            self.cache.clone(),
            SEND_NAMESPACE,
            &[medium, credential],
            self.config.send_window,
        )
    }

    /// Issue a fresh code for delivery over `medium` to `credential`
    ///
    /// Fails with `RateLimited` once `send_limit` codes were sent within
    /// the send window. Delivery is the caller's job.
    #[instrument(skip(self, credential), fields(medium = %medium))]
    pub async fn issue(&self, medium: &str, credential: &str) -> AppResult<String> {
        let limiter = self.send_limiter(medium, credential);
        limiter.guard(self.config.send_limit).await?;

        let code = generate_code(self.config.code_length);
        self.cache
            .put_value(
                &keys::auth_code(medium, credential, &code),
                &true,
                PutOptions::expire_in(self.config.code_ttl),
            )
            .await?;
        limiter.record_attempt().await?;

        info!("One-time code issued");
        Ok(code)
    }

    /// Check a code, consuming it on success
    #[instrument(skip(self, credential, code), fields(medium = %medium))]
    pub async fn verify(&self, medium: &str, credential: &str, code: &str) -> AppResult<bool> {
        let key = keys::auth_code(medium, credential, code);
        if !self.cache.take(&key).await? {
            debug!("One-time code rejected");
            return Ok(false);
        }

        self.send_limiter(medium, credential).clear().await?;
        debug!("One-time code accepted");
        Ok(true)
    }
}

/// Random numeric code of `length` digits
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
