//! Embedded cache engine
//!
//! Backed by sled, a sorted transactional key-value store living in a local
//! directory. sled has no native TTL, so each stored value carries an
//! 8-byte big-endian header with its expiry in unix milliseconds
//! (`0` = never). Expired entries are filtered on every read and removed
//! lazily when a point read runs into them.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::CacheEngine;
use crate::config::EmbeddedConfig;
use crate::error::{CacheError, CacheResult};

const HEADER_LEN: usize = 8;

/// Embedded on-disk cache engine
///
/// `close` takes the store out of its slot. The directory lock is released
/// once in-flight calls holding a handle finish.
pub struct EmbeddedEngine {
    db: RwLock<Option<sled::Db>>,
    quiet: bool,
}

impl EmbeddedEngine {
    /// Open (or create) the store described by `config`
    pub fn open(config: &EmbeddedConfig) -> CacheResult<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .temporary(config.in_memory)
            .open()?;

        if !config.disable_logging {
            info!(
                path = %config.path.display(),
                in_memory = config.in_memory,
                "Embedded cache store opened"
            );
        }

        Ok(Self {
            db: RwLock::new(Some(db)),
            quiet: config.disable_logging,
        })
    }

    /// Handle to the open store
    fn db(&self) -> CacheResult<sled::Db> {
        self.db.read().clone().ok_or(CacheError::EngineClosed)
    }

    /// Read a live entry, lazily removing it if it has expired
    fn live_value(&self, db: &sled::Db, key: &str) -> CacheResult<Option<StoredEntry>> {
        let Some(raw) = db.get(key.as_bytes())? else {
            return Ok(None);
        };

        let entry = StoredEntry::parse(key, &raw)?;
        if entry.is_expired(now_millis()) {
            // Only remove the exact bytes we read; a concurrent rewrite wins.
            let _ = db.compare_and_swap(key.as_bytes(), Some(&raw), None as Option<&[u8]>)?;
            if !self.quiet {
                debug!(key = %key, "Removed expired embedded cache entry");
            }
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Forward cursor from the prefix bound, stopping once keys no longer match
    fn scan_live(&self, prefix: &str) -> CacheResult<Vec<(String, StoredEntry)>> {
        let db = self.db()?;
        let now = now_millis();
        let mut live = Vec::new();

        for item in db.scan_prefix(prefix.as_bytes()) {
            let (raw_key, raw_value) = item?;
            let key = String::from_utf8(raw_key.to_vec())
                .map_err(|_| CacheError::CorruptEntry(String::from_utf8_lossy(&raw_key).into()))?;
            let entry = StoredEntry::parse(&key, &raw_value)?;
            if !entry.is_expired(now) {
                live.push((key, entry));
            }
        }

        Ok(live)
    }
}

/// A decoded stored value
struct StoredEntry {
    expires_at_ms: u64,
    payload: Vec<u8>,
}

impl StoredEntry {
    fn encode(payload: &[u8], ttl: Option<Duration>) -> Vec<u8> {
        let expires_at_ms = match ttl {
            Some(ttl) => now_millis().saturating_add(ttl.as_millis() as u64).max(1),
            None => 0,
        };

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&expires_at_ms.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn parse(key: &str, raw: &[u8]) -> CacheResult<Self> {
        if raw.len() < HEADER_LEN {
            return Err(CacheError::CorruptEntry(key.to_string()));
        }
        let (header, payload) = raw.split_at(HEADER_LEN);
        let mut bytes = [0u8; HEADER_LEN];
        bytes.copy_from_slice(header);

        Ok(Self {
            expires_at_ms: u64::from_be_bytes(bytes),
            payload: payload.to_vec(),
        })
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms != 0 && now_ms >= self.expires_at_ms
    }

    fn remaining(&self, now_ms: u64) -> Option<Duration> {
        if self.expires_at_ms == 0 {
            return None;
        }
        Some(Duration::from_millis(self.expires_at_ms.saturating_sub(now_ms)))
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[async_trait]
impl CacheEngine for EmbeddedEngine {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        let db = self.db()?;
        Ok(self.live_value(&db, key)?.is_some())
    }

    async fn get_raw(&self, key: &str) -> CacheResult<Vec<u8>> {
        let db = self.db()?;
        self.live_value(&db, key)?
            .map(|entry| entry.payload)
            .ok_or(CacheError::KeyNotFound)
    }

    async fn put_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let db = self.db()?;
        let stored = StoredEntry::encode(&value, ttl);
        db.insert(key.as_bytes(), stored)?;
        if !self.quiet {
            debug!(key = %key, ttl_ms = ttl.map(|t| t.as_millis() as u64), "Embedded cache put");
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.db()?.remove(key.as_bytes())?;
        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<bool> {
        let removed = self.db()?.remove(key.as_bytes())?;
        match removed {
            Some(raw) => Ok(!StoredEntry::parse(key, &raw)?.is_expired(now_millis())),
            None => Ok(false),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let keys = self
            .scan_live(prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        Ok(keys)
    }

    async fn entries_with_prefix(&self, prefix: &str) -> CacheResult<Vec<(String, Vec<u8>)>> {
        let entries = self
            .scan_live(prefix)?
            .into_iter()
            .map(|(key, entry)| (key, entry.payload))
            .collect();
        Ok(entries)
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let db = self.db()?;
        let entry = self.live_value(&db, key)?.ok_or(CacheError::KeyNotFound)?;
        Ok(entry.remaining(now_millis()))
    }

    async fn flush(&self) -> CacheResult<()> {
        self.db()?.clear()?;
        if !self.quiet {
            info!("Embedded cache store flushed");
        }
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        let db = self.db.write().take().ok_or(CacheError::EngineClosed)?;
        db.flush_async().await?;
        drop(db);
        if !self.quiet {
            info!("Embedded cache store closed");
        }
        Ok(())
    }
}
