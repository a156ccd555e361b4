//! In-memory cache engine
//!
//! Stores raw bytes in a HashMap guarded by a read-write lock. Expiry is
//! checked lazily on every read; an optional background sweep evicts
//! expired entries so the map does not grow with dead keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::CacheEngine;
use crate::error::{CacheError, CacheResult};

/// Entry in the in-memory cache with expiration
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

/// In-memory cache engine
///
/// # Thread Safety
///
/// Uses RwLock for interior mutability, allowing concurrent reads. Locks
/// are never held across an await point.
pub struct InMemoryEngine {
    data: RwLock<HashMap<String, CacheEntry>>,
    closed: AtomicBool,
}

impl InMemoryEngine {
    /// Create an empty engine without a background sweep
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Create an engine that evicts expired entries every `interval`
    ///
    /// The sweep holds only a weak reference and stops once the engine is
    /// dropped or closed. A zero interval starts no sweep.
    pub fn with_pruning(interval: Duration) -> Arc<Self> {
        let engine = Arc::new(Self::new());
        if interval.is_zero() {
            warn!("Zero prune interval, in-memory cache prune task not started");
        } else {
            spawn_prune_task(Arc::downgrade(&engine), interval);
        }
        engine
    }

    /// Remove every expired entry, returning how many were evicted
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired(now));
        before - data.len()
    }

    /// Number of physically resident entries, expired ones included
    pub fn resident_len(&self) -> usize {
        self.data.read().len()
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::EngineClosed);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheEngine for InMemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let data = self.data.read();
        match data.get(key) {
            Some(entry) => Ok(!entry.is_expired(Instant::now())),
            None => Ok(false),
        }
    }

    async fn get_raw(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.ensure_open()?;
        let data = self.data.read();
        match data.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => Ok(entry.value.clone()),
            _ => Err(CacheError::KeyNotFound),
        }
    }

    async fn put_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.ensure_open()?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);

        let mut data = self.data.write();
        data.insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.ensure_open()?;
        let mut data = self.data.write();
        data.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let removed = self.data.write().remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired(Instant::now())))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        self.ensure_open()?;
        let now = Instant::now();
        let data = self.data.read();
        let keys = data
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(keys)
    }

    async fn entries_with_prefix(&self, prefix: &str) -> CacheResult<Vec<(String, Vec<u8>)>> {
        self.ensure_open()?;
        let now = Instant::now();
        let data = self.data.read();
        let entries = data
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect();
        Ok(entries)
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.ensure_open()?;
        let now = Instant::now();
        let data = self.data.read();
        match data.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                Ok(entry.expires_at.map(|exp| exp.saturating_duration_since(now)))
            }
            _ => Err(CacheError::KeyNotFound),
        }
    }

    async fn flush(&self) -> CacheResult<()> {
        self.ensure_open()?;
        self.data.write().clear();
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::EngineClosed);
        }
        self.data.write().clear();
        Ok(())
    }
}

/// Spawns the background sweep for `with_pruning`
fn spawn_prune_task(engine: Weak<InMemoryEngine>, interval: Duration) {
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting in-memory cache prune task"
        );

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(engine) = engine.upgrade() else {
                break;
            };
            if engine.is_closed() {
                break;
            }

            let removed = engine.prune_expired();
            if removed > 0 {
                debug!(removed, "Pruned expired cache entries");
            }
        }

        debug!("In-memory cache prune task stopped");
    });
}
