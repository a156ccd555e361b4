//! Cache module
//!
//! A typed cache façade over three interchangeable storage engines:
//! an in-process map, an embedded on-disk store and Redis.

pub mod codec;
pub mod embedded;
pub mod facade;
pub mod in_memory;
pub mod keys;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{CacheConfig, EngineConfig};
use crate::error::CacheResult;

pub use self::embedded::EmbeddedEngine;
pub use self::facade::Cache;
pub use self::in_memory::InMemoryEngine;
pub use self::redis::RedisEngine;

/// Options recognised by every `put` operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Entry expires this long after the write. `None` or zero means never.
    pub expiration: Option<Duration>,
}

impl PutOptions {
    /// Entry that never expires
    pub fn persistent() -> Self {
        Self { expiration: None }
    }

    /// Entry that expires after `ttl`
    pub fn expire_in(ttl: Duration) -> Self {
        Self {
            expiration: Some(ttl),
        }
    }

    /// TTL to hand to an engine, with zero folded into "no expiry"
    pub(crate) fn ttl(&self) -> Option<Duration> {
        self.expiration.filter(|d| !d.is_zero())
    }
}

/// Raw key/byte storage with TTL
///
/// Implementations must be safe for concurrent use and must treat an
/// expired entry as absent for every read. After `close`, every call
/// fails with `CacheError::EngineClosed`.
#[async_trait]
pub trait CacheEngine: Send + Sync {
    /// Short engine name for logs and metrics
    fn name(&self) -> &'static str;

    /// True iff a live entry exists. A miss is `Ok(false)`, never an error.
    async fn has(&self, key: &str) -> CacheResult<bool>;

    /// Raw bytes of a live entry, `KeyNotFound` if absent or expired
    async fn get_raw(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Unconditional upsert. `ttl` of `None` means the entry never expires.
    async fn put_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove an entry. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove an entry in one step, reporting whether a live one was there.
    /// Of two concurrent takes on the same key at most one sees `true`.
    async fn take(&self, key: &str) -> CacheResult<bool>;

    /// Every live key starting with `prefix`, each exactly once
    async fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>>;

    /// Every live `(key, raw value)` pair starting with `prefix`
    async fn entries_with_prefix(&self, prefix: &str) -> CacheResult<Vec<(String, Vec<u8>)>>;

    /// Remaining lifetime of a live entry; `None` when it never expires
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Remove every entry
    async fn flush(&self) -> CacheResult<()>;

    /// Release engine resources
    async fn close(&self) -> CacheResult<()>;
}

/// Open the engine selected by configuration and wrap it in a `Cache`
pub async fn open(config: &CacheConfig) -> CacheResult<Cache> {
    let engine: Arc<dyn CacheEngine> = match &config.engine {
        EngineConfig::InMemory => match config.prune_interval {
            Some(interval) => InMemoryEngine::with_pruning(interval),
            None => Arc::new(InMemoryEngine::new()),
        },
        EngineConfig::Embedded(embedded) => Arc::new(EmbeddedEngine::open(embedded)?),
        EngineConfig::Redis(redis) => Arc::new(RedisEngine::connect(redis).await?),
    };

    info!(engine = engine.name(), "Cache engine opened");
    Ok(Cache::new(engine))
}
