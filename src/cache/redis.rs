//! Redis cache engine
//!
//! Talks to a single Redis endpoint through a `ConnectionManager`. Every
//! network call is bounded by the configured request timeout. Prefix scans
//! walk the keyspace with a `SCAN` cursor and fetch values with pipelined
//! `GET`s, so round trips grow with pages, not with keys.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use tracing::{debug, info};

use super::CacheEngine;
use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};

/// Keys fetched per pipelined batch during prefix scans
const PIPELINE_BATCH: usize = 256;

/// Redis cache engine
///
/// `close` drops the engine's connection handle; the socket goes away once
/// in-flight calls finish with their clones.
pub struct RedisEngine {
    conn: RwLock<Option<ConnectionManager>>,
    timeout: Duration,
    scan_count: usize,
}

impl RedisEngine {
    /// Connect to the endpoint described by `config`
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.connection_info())?;
        let conn = tokio::time::timeout(config.timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(config.timeout))??;

        info!(
            host = %config.host,
            port = config.port,
            db = config.db_index,
            "Connected to Redis cache"
        );

        Ok(Self::new(conn, config.timeout, config.scan_count))
    }

    /// Wrap an existing connection
    pub fn new(conn: ConnectionManager, timeout: Duration, scan_count: usize) -> Self {
        Self {
            conn: RwLock::new(Some(conn)),
            timeout,
            scan_count: scan_count.max(1),
        }
    }

    /// Run one Redis request under the request timeout
    async fn run<T, F>(&self, request: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }

    /// Handle to the open connection
    fn conn(&self) -> CacheResult<ConnectionManager> {
        self.conn.read().clone().ok_or(CacheError::EngineClosed)
    }

    /// Walk the SCAN cursor until the server reports completion
    async fn scan_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn()?;
        let pattern = format!("{}*", escape_glob(prefix));

        let mut cursor: u64 = 0;
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        loop {
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count);

            let (next, page): (u64, Vec<String>) = self.run(cmd.query_async(&mut conn)).await?;

            // SCAN may return a key more than once across pages
            for key in page {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(prefix = %prefix, count = keys.len(), "Redis prefix scan");
        Ok(keys)
    }
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`
pub(crate) fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheEngine for RedisEngine {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        let exists: bool = self.run(conn.exists(key)).await?;
        Ok(exists)
    }

    async fn get_raw(&self, key: &str) -> CacheResult<Vec<u8>> {
        let mut conn = self.conn()?;
        let value: Option<Vec<u8>> = self.run(conn.get(key)).await?;
        value.ok_or(CacheError::KeyNotFound)
    }

    async fn put_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn()?;

        match ttl {
            Some(ttl) => {
                let millis = (ttl.as_millis() as u64).max(1);
                let mut cmd = redis::cmd("SET");
                cmd.arg(key).arg(value).arg("PX").arg(millis);
                self.run(cmd.query_async::<_, ()>(&mut conn)).await?;
            }
            None => {
                self.run(conn.set::<_, _, ()>(key, value)).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn()?;
        self.run(conn.del::<_, ()>(key)).await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        // DEL is atomic, so only one caller can see the key removed
        let removed: u64 = self.run(conn.del(key)).await?;
        Ok(removed > 0)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        self.scan_prefix(prefix).await
    }

    async fn entries_with_prefix(&self, prefix: &str) -> CacheResult<Vec<(String, Vec<u8>)>> {
        let keys = self.scan_prefix(prefix).await?;
        let mut conn = self.conn()?;
        let mut entries = Vec::with_capacity(keys.len());

        for batch in keys.chunks(PIPELINE_BATCH) {
            let mut pipe = redis::pipe();
            for key in batch {
                pipe.get(key);
            }
            let values: Vec<Option<Vec<u8>>> = self.run(pipe.query_async(&mut conn)).await?;

            // A key can expire between the scan and the fetch
            for (key, value) in batch.iter().zip(values) {
                if let Some(value) = value {
                    entries.push((key.clone(), value));
                }
            }
        }

        Ok(entries)
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.conn()?;
        let mut cmd = redis::cmd("PTTL");
        cmd.arg(key);
        let millis: i64 = self.run(cmd.query_async(&mut conn)).await?;

        match millis {
            -2 => Err(CacheError::KeyNotFound),
            -1 => Ok(None),
            ms => Ok(Some(Duration::from_millis(ms.max(0) as u64))),
        }
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut conn = self.conn()?;
        let cmd = redis::cmd("FLUSHDB");
        self.run(cmd.query_async::<_, ()>(&mut conn)).await?;
        info!("Redis cache database flushed");
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        let conn = self.conn.write().take().ok_or(CacheError::EngineClosed)?;
        drop(conn);
        info!("Redis cache engine closed");
        Ok(())
    }
}
