//! Redis test helpers
//!
//! Connects to a local Redis if one is running and skips the test otherwise.
//! Every `TestRedis` gets its own key namespace so tests never see each
//! other's entries, and `cleanup` removes everything under it.
//!
//! # Example
//!
//! ```rust,ignore
//! let redis = skip_if_no_redis!();
//! let cache = redis.cache().await;
//! cache.put_int(&redis.key("counter"), 1, PutOptions::default()).await.unwrap();
//! redis.cleanup().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;
use warden::cache::{Cache, RedisEngine};
use warden::config::RedisConfig;

/// Logical database used by tests, away from the default one
pub const TEST_DB_INDEX: i64 = 15;

/// Test key prefix to avoid collisions with real data
pub const TEST_KEY_PREFIX: &str = "warden:test:";

/// Counter for generating unique test namespaces
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Test Redis wrapper with key namespacing and cleanup
pub struct TestRedis {
    conn: redis::aio::ConnectionManager,
    config: RedisConfig,
    namespace: String,
}

impl TestRedis {
    /// Try to connect to the local test Redis
    ///
    /// Returns `None` if Redis is unavailable so tests can skip.
    pub async fn connect() -> Option<Self> {
        let config = RedisConfig {
            db_index: TEST_DB_INDEX,
            timeout: Duration::from_secs(1),
            scan_count: 10,
            ..RedisConfig::default()
        };

        let client = redis::Client::open(config.connection_info()).ok()?;
        let conn = tokio::time::timeout(config.timeout, client.get_connection_manager())
            .await
            .ok()?
            .ok()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let namespace = format!("{}{}_{}", TEST_KEY_PREFIX, timestamp, counter);

        Some(Self {
            conn,
            config,
            namespace,
        })
    }

    /// Namespaced key for this test
    pub fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.namespace, suffix)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Cache backed by a fresh Redis engine on the test database
    pub async fn cache(&self) -> Arc<Cache> {
        let engine = RedisEngine::connect(&self.config).await.unwrap();
        Arc::new(Cache::new(Arc::new(engine)))
    }

    /// Write a raw value, bypassing the codec
    pub async fn set_raw(&self, key: &str, value: &[u8]) {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await.unwrap();
    }

    /// Remove every key under this test's namespace
    pub async fn cleanup(&self) {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.namespace);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await
            .unwrap_or_default();

        for key in keys {
            let _: redis::RedisResult<()> = conn.del(&key).await;
        }
    }
}

/// Skip the current test if Redis is not available
#[macro_export]
macro_rules! skip_if_no_redis {
    () => {
        match $crate::mocks::redis::TestRedis::connect().await {
            Some(r) => r,
            None => {
                eprintln!("Skipping test: Redis not available");
                return;
            }
        }
    };
}
