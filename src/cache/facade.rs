//! Typed cache façade
//!
//! `Cache` is the only interface consumers use. It owns no data: every call
//! is forwarded to the shared engine, with values passed through the codec.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::{codec, CacheEngine, PutOptions};
use crate::error::{CacheError, CacheResult};
use crate::metrics;

/// Typed cache over a shared engine
#[derive(Clone)]
pub struct Cache {
    engine: Arc<dyn CacheEngine>,
}

impl Cache {
    /// Wrap an engine
    pub fn new(engine: Arc<dyn CacheEngine>) -> Self {
        Self { engine }
    }

    /// Name of the underlying engine
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Check if a live entry exists
    pub async fn has(&self, key: &str) -> CacheResult<bool> {
        let result = self.engine.has(key).await;
        metrics::record_cache_operation("has", &result);
        result
    }

    /// Get raw bytes previously stored with `put`
    pub async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.get_value(key).await
    }

    /// Get a string previously stored with `put_string`
    pub async fn get_string(&self, key: &str) -> CacheResult<String> {
        self.get_value(key).await
    }

    /// Get an integer previously stored with `put_int`
    pub async fn get_int(&self, key: &str) -> CacheResult<i64> {
        self.get_value(key).await
    }

    /// Get and decode a value
    ///
    /// A miss is `CacheError::KeyNotFound`; a value of another shape is
    /// `CacheError::Decoding`.
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        let result = self.engine.get_raw(key).await;
        metrics::record_cache_operation("get", &result);
        codec::decode(&result?)
    }

    /// Store raw bytes
    pub async fn put(&self, key: &str, value: &[u8], options: PutOptions) -> CacheResult<()> {
        self.put_value(key, value, options).await
    }

    /// Store a string
    pub async fn put_string(&self, key: &str, value: &str, options: PutOptions) -> CacheResult<()> {
        self.put_value(key, value, options).await
    }

    /// Store an integer
    pub async fn put_int(&self, key: &str, value: i64, options: PutOptions) -> CacheResult<()> {
        self.put_value(key, &value, options).await
    }

    /// Encode and store any serializable value
    pub async fn put_value<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: PutOptions,
    ) -> CacheResult<()> {
        let bytes = codec::encode(value)?;
        let result = self.engine.put_raw(key, bytes, options.ttl()).await;
        metrics::record_cache_operation("put", &result);
        result
    }

    /// Remove an entry; absent keys are not an error
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        let result = self.engine.delete(key).await;
        metrics::record_cache_operation("delete", &result);
        result
    }

    /// Remove an entry, reporting whether a live one was there
    ///
    /// Concurrent takes of the same key see `true` at most once.
    pub async fn take(&self, key: &str) -> CacheResult<bool> {
        let result = self.engine.take(key).await;
        metrics::record_cache_operation("take", &result);
        result
    }

    /// Remaining lifetime of a live entry; `None` when it never expires
    pub async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.engine.ttl(key).await
    }

    /// Every live key starting with `prefix`
    pub async fn get_keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let result = self.engine.keys_with_prefix(prefix).await;
        metrics::record_cache_operation("scan", &result);
        result
    }

    /// Decode every live value under `prefix`, in engine order
    ///
    /// Empty or truncated values are skipped; any other decode failure
    /// fails the scan.
    pub async fn get_values_with_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> CacheResult<Vec<T>> {
        let entries = self.scan_entries(prefix).await?;
        let mut values = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            if let Some(value) = decode_lenient(&key, &raw)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Decode every live entry under `prefix` into a key → value map
    ///
    /// Same leniency as `get_values_with_prefix`.
    pub async fn get_items_with_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
    ) -> CacheResult<HashMap<String, T>> {
        let entries = self.scan_entries(prefix).await?;
        let mut items = HashMap::with_capacity(entries.len());
        for (key, raw) in entries {
            if let Some(value) = decode_lenient(&key, &raw)? {
                items.insert(key, value);
            }
        }
        Ok(items)
    }

    /// Remove every entry
    pub async fn flush(&self) -> CacheResult<()> {
        self.engine.flush().await
    }

    /// Release the engine; later calls fail with `EngineClosed`
    pub async fn close(&self) -> CacheResult<()> {
        self.engine.close().await
    }

    async fn scan_entries(&self, prefix: &str) -> CacheResult<Vec<(String, Vec<u8>)>> {
        let result = self.engine.entries_with_prefix(prefix).await;
        metrics::record_cache_operation("scan", &result);
        result
    }
}

fn decode_lenient<T: DeserializeOwned>(key: &str, raw: &[u8]) -> CacheResult<Option<T>> {
    match codec::decode(raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) if codec::is_incomplete(&err) => {
            warn!(key = %key, "Skipping incomplete cache value during prefix scan");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("engine", &self.engine.name())
            .finish()
    }
}

/// Convenience for callers that treat a miss as `None`
pub trait OptionalExt<T> {
    /// Turn `KeyNotFound` into `Ok(None)`
    fn optional(self) -> CacheResult<Option<T>>;
}

impl<T> OptionalExt<T> for CacheResult<T> {
    fn optional(self) -> CacheResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(CacheError::KeyNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
