//! Prometheus metrics
//!
//! Counters and gauges are recorded through the `metrics` facade. They are
//! no-ops until `init_metrics` installs the Prometheus exporter.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::error::{CacheError, CacheResult};

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter on `addr` (call once at startup)
///
/// Must run inside a Tokio runtime. Repeated calls are ignored.
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    if let Some(existing) = EXPORTER.get() {
        info!(addr = %existing, "Metrics exporter already installed");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    let _ = EXPORTER.set(addr);

    register_metrics();
    info!(addr = %addr, "Metrics exporter listening");
    Ok(())
}

fn register_metrics() {
    metrics::describe_counter!(
        "warden_cache_operations_total",
        "Cache operations by operation and outcome"
    );
    metrics::describe_counter!(
        "warden_rate_limit_rejections_total",
        "Actions rejected by a rate limiter"
    );
    metrics::describe_counter!(
        "warden_tokens_revoked_total",
        "Access tokens revoked"
    );
    metrics::describe_gauge!(
        "warden_revocations_loaded",
        "Revocation markers restored at startup"
    );
}

/// Record one cache operation; a miss is counted apart from failures
pub fn record_cache_operation<T>(operation: &'static str, result: &CacheResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(CacheError::KeyNotFound) => "miss",
        Err(_) => "error",
    };
    metrics::counter!(
        "warden_cache_operations_total",
        "operation" => operation,
        "result" => outcome
    )
    .increment(1);
}

/// Record a rejected attempt
pub fn record_rate_limit_rejection(namespace: &str) {
    metrics::counter!(
        "warden_rate_limit_rejections_total",
        "namespace" => namespace.to_string()
    )
    .increment(1);
}

/// Record a revoked token
pub fn record_token_revoked(kind: &'static str) {
    metrics::counter!("warden_tokens_revoked_total", "kind" => kind).increment(1);
}

pub fn set_revocations_loaded(count: usize) {
    metrics::gauge!("warden_revocations_loaded").set(count as f64);
}
