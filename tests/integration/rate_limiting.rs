//! Rate limiting integration tests
//!
//! The OTP-send scenario against every engine:
//! - three attempts exhaust a limit of three, a limit of four still passes
//! - `clear` resets the window
//! - attempts in the same second count once
//! - per-identity isolation

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use warden::{AppError, Cache, RateLimiter};

use crate::common::{constants::TEST_PHONE, embedded_cache, memory_cache, test_config};

const BASE: i64 = 1_700_000_000;

fn otp_limiter(cache: Arc<Cache>, id: &str) -> RateLimiter {
    RateLimiter::new(cache, "otp", &[id], Duration::from_secs(60))
}

async fn run_scenario(cache: Arc<Cache>, id: &str) {
    let limiter = otp_limiter(cache.clone(), id);

    for offset in 0..3 {
        limiter.record_attempt_at(BASE + offset).await.unwrap();
    }

    match limiter.guard(3).await {
        Err(AppError::RateLimited { limit, used }) => {
            assert_eq!(limit, 3);
            assert_eq!(used, 3);
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
    assert_ok!(limiter.guard(4).await);

    // Another identity in the same namespace is unaffected
    let other = otp_limiter(cache, &format!("{}9", id));
    assert_ok!(other.guard(1).await);

    limiter.clear().await.unwrap();
    assert_ok!(limiter.guard(1).await);

    limiter.record_attempt_at(BASE + 10).await.unwrap();
    limiter.record_attempt_at(BASE + 10).await.unwrap();
    assert_eq!(limiter.count().await, 1);

    limiter.clear().await.unwrap();
}

#[tokio::test]
async fn test_memory_rate_limit_scenario() {
    run_scenario(memory_cache(), TEST_PHONE).await;
}

#[tokio::test]
async fn test_embedded_rate_limit_scenario() {
    let dir = tempfile::tempdir().unwrap();
    run_scenario(embedded_cache(dir.path()), TEST_PHONE).await;
}

#[tokio::test]
async fn test_redis_rate_limit_scenario() {
    let redis = crate::skip_if_no_redis!();
    // Unique id so concurrent runs do not share a window
    let id = redis.namespace().replace(':', "_");

    run_scenario(redis.cache().await, &id).await;

    redis.cleanup().await;
}

#[tokio::test]
async fn test_live_attempts_expire_after_window() {
    let cache = memory_cache();
    let limiter = RateLimiter::new(cache, "login", &["alice"], Duration::from_millis(300));

    limiter.record_attempt().await.unwrap();
    assert_err!(limiter.guard(1).await);

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_ok!(limiter.guard(1).await);
}

#[tokio::test]
async fn test_zero_window_is_permanent() {
    let cache = memory_cache();
    let limiter = RateLimiter::new(cache.clone(), "lifetime", &["alice"], Duration::ZERO);

    limiter.record_attempt_at(BASE).await.unwrap();

    let key = format!("{}:{}", limiter.key_prefix(), BASE);
    assert_eq!(cache.ttl(&key).await.unwrap(), None);
    assert_eq!(cache.get_int(&key).await.unwrap(), BASE);
}

#[tokio::test]
async fn test_state_builds_limiters_over_shared_cache() {
    let state = warden::AppState::with_cache(
        test_config(&[]),
        memory_cache(),
        Arc::new(warden::auth::InMemoryTokenStore::new()),
    )
    .await
    .unwrap();

    let first = state.rate_limiter("login", &["alice", "web"], Duration::from_secs(60));
    let second = state.rate_limiter("login", &["alice", "web"], Duration::from_secs(60));

    first.record_attempt_at(BASE).await.unwrap();

    assert_eq!(second.key_prefix(), "rl:login:alice_web");
    assert_eq!(second.count().await, 1);
}
