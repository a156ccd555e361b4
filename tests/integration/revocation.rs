//! Token revocation integration tests
//!
//! - Revoke then check, with the marker expiry pinned to token expiry + 1h
//! - Logout by token id
//! - Startup recovery from the durable token store into an empty cache
//! - Request verification against the revocation list

use std::sync::Arc;
use std::time::Duration;

use warden::auth::{AccountType, InMemoryTokenStore, TokenClaims, TokenStore, REVOCATION_MARGIN};
use warden::cache::keys;
use warden::{AppError, AppState, RevocationList};

use crate::common::{
    admin_token, embedded_cache, memory_cache, revoked_admin_token, test_config,
};

#[tokio::test]
async fn test_revocation_scenario() {
    let cache = memory_cache();
    let store = Arc::new(InMemoryTokenStore::new());
    let list = RevocationList::new(cache.clone(), store.clone());

    let token = admin_token(1);
    store.save(&token).await.unwrap();
    assert!(token.id.starts_with("admin_access_tokens:"));

    assert!(!list.is_revoked(&token.id).await.unwrap());

    list.revoke(token.clone()).await.unwrap();
    assert!(list.is_revoked(&token.id).await.unwrap());

    let ttl = cache
        .ttl(&keys::revoked_token(&token.id))
        .await
        .unwrap()
        .unwrap();
    let expected = Duration::from_secs(3600) + REVOCATION_MARGIN;
    assert!(ttl <= expected);
    assert!(ttl >= expected - Duration::from_secs(5));
}

#[tokio::test]
async fn test_logout_revokes_by_id() {
    let cache = memory_cache();
    let store = Arc::new(InMemoryTokenStore::new());
    let list = RevocationList::new(cache, store.clone());

    let token = admin_token(2);
    store.save(&token).await.unwrap();

    let revoked = list.revoke_by_id(&token.id).await.unwrap();

    assert!(revoked.revoked_at.is_some());
    assert!(list.is_revoked(&token.id).await.unwrap());
    assert!(store.find(&token.id).await.unwrap().unwrap().revoked_at.is_some());
}

#[tokio::test]
async fn test_startup_recovery_into_empty_cache() {
    let store = Arc::new(InMemoryTokenStore::new());
    let revoked = revoked_admin_token(1);
    let expired = revoked_admin_token(-1);
    let active = admin_token(1);
    for record in [&revoked, &expired, &active] {
        store.save(record).await.unwrap();
    }

    // Freshly started process: empty heap cache, durable flags intact
    let state = AppState::with_cache(test_config(&[]), memory_cache(), store)
        .await
        .unwrap();

    assert!(state.revocations.is_revoked(&revoked.id).await.unwrap());
    assert!(!state.revocations.is_revoked(&expired.id).await.unwrap());
    assert!(!state.revocations.is_revoked(&active.id).await.unwrap());
}

#[tokio::test]
async fn test_startup_fails_when_cache_is_unusable() {
    let store = Arc::new(InMemoryTokenStore::new());
    store.save(&revoked_admin_token(1)).await.unwrap();

    let cache = memory_cache();
    cache.close().await.unwrap();

    let result = AppState::with_cache(test_config(&[]), cache, store).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_embedded_revocations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryTokenStore::new());
    let token = admin_token(1);
    store.save(&token).await.unwrap();

    {
        let cache = embedded_cache(dir.path());
        let list = RevocationList::new(cache.clone(), store.clone());
        list.revoke(token.clone()).await.unwrap();
        cache.close().await.unwrap();
    }

    let list = RevocationList::new(embedded_cache(dir.path()), store);
    assert!(list.is_revoked(&token.id).await.unwrap());
}

#[tokio::test]
async fn test_redis_revocation_scenario() {
    let redis = crate::skip_if_no_redis!();
    let cache = redis.cache().await;
    let store = Arc::new(InMemoryTokenStore::new());
    let list = RevocationList::new(cache.clone(), store);

    let token = admin_token(1);
    list.revoke(token.clone()).await.unwrap();

    assert!(list.is_revoked(&token.id).await.unwrap());
    let ttl = cache
        .ttl(&keys::revoked_token(&token.id))
        .await
        .unwrap()
        .unwrap();
    assert!(ttl > Duration::from_secs(2 * 3600 - 10));

    // Markers live outside the test namespace
    cache.delete(&keys::revoked_token(&token.id)).await.unwrap();
    redis.cleanup().await;
}

#[tokio::test]
async fn test_authenticator_rejects_revoked_token() {
    let store = Arc::new(InMemoryTokenStore::new());
    let state = AppState::with_cache(test_config(&[]), memory_cache(), store.clone())
        .await
        .unwrap();

    let token = admin_token(1);
    store.save(&token).await.unwrap();

    let claims = TokenClaims {
        jti: token.id.clone(),
        sub: token.subject_id.clone(),
        exp: token.expired_at.map(|e| e.timestamp()),
        act: Some("admin".to_string()),
        extra: Default::default(),
    };

    assert_eq!(
        state
            .authenticator
            .verify(&claims, &[AccountType::Admin])
            .await
            .unwrap(),
        AccountType::Admin
    );

    state.revocations.revoke_by_id(&token.id).await.unwrap();

    let err = state
        .authenticator
        .verify(&claims, &[AccountType::Admin])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenRevoked));
}
