use std::time::Duration;

use super::*;
use crate::testing::FakeTokenIssuer;
use crate::TokenError;

fn acme() -> OrgLogin {
    OrgLogin::new("acme").unwrap()
}

#[tokio::test]
async fn test_get_on_empty_cache_refreshes_once() {
    let issuer = Arc::new(FakeTokenIssuer::new());
    let cache = TokenCache::new(issuer.clone());

    let token = cache.get(&acme()).await.unwrap();

    assert_eq!(token.expose(), "token-1");
    assert_eq!(issuer.calls(), 1);
    assert_eq!(issuer.requested_orgs(), vec![acme()]);
}

#[tokio::test]
async fn test_get_returns_cached_token_while_usable() {
    let issuer = Arc::new(FakeTokenIssuer::new());
    let cache = TokenCache::new(issuer.clone());

    let first = cache.get(&acme()).await.unwrap();
    let second = cache.get(&acme()).await.unwrap();
    let third = cache.get(&acme()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(issuer.calls(), 1);
}

#[tokio::test]
async fn test_get_refreshes_token_inside_safety_margin() {
    // Every issued token is already within the five minute margin.
    let issuer = Arc::new(FakeTokenIssuer::with_lifetime(chrono::Duration::minutes(3)));
    let cache = TokenCache::new(issuer.clone());

    let first = cache.get(&acme()).await.unwrap();
    let second = cache.get(&acme()).await.unwrap();

    assert_eq!(first.expose(), "token-1");
    assert_eq!(second.expose(), "token-2");
    assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn test_get_refreshes_when_org_changes() {
    let issuer = Arc::new(FakeTokenIssuer::new());
    let cache = TokenCache::new(issuer.clone());
    let other = OrgLogin::new("globex").unwrap();

    cache.get(&acme()).await.unwrap();
    let token = cache.get(&other).await.unwrap();

    assert_eq!(token.expose(), "token-2");
    assert_eq!(issuer.requested_orgs(), vec![acme(), other]);
}

#[tokio::test]
async fn test_get_failure_propagates_and_keeps_slot_empty() {
    let issuer = Arc::new(FakeTokenIssuer::new());
    issuer.set_failing(true);
    let cache = TokenCache::new(issuer.clone());

    let err = cache.get(&acme()).await.unwrap_err();
    assert!(matches!(err, DispatchError::TokenAcquisitionFailed(TokenError::Unauthorized { .. })));

    issuer.set_failing(false);
    let token = cache.get(&acme()).await.unwrap();

    assert_eq!(token.expose(), "token-2");
    assert_eq!(issuer.calls(), 2);
}

#[tokio::test]
async fn test_get_failure_does_not_return_stale_token() {
    let issuer = Arc::new(FakeTokenIssuer::with_lifetime(chrono::Duration::minutes(3)));
    let cache = TokenCache::new(issuer.clone());

    cache.get(&acme()).await.unwrap();
    issuer.set_failing(true);

    let result = cache.get(&acme()).await;

    assert!(matches!(result, Err(DispatchError::TokenAcquisitionFailed(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_on_empty_cache_coalesce_into_one_refresh() {
    let issuer = Arc::new(FakeTokenIssuer::new().with_delay(Duration::from_millis(50)));
    let cache = Arc::new(TokenCache::new(issuer.clone()));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&acme()).await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.expose(), "token-1");
    }
    assert_eq!(issuer.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_with_valid_token_never_refresh() {
    let issuer = Arc::new(FakeTokenIssuer::new());
    let cache = Arc::new(TokenCache::new(issuer.clone()));
    cache.get(&acme()).await.unwrap();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&acme()).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().expose(), "token-1");
    }
    assert_eq!(issuer.calls(), 1);
}

#[tokio::test]
async fn test_cancelled_refresh_leaves_slot_for_next_caller() {
    let issuer = Arc::new(FakeTokenIssuer::new().with_delay(Duration::from_millis(200)));
    let cache = TokenCache::new(issuer.clone());

    let timed_out = tokio::time::timeout(Duration::from_millis(20), cache.get(&acme())).await;
    assert!(timed_out.is_err());

    let token = cache.get(&acme()).await.unwrap();

    assert_eq!(token.expose(), "token-2");
    assert_eq!(issuer.calls(), 2);
}
