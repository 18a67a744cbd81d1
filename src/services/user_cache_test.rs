use super::*;
use crate::state::test_helpers::MockDirectory;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
    let directory = Arc::new(MockDirectory::default().with_user("u1", "alice"));
    let cache = UserCache::new(directory.clone());

    let first = cache.get("u1").await.unwrap();
    let second = cache.get("u1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.username, "alice");
    assert_eq!(directory.user_calls(), 1);
}

#[tokio::test]
async fn unknown_user_is_not_cached() {
    let directory = Arc::new(MockDirectory::default());
    let cache = UserCache::new(directory.clone());

    assert!(cache.get("ghost").await.is_none());
    assert!(cache.get("ghost").await.is_none());
    assert_eq!(directory.user_calls(), 2);
}

#[tokio::test]
async fn failed_fetch_is_retried_on_next_lookup() {
    let directory = Arc::new(MockDirectory::default().with_user("u1", "alice"));
    directory.fail_users.store(true, Ordering::SeqCst);
    let cache = UserCache::new(directory.clone());

    assert!(cache.get("u1").await.is_none());

    directory.fail_users.store(false, Ordering::SeqCst);
    assert_eq!(cache.get("u1").await.unwrap().username, "alice");
    assert_eq!(directory.user_calls(), 2);

    cache.get("u1").await.unwrap();
    assert_eq!(directory.user_calls(), 2);
}

#[tokio::test]
async fn clones_share_entries() {
    let directory = Arc::new(MockDirectory::default().with_user("u1", "alice"));
    let cache = UserCache::new(directory.clone());
    let other = cache.clone();

    cache.get("u1").await.unwrap();
    other.get("u1").await.unwrap();
    assert_eq!(directory.user_calls(), 1);
}

#[tokio::test]
async fn concurrent_misses_all_resolve() {
    let directory = Arc::new(MockDirectory::default().with_user("u1", "alice"));
    let cache = UserCache::new(directory.clone());

    let lookups = (0..8).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get("u1").await })
    });
    for handle in lookups.collect::<Vec<_>>() {
        assert_eq!(handle.await.unwrap().unwrap().username, "alice");
    }

    let calls = directory.user_calls();
    assert!((1..=8).contains(&calls), "unexpected fetch count {calls}");
    cache.get("u1").await.unwrap();
    assert_eq!(directory.user_calls(), calls);
}
