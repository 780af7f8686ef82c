use std::time::Duration;

use deck_client::TtlCache;

fn key(path: &str) -> (String, String) {
    ("local".to_string(), path.to_string())
}

#[tokio::test(start_paused = true)]
async fn test_fresh_entry_is_returned() {
    let mut cache = TtlCache::new(Duration::from_secs(30));
    cache.insert(key("/api/agents"), 1u32);
    tokio::time::advance(Duration::from_secs(29)).await;
    assert_eq!(cache.get(&key("/api/agents")), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_evicted_on_get() {
    let mut cache = TtlCache::new(Duration::from_secs(30));
    cache.insert(key("/api/agents"), 1u32);
    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(cache.get(&key("/api/agents")), None);
    assert_eq!(cache.len(), 0, "expired entry must be removed, not just hidden");
}

#[tokio::test(start_paused = true)]
async fn test_reinsert_restarts_the_clock() {
    let mut cache = TtlCache::new(Duration::from_secs(30));
    cache.insert(key("/api/tasks"), "old");
    tokio::time::advance(Duration::from_secs(20)).await;
    cache.insert(key("/api/tasks"), "new");
    tokio::time::advance(Duration::from_secs(20)).await;
    assert_eq!(cache.get(&key("/api/tasks")), Some("new"));
}

#[tokio::test(start_paused = true)]
async fn test_purge_expired_keeps_fresh_entries() {
    let mut cache = TtlCache::new(Duration::from_secs(30));
    cache.insert(key("/api/agents"), 1u32);
    tokio::time::advance(Duration::from_secs(20)).await;
    cache.insert(key("/api/tasks"), 2u32);
    tokio::time::advance(Duration::from_secs(15)).await;

    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&key("/api/tasks")), Some(2));
}

#[test]
fn test_invalidate_and_invalidate_where() {
    let mut cache = TtlCache::new(Duration::from_secs(30));
    cache.insert(("a".to_string(), "/api/agents".to_string()), 1u32);
    cache.insert(("a".to_string(), "/api/tasks".to_string()), 2u32);
    cache.insert(("b".to_string(), "/api/agents".to_string()), 3u32);

    assert!(cache.invalidate(&("a".to_string(), "/api/tasks".to_string())));
    assert!(!cache.invalidate(&("a".to_string(), "/api/tasks".to_string())));

    let removed = cache.invalidate_where(|(_, path)| path == "/api/agents");
    assert_eq!(removed, 2);
    assert!(cache.is_empty());
}

#[test]
fn test_servers_do_not_share_entries() {
    let mut cache = TtlCache::new(Duration::from_secs(30));
    cache.insert(("prod".to_string(), "/api/agents".to_string()), "prod");
    assert_eq!(
        cache.get(&("staging".to_string(), "/api/agents".to_string())),
        None
    );
}
