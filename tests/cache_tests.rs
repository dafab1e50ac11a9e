//! Block cache behaviour through the public API.

use std::sync::Arc;

use microblock_prefetch::cache::BlockCache;

#[test]
fn test_capacity_two_keeps_latest_blocks() {
    let cache = BlockCache::new(2).unwrap();
    assert_eq!(cache.put(1, "b1"), None);
    assert_eq!(cache.put(2, "b2"), None);
    assert_eq!(cache.put(3, "b3"), Some(1));

    assert_eq!(cache.cached_ids(), vec![2, 3]);
    assert!(!cache.contains(1));
}

#[test]
fn test_get_promotes_entry() {
    let cache = BlockCache::new(3).unwrap();
    for id in 1..=3 {
        cache.put(id, id * 10);
    }
    assert_eq!(cache.get(1), Some(10));
    assert_eq!(cache.cached_ids(), vec![2, 3, 1]);

    // 2 is now the least recently used.
    assert_eq!(cache.put(4, 40), Some(2));
}

#[test]
fn test_reinsert_replaces_without_eviction() {
    let cache = BlockCache::new(2).unwrap();
    cache.put(1, "old");
    cache.put(2, "b2");
    assert_eq!(cache.put(1, "new"), None);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(1), Some("new"));
    assert_eq!(cache.cached_ids(), vec![2, 1]);
}

#[test]
fn test_contains_does_not_promote() {
    let cache = BlockCache::new(2).unwrap();
    cache.put(1, ());
    cache.put(2, ());
    assert!(cache.contains(1));
    assert_eq!(cache.put(3, ()), Some(1));
}

#[test]
fn test_stats_counts_hits_and_misses() {
    let cache = BlockCache::new(4).unwrap();
    cache.put(7, "seven");
    cache.get(7);
    cache.get(7);
    cache.get(8);

    let stats = cache.stats();
    assert_eq!(stats.capacity, 4);
    assert_eq!(stats.size, 1);
    assert_eq!(stats.cached_blocks, vec![7]);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["cached_blocks"], serde_json::json!([7]));
}

#[test]
fn test_remove_and_clear() {
    let cache = BlockCache::new(4).unwrap();
    cache.put(1, 'a');
    cache.put(2, 'b');

    assert_eq!(cache.remove(1), Some('a'));
    assert_eq!(cache.remove(1), None);
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_access_respects_capacity() {
    let cache = Arc::new(BlockCache::new(8).unwrap());

    std::thread::scope(|scope| {
        for t in 0..4u64 {
            let cache = cache.clone();
            scope.spawn(move || {
                for i in 0..500u64 {
                    let id = (t * 1000 + i) % 32;
                    if cache.get(id).is_none() {
                        cache.put(id, id);
                    }
                    assert!(cache.len() <= 8);
                }
            });
        }
    });

    assert_eq!(cache.len(), 8);
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 2000);
}
