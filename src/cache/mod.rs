//! The multi-tier cache (C4): three TTL-bounded, process-global, evictable
//! caches keyed by principal or playlist identifier. Concurrent misses on
//! the same key may duplicate the wrapped remote call; that is accepted
//! rather than guarded with a single-flight lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::BookmarkStoreConfig;
use crate::models::{Container, Tag};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A single keyed, TTL-bounded cache. Reads past the TTL behave as a miss;
/// no background eviction runs, entries are lazily dropped on next access.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().expect("cache lock poisoned");
        entries.get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn evict_all(&self) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.clear();
    }
}

/// The three logical caches the pipeline reads and writes through.
pub struct CacheLayer {
    pub tags: TtlCache<String, Vec<Tag>>,
    pub containers: TtlCache<String, Vec<Container>>,
    pub playlist_container: TtlCache<String, String>,
}

impl CacheLayer {
    pub fn new(config: &BookmarkStoreConfig) -> Self {
        Self {
            tags: TtlCache::new(config.tags_ttl),
            containers: TtlCache::new(config.container_list_ttl),
            playlist_container: TtlCache::new(config.playlist_mapping_ttl),
        }
    }

    /// Caches a freshly fetched container list unless it is empty — an
    /// empty list is treated as a miss next time so the pipeline can
    /// recover once the store is healthy again.
    pub fn cache_containers_unless_empty(&self, principal: &str, containers: &[Container]) {
        if !containers.is_empty() {
            self.containers
                .insert(principal.to_string(), containers.to_vec());
        }
    }
}
