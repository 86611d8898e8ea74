//! Listing cache with a freshness window and per-collection invalidation.
//!
//! Every collection carries an epoch that is bumped on invalidation. A read
//! records the epoch before going to the store and only populates the cache
//! if the epoch is unchanged when it returns, so a listing fetched before a
//! mutation can never be cached after it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::models::Collection;
use crate::repositories::ListParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub collection: Collection,
    pub params: ListParams,
}

impl QueryKey {
    pub fn new(collection: Collection, params: ListParams) -> Self {
        Self { collection, params }
    }
}

struct CachedQuery {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<QueryKey, CachedQuery>,
    epochs: HashMap<Collection, u64>,
}

pub struct QueryCache {
    ttl: Duration,
    inner: RwLock<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached value if it is still fresh.
    pub fn get<T: Any + Send + Sync>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let hit = {
            let inner = self.inner.read();
            inner
                .entries
                .get(key)
                .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
                .and_then(|entry| entry.value.clone().downcast::<T>().ok())
        };

        match hit {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn epoch(&self, collection: Collection) -> u64 {
        self.inner
            .read()
            .epochs
            .get(&collection)
            .copied()
            .unwrap_or_default()
    }

    /// Stores `value` unless the collection was invalidated since `epoch`.
    pub fn insert_if_current<T: Any + Send + Sync>(
        &self,
        key: QueryKey,
        epoch: u64,
        value: Arc<T>,
    ) -> bool {
        let mut inner = self.inner.write();
        let current = inner
            .epochs
            .get(&key.collection)
            .copied()
            .unwrap_or_default();
        if current != epoch {
            return false;
        }

        inner.entries.insert(
            key,
            CachedQuery {
                value,
                fetched_at: Instant::now(),
            },
        );
        true
    }

    /// Drops every cached listing of `collection`.
    pub fn invalidate(&self, collection: Collection) {
        let mut inner = self.inner.write();
        *inner.epochs.entry(collection).or_default() += 1;
        inner.entries.retain(|key, _| key.collection != collection);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.read().entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn articles_key() -> QueryKey {
        QueryKey::new(Collection::Articles, ListParams::newest_first())
    }

    #[test]
    fn test_fresh_entries_are_served() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = articles_key();

        assert!(cache.insert_if_current(key, cache.epoch(Collection::Articles), Arc::new(vec![1, 2])));
        assert_eq!(*cache.get::<Vec<i32>>(&key).unwrap(), vec![1, 2]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_expired_entries_are_not_served() {
        let cache = QueryCache::new(Duration::ZERO);
        let key = articles_key();

        cache.insert_if_current(key, 0, Arc::new(vec![1]));
        assert!(cache.get::<Vec<i32>>(&key).is_none());
    }

    #[test]
    fn test_invalidate_only_touches_one_collection() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let articles = articles_key();
        let schedules = QueryKey::new(Collection::Schedules, ListParams::oldest_first());

        cache.insert_if_current(articles, 0, Arc::new(vec![1]));
        cache.insert_if_current(schedules, 0, Arc::new(vec![2]));
        cache.invalidate(Collection::Articles);

        assert!(cache.get::<Vec<i32>>(&articles).is_none());
        assert!(cache.get::<Vec<i32>>(&schedules).is_some());
    }

    #[test]
    fn test_reads_started_before_invalidation_are_discarded() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = articles_key();

        let epoch = cache.epoch(Collection::Articles);
        cache.invalidate(Collection::Articles);

        assert!(!cache.insert_if_current(key, epoch, Arc::new(vec![1])));
        assert!(cache.get::<Vec<i32>>(&key).is_none());
    }

    #[test]
    fn test_type_mismatch_is_a_miss() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = articles_key();

        cache.insert_if_current(key, 0, Arc::new(vec![1]));
        assert!(cache.get::<String>(&key).is_none());
    }
}
