//! In-memory bean cache.
//!
//! Bean snapshots are kept in an LRU keyed by `(table, primary key)`; the
//! fingerprint index maps `(table, fingerprint)` to the primary keys a query
//! resolved to and is bounded the same way. Both sit behind one `Mutex`, so a
//! single `MemoryCache` can be shared by many sessions through an `Arc`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use sqlbean_core::{BeanCache, CachedBean};

type Slot = (String, String);

fn slot(table: &str, key: &str) -> Slot {
    (table.to_string(), key.to_string())
}

/// A cached value with its last access tick.
struct Entry<V> {
    value: V,
    last_used: u64,
}

/// `(table, key)` map evicting the least-recently-used entry when full.
struct Lru<V> {
    entries: HashMap<Slot, Entry<V>>,
    capacity: usize,
    tick: u64,
    kind: &'static str,
}

impl<V: Clone> Lru<V> {
    fn new(capacity: usize, kind: &'static str) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            tick: 0,
            kind,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, table: &str, key: &str) -> Option<V> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(&slot(table, key))?;
        entry.last_used = tick;
        Some(entry.value.clone())
    }

    fn put(&mut self, table: &str, key: &str, value: V) {
        let slot = slot(table, key);
        if !self.entries.contains_key(&slot) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        let last_used = self.next_tick();
        self.entries.insert(slot, Entry { value, last_used });
    }

    fn remove(&mut self, table: &str, key: &str) {
        self.entries.remove(&slot(table, key));
    }

    fn clear_table(&mut self, table: &str) {
        self.entries.retain(|(t, _), _| t != table);
    }

    fn evict_lru(&mut self) {
        let lru = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(slot, _)| slot.clone());
        if let Some(slot) = lru {
            tracing::trace!(kind = self.kind, table = %slot.0, key = %slot.1, "Evicting cache entry");
            self.entries.remove(&slot);
        }
    }
}

struct Inner {
    beans: Lru<CachedBean>,
    ids: Lru<Vec<String>>,
}

/// Bounded LRU implementation of [`BeanCache`].
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_beans: usize,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("beans", &self.len())
            .field("max_beans", &self.max_beans)
            .finish()
    }
}

impl MemoryCache {
    /// Create a cache holding at most `max_beans` bean snapshots and as many
    /// fingerprint entries.
    pub fn new(max_beans: usize) -> Self {
        let max_beans = max_beans.max(1);
        Self {
            inner: Mutex::new(Inner {
                beans: Lru::new(max_beans, "bean"),
                ids: Lru::new(max_beans, "fingerprint"),
            }),
            max_beans,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of cached beans across all tables.
    pub fn len(&self) -> usize {
        self.lock().beans.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached fingerprint entries across all tables.
    pub fn fingerprints(&self) -> usize {
        self.lock().ids.entries.len()
    }

    /// Whether a bean is cached, without touching its recency.
    pub fn contains_bean(&self, table: &str, key: &str) -> bool {
        self.lock().beans.entries.contains_key(&slot(table, key))
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.beans.entries.clear();
        inner.ids.entries.clear();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl BeanCache for MemoryCache {
    fn get_ids(&self, table: &str, fingerprint: &str) -> Option<Vec<String>> {
        self.lock().ids.get(table, fingerprint)
    }

    fn put_ids(&self, table: &str, fingerprint: &str, ids: Vec<String>) {
        self.lock().ids.put(table, fingerprint, ids);
    }

    fn clear_ids(&self, table: &str) {
        self.lock().ids.clear_table(table);
    }

    fn get_bean(&self, table: &str, key: &str) -> Option<CachedBean> {
        self.lock().beans.get(table, key)
    }

    fn put_bean(&self, table: &str, key: &str, bean: CachedBean) {
        self.lock().beans.put(table, key, bean);
    }

    fn del_bean(&self, table: &str, key: &str) {
        self.lock().beans.remove(table, key);
    }

    fn clear_beans(&self, table: &str) {
        self.lock().beans.clear_table(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn bean(v: i64) -> CachedBean {
        Arc::new(v)
    }

    fn value(cache: &MemoryCache, key: &str) -> Option<i64> {
        cache
            .get_bean("t", key)
            .and_then(|b| b.downcast_ref::<i64>().copied())
    }

    #[test]
    fn test_bean_round_trip() {
        let cache = MemoryCache::new(4);
        cache.put_bean("t", "[1]", bean(10));
        assert_eq!(value(&cache, "[1]"), Some(10));
        assert_eq!(value(&cache, "[2]"), None);
        cache.del_bean("t", "[1]");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        cache.put_bean("t", "[1]", bean(1));
        cache.put_bean("t", "[2]", bean(2));
        // touch 1 so 2 becomes least recently used
        assert_eq!(value(&cache, "[1]"), Some(1));
        cache.put_bean("t", "[3]", bean(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains_bean("t", "[1]"));
        assert!(!cache.contains_bean("t", "[2]"));
        assert!(cache.contains_bean("t", "[3]"));
    }

    #[test]
    fn test_fingerprint_index_is_bounded() {
        let cache = MemoryCache::new(2);
        cache.put_ids("t", "q1", vec!["[1]".into()]);
        cache.put_ids("t", "q2", vec!["[2]".into()]);
        assert!(cache.get_ids("t", "q1").is_some());
        cache.put_ids("t", "q3", vec!["[3]".into()]);

        assert_eq!(cache.fingerprints(), 2);
        assert_eq!(cache.get_ids("t", "q2"), None);
        assert!(cache.get_ids("t", "q1").is_some());
        assert!(cache.get_ids("t", "q3").is_some());

        // replacing an existing fingerprint evicts nothing
        cache.put_ids("t", "q3", Vec::new());
        assert_eq!(cache.fingerprints(), 2);
    }

    #[test]
    fn test_clear_is_per_table() {
        let cache = MemoryCache::default();
        cache.put_bean("a", "[1]", bean(1));
        cache.put_bean("b", "[1]", bean(2));
        cache.put_ids("a", "q", vec!["[1]".into()]);
        cache.put_ids("b", "q", vec!["[1]".into()]);

        cache.clear_beans("a");
        cache.clear_ids("a");
        assert!(!cache.contains_bean("a", "[1]"));
        assert!(cache.contains_bean("b", "[1]"));
        assert_eq!(cache.get_ids("a", "q"), None);
        assert_eq!(cache.get_ids("b", "q"), Some(vec!["[1]".to_string()]));
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(MemoryCache::new(64));
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..8 {
                        cache.put_bean("t", &format!("[{}]", n * 8 + i), bean(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 32);
    }
}
