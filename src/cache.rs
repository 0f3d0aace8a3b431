//! Short-lived in-memory cache for read-mostly query results.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;

struct Entry<V> {
    value: V,
    expires_at_ms: u64,
}

/// Map whose entries vanish `ttl` after insertion.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms: ttl.as_millis() as u64,
            clock,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_millis();
        let value = {
            let entry = self.entries.get(key)?;
            (entry.expires_at_ms > now).then(|| entry.value.clone())
        };
        if value.is_none() {
            self.entries
                .remove_if(key, |_, entry| entry.expires_at_ms <= now);
        }
        value
    }

    pub fn insert(&self, key: K, value: V) {
        let expires_at_ms = self.clock.now_millis().saturating_add(self.ttl_ms);
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at_ms,
            },
        );
    }

    /// Forget everything, e.g. after a write the cached results depend on.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_entries_expire() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = TtlCache::new(Duration::from_secs(5), clock.clone());

        cache.insert(10, vec!["Heat"]);
        assert_eq!(cache.get(&10), Some(vec!["Heat"]));
        assert_eq!(cache.get(&5), None);

        clock.advance(Duration::from_millis(4_999));
        assert!(cache.get(&10).is_some());

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get(&10), None);
    }

    #[test]
    fn test_clear() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = TtlCache::new(Duration::from_secs(5), clock);

        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.clear();
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), None);
    }
}
