//! In-memory cache with a per-entry TTL.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent key/value cache where every `set` carries its own TTL.
///
/// Expired entries are never returned. They are removed lazily when read,
/// and in bulk by [`purge_expired`](Self::purge_expired) or a background
/// sweeper.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get a live value.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        // Read guard is released above; removing while holding it would deadlock the shard.
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    /// Store `value` under `key`, replacing any previous entry. The entry
    /// expires `ttl` after this call.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Remove the entry for `key`, live or not.
    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Spawn a task that purges expired entries every `interval`.
    ///
    /// The task only holds a weak reference and exits once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("Cache dropped, stopping sweeper");
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!("Cache sweeper purged {} expired entries", purged);
                }
            }
        })
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_before_and_after_expiry() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("TCS".to_string(), 1, Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("TCS"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("TCS"), None);
        // Lazy expiry removed the entry
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_restarts_ttl() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("INFY".to_string(), 1, Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("INFY".to_string(), 2, Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("INFY"), Some(2));
    }

    #[test]
    fn test_zero_ttl_is_never_served() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("SBIN".to_string(), 1, Duration::ZERO);
        assert_eq!(cache.get("SBIN"), None);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("A".to_string(), 1, Duration::from_secs(60));
        cache.set("B".to_string(), 2, Duration::from_secs(60));

        cache.invalidate("A");
        assert_eq!(cache.get("A"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_live_entries() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("short".to_string(), 1, Duration::from_secs(5));
        cache.set("long".to_string(), 2, Duration::from_secs(50));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_in_background() {
        let cache: Arc<TtlCache<String, u32>> = Arc::new(TtlCache::new());
        cache.set("short".to_string(), 1, Duration::from_secs(5));
        let handle = cache.spawn_sweeper(Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(cache.len(), 0);

        drop(cache);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(handle.is_finished());
    }
}
