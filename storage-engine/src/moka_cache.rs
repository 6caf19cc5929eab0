use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use shared::{Result, TtlMs};
use skillnet::ports::CacheStore;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    ttl: Option<Duration>,
}

/// Expiry policy reading the TTL carried by each entry. Entries without one
/// fall back to the cache-wide default.
struct PerEntryTtl {
    default_ttl: Option<Duration>,
}

impl<K, V> Expiry<K, Entry<V>> for PerEntryTtl {
    fn expire_after_create(&self, _key: &K, entry: &Entry<V>, _created_at: Instant) -> Option<Duration> {
        entry.ttl.or(self.default_ttl)
    }

    // an overwrite restarts the clock with the new entry's TTL
    fn expire_after_update(
        &self,
        _key: &K,
        entry: &Entry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl.or(self.default_ttl)
    }
}

/// Moka-backed in-process fast store with per-entry TTL.
/// Lock-free and concurrent, with optional size bound.
pub struct MokaCache<K, V>
where
    K: Debug + Hash + Eq + Send + Sync + 'static,
    V: Debug + Send + Sync + Clone + 'static,
{
    cache: Cache<K, Entry<V>>,
}

impl<K, V> MokaCache<K, V>
where
    K: Debug + Hash + Eq + Send + Sync + 'static,
    V: Debug + Send + Sync + Clone + 'static,
{
    /// Create a Moka cache with a name, optional capacity and optional default TTL
    pub fn new(name: &str, max_entries: Option<u64>, default_ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder()
            .name(name)
            .expire_after(PerEntryTtl { default_ttl });

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
        }
    }

    pub fn new_unbounded(default_ttl: Option<Duration>) -> Self {
        Self::new("counters", None, default_ttl)
    }
}

#[async_trait]
impl<K, V> CacheStore<K, V> for MokaCache<K, V>
where
    K: Debug + Hash + Eq + Send + Sync + 'static,
    V: Debug + Send + Sync + Clone + 'static,
{
    async fn put(&self, key: K, val: V, ttl: Option<TtlMs>) -> Result<()> {
        let entry = Entry {
            value: val,
            ttl: ttl.map(|t| t.as_duration()),
        };
        self.cache.insert(key, entry).await;
        Ok(())
    }

    async fn get(&self, key: &K) -> Result<Option<V>> {
        // Either absent or expired
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn put_if_absent(&self, key: K, val: V, ttl: Option<TtlMs>) -> Result<bool> {
        let entry = Entry {
            value: val,
            ttl: ttl.map(|t| t.as_duration()),
        };
        // the entry API inserts atomically with respect to concurrent puts
        Ok(self.cache.entry(key).or_insert(entry).await.is_fresh())
    }
}

impl<K, V> Debug for MokaCache<K, V>
where
    K: Debug + Hash + Eq + Send + Sync + 'static,
    V: Debug + Send + Sync + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCache")
            .field("name", &self.cache.name())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}
