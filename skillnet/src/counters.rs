use crate::domain::{CountKey, CountScope, PostId};
use crate::ports::{CacheStore, CountStore, EngagementStore};
use async_trait::async_trait;
use shared::{Error, Result, TtlMs};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Write-through counter cache for like and comment counts.
///
/// Every mutating write is followed by `set_cache_val`, which recomputes the
/// count from the authoritative store and overwrites the cached value. Counts
/// are never adjusted by deltas, so concurrent or retried writes cannot make
/// the cache drift: whichever recompute lands last holds the current total.
#[derive(Clone)]
pub struct CounterCache {
    store: Arc<dyn CacheStore<String, u64>>,
    sources: HashMap<CountScope, Arc<dyn CountStore>>,
    ttl: Option<TtlMs>,
}

impl CounterCache {
    pub fn new(store: Arc<dyn CacheStore<String, u64>>, ttl: Option<TtlMs>) -> Self {
        Self {
            store,
            sources: HashMap::new(),
            ttl,
        }
    }

    /// Register the authoritative count source for a scope.
    pub fn with_source(mut self, scope: CountScope, source: Arc<dyn CountStore>) -> Self {
        self.sources.insert(scope, source);
        self
    }

    /// Wire both scopes to the like/comment tables of an engagement store.
    pub fn with_engagement_sources(self, engagement: Arc<dyn EngagementStore>) -> Self {
        self.with_source(
            CountScope::Likes,
            Arc::new(EngagementCount::new(CountScope::Likes, engagement.clone())),
        )
        .with_source(
            CountScope::Comments,
            Arc::new(EngagementCount::new(CountScope::Comments, engagement)),
        )
    }

    fn source(&self, scope: CountScope) -> Result<&Arc<dyn CountStore>> {
        self.sources
            .get(&scope)
            .ok_or_else(|| Error::Internal(format!("no count source registered for {scope}")))
    }

    async fn authoritative(&self, key: CountKey) -> Result<u64> {
        self.source(key.scope)?
            .get_value(key.entity_id)
            .await
            .map_err(|e| Error::CountUnavailable {
                key: key.cache_key(),
                reason: e.to_string(),
            })
    }

    /// Recompute the count after a write and publish it to the cache.
    ///
    /// A fast-store failure here is fatal: the caller just mutated data and
    /// must not be shown a count the cache does not hold.
    pub async fn set_cache_val(&self, scope: CountScope, entity_id: PostId) -> Result<u64> {
        let key = CountKey::new(scope, entity_id);
        let count = self.authoritative(key).await?;

        self.store
            .put(key.cache_key(), count, self.ttl)
            .await
            .map_err(|e| Error::CacheWrite {
                key: key.cache_key(),
                reason: e.to_string(),
            })?;

        debug!("Refreshed counter {} = {}", key, count);
        Ok(count)
    }

    /// Read path used when rendering posts. Misses and fast-store outages fall
    /// back to the authoritative store; only a failure of that store is returned.
    pub async fn get_cache_val(&self, scope: CountScope, entity_id: PostId) -> Result<u64> {
        let key = CountKey::new(scope, entity_id);

        match self.store.get(&key.cache_key()).await {
            Ok(Some(count)) => Ok(count),
            Ok(None) => {
                let count = self.authoritative(key).await?;
                // a refresh that landed meanwhile is newer than this read
                match self
                    .store
                    .put_if_absent(key.cache_key(), count, self.ttl)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => debug!("Counter {} refreshed during read; keeping it", key),
                    Err(e) => warn!("Could not repopulate counter {}: {}", key, e),
                }
                Ok(count)
            }
            Err(e) => {
                let err = Error::CacheRead {
                    key: key.cache_key(),
                    reason: e.to_string(),
                };
                warn!("{err}; falling back to authoritative count");
                self.authoritative(key).await
            }
        }
    }
}

impl std::fmt::Debug for CounterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterCache")
            .field("scopes", &self.sources.keys().collect::<Vec<_>>())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// `CountStore` view over one table of an engagement store.
pub struct EngagementCount {
    scope: CountScope,
    engagement: Arc<dyn EngagementStore>,
}

impl EngagementCount {
    pub fn new(scope: CountScope, engagement: Arc<dyn EngagementStore>) -> Self {
        Self { scope, engagement }
    }
}

#[async_trait]
impl CountStore for EngagementCount {
    async fn get_value(&self, entity_id: PostId) -> Result<u64> {
        match self.scope {
            CountScope::Likes => self.engagement.count_likes(entity_id).await,
            CountScope::Comments => self.engagement.count_comments(entity_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tokio::sync::Notify;

    /// Fast store that can be switched off to simulate an outage.
    #[derive(Default)]
    struct FlakyStore {
        entries: DashMap<String, u64>,
        down: AtomicBool,
    }

    impl FlakyStore {
        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(Error::Store("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheStore<String, u64> for FlakyStore {
        async fn put(&self, key: String, val: u64, _ttl: Option<TtlMs>) -> Result<()> {
            self.check()?;
            self.entries.insert(key, val);
            Ok(())
        }

        async fn get(&self, key: &String) -> Result<Option<u64>> {
            self.check()?;
            Ok(self.entries.get(key).map(|v| *v))
        }

        async fn put_if_absent(&self, key: String, val: u64, _ttl: Option<TtlMs>) -> Result<bool> {
            self.check()?;
            let mut written = false;
            self.entries.entry(key).or_insert_with(|| {
                written = true;
                val
            });
            Ok(written)
        }
    }

    /// Authoritative count held in an atomic, with a read counter.
    #[derive(Default)]
    struct RowCount {
        rows: AtomicU64,
        reads: AtomicU64,
        // hand control back between reading the count and writing it,
        // so concurrent refreshes interleave
        yield_on_read: bool,
    }

    #[async_trait]
    impl CountStore for RowCount {
        async fn get_value(&self, _entity_id: PostId) -> Result<u64> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let rows = self.rows.load(Ordering::SeqCst);
            if self.yield_on_read {
                tokio::task::yield_now().await;
            }
            Ok(rows)
        }
    }

    /// Count source that can park one read after loading the count.
    #[derive(Default)]
    struct GatedCount {
        rows: AtomicU64,
        hold_next: AtomicBool,
        paused: Notify,
        resume: Notify,
    }

    #[async_trait]
    impl CountStore for GatedCount {
        async fn get_value(&self, _entity_id: PostId) -> Result<u64> {
            let rows = self.rows.load(Ordering::SeqCst);
            if self.hold_next.swap(false, Ordering::SeqCst) {
                self.paused.notify_one();
                self.resume.notified().await;
            }
            Ok(rows)
        }
    }

    struct BrokenCount;

    #[async_trait]
    impl CountStore for BrokenCount {
        async fn get_value(&self, _entity_id: PostId) -> Result<u64> {
            Err(Error::Store("database is down".into()))
        }
    }

    fn cache_with(store: Arc<FlakyStore>, rows: Arc<RowCount>) -> CounterCache {
        CounterCache::new(store, None).with_source(CountScope::Likes, rows)
    }

    #[tokio::test]
    async fn test_set_then_get_returns_same_value() {
        let store = Arc::new(FlakyStore::default());
        let rows = Arc::new(RowCount::default());
        rows.rows.store(4, Ordering::SeqCst);
        let cache = cache_with(store.clone(), rows.clone());

        let written = cache.set_cache_val(CountScope::Likes, 1).await.unwrap();
        assert_eq!(written, 4);
        assert_eq!(*store.entries.get("likes:1").unwrap(), 4);

        let reads_before = rows.reads.load(Ordering::SeqCst);
        let read = cache.get_cache_val(CountScope::Likes, 1).await.unwrap();
        assert_eq!(read, written);
        // served from the fast store
        assert_eq!(rows.reads.load(Ordering::SeqCst), reads_before);
    }

    #[tokio::test]
    async fn test_cold_read_falls_back_and_repopulates() {
        let store = Arc::new(FlakyStore::default());
        let rows = Arc::new(RowCount::default());
        rows.rows.store(9, Ordering::SeqCst);
        let cache = cache_with(store.clone(), rows);

        assert_eq!(cache.get_cache_val(CountScope::Likes, 5).await.unwrap(), 9);
        assert_eq!(*store.entries.get("likes:5").unwrap(), 9);
    }

    #[tokio::test]
    async fn test_slow_cold_read_does_not_clobber_refresh() {
        let store = Arc::new(FlakyStore::default());
        let rows = Arc::new(GatedCount::default());
        rows.rows.store(1, Ordering::SeqCst);
        rows.hold_next.store(true, Ordering::SeqCst);
        let cache =
            CounterCache::new(store.clone(), None).with_source(CountScope::Likes, rows.clone());

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_cache_val(CountScope::Likes, 1).await }
        });
        rows.paused.notified().await;

        // a like commits while the reader holds the old count
        rows.rows.store(2, Ordering::SeqCst);
        assert_eq!(cache.set_cache_val(CountScope::Likes, 1).await.unwrap(), 2);

        rows.resume.notify_one();
        assert_eq!(reader.await.unwrap().unwrap(), 1);
        assert_eq!(*store.entries.get("likes:1").unwrap(), 2);
        assert_eq!(cache.get_cache_val(CountScope::Likes, 1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_read_survives_fast_store_outage() {
        let store = Arc::new(FlakyStore::default());
        let rows = Arc::new(RowCount::default());
        rows.rows.store(2, Ordering::SeqCst);
        let cache = cache_with(store.clone(), rows);

        store.set_down(true);
        assert_eq!(cache.get_cache_val(CountScope::Likes, 1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_write_fails_loudly_on_fast_store_outage() {
        let store = Arc::new(FlakyStore::default());
        let rows = Arc::new(RowCount::default());
        let cache = cache_with(store.clone(), rows);

        store.set_down(true);
        let err = cache.set_cache_val(CountScope::Likes, 1).await.unwrap_err();
        assert!(matches!(err, Error::CacheWrite { ref key, .. } if key == "likes:1"));
        assert_eq!(err.code(), "cache_write_failed");
    }

    #[tokio::test]
    async fn test_count_source_failure_is_surfaced() {
        let store = Arc::new(FlakyStore::default());
        let cache = CounterCache::new(store, None)
            .with_source(CountScope::Comments, Arc::new(BrokenCount));

        let err = cache.set_cache_val(CountScope::Comments, 3).await.unwrap_err();
        assert_eq!(err.code(), "count_unavailable");

        let err = cache.get_cache_val(CountScope::Comments, 3).await.unwrap_err();
        assert_eq!(err.code(), "count_unavailable");
    }

    #[tokio::test]
    async fn test_scopes_do_not_collide() {
        let store = Arc::new(FlakyStore::default());
        let likes = Arc::new(RowCount::default());
        let comments = Arc::new(RowCount::default());
        likes.rows.store(1, Ordering::SeqCst);
        comments.rows.store(6, Ordering::SeqCst);

        let cache = CounterCache::new(store, None)
            .with_source(CountScope::Likes, likes)
            .with_source(CountScope::Comments, comments);

        cache.set_cache_val(CountScope::Likes, 8).await.unwrap();
        cache.set_cache_val(CountScope::Comments, 8).await.unwrap();

        assert_eq!(cache.get_cache_val(CountScope::Likes, 8).await.unwrap(), 1);
        assert_eq!(cache.get_cache_val(CountScope::Comments, 8).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_unregistered_scope_is_internal_error() {
        let cache = CounterCache::new(Arc::new(FlakyStore::default()), None);
        let err = cache.set_cache_val(CountScope::Likes, 1).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_concurrent_writes_do_not_drift() {
        let store = Arc::new(FlakyStore::default());
        let rows = Arc::new(RowCount {
            yield_on_read: true,
            ..RowCount::default()
        });
        rows.rows.store(50, Ordering::SeqCst);
        let cache = cache_with(store, rows.clone());

        let mut handles = Vec::new();
        for i in 0..40 {
            let cache = cache.clone();
            let rows = rows.clone();
            handles.push(tokio::spawn(async move {
                // 25 creates and 15 deletes, each followed by a refresh
                if i < 25 {
                    rows.rows.fetch_add(1, Ordering::SeqCst);
                } else {
                    rows.rows.fetch_sub(1, Ordering::SeqCst);
                }
                cache.set_cache_val(CountScope::Likes, 1).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(rows.rows.load(Ordering::SeqCst), 60);
        assert_eq!(cache.get_cache_val(CountScope::Likes, 1).await.unwrap(), 60);
    }
}
