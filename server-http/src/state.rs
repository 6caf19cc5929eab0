use shared::config::{Config, Database, FastStore};
use skillnet::CounterCache;
use skillnet::auth::{MokaSessionRepository, SessionStore};
use skillnet::notifications::Notifier;
use skillnet::ports::{CacheStore, EngagementStore, NotificationBus};
use std::sync::Arc;
use storage_engine::{
    InMemoryEngagementStore, InProcessBus, MokaCache, PostgresEngagementStore, RedisBus,
    RedisCounterStore, redis_store,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub counters: CounterCache,
    pub notifier: Notifier,
    pub engagement: Arc<dyn EngagementStore>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<Config>,
    /// Cancelled on shutdown so open notification streams let go.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        counter_store: Arc<dyn CacheStore<String, u64>>,
        bus: Arc<dyn NotificationBus>,
        engagement: Arc<dyn EngagementStore>,
    ) -> Self {
        let counters = CounterCache::new(counter_store, Some(config.counter_ttl))
            .with_engagement_sources(engagement.clone());

        let session_ttl = config.session_ttl.as_duration();
        let session_repository = Arc::new(MokaSessionRepository::new(None, session_ttl));
        let sessions = Arc::new(SessionStore::new(session_repository, session_ttl));

        Self {
            counters,
            notifier: Notifier::new(bus),
            engagement,
            sessions,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Wire the backends named by the configuration.
    pub async fn from_config(config: Config) -> shared::Result<Self> {
        let queue_cap = config.notification_queue_cap;
        let queue_ttl = config.notification_queue_ttl.as_duration();

        let (counter_store, bus): (Arc<dyn CacheStore<String, u64>>, Arc<dyn NotificationBus>) =
            match &config.fast_store {
                FastStore::InProcess => {
                    info!("Using in-process counter store and notification bus");
                    (
                        Arc::new(MokaCache::<String, u64>::new_unbounded(None)),
                        Arc::new(InProcessBus::new(queue_cap, queue_ttl)),
                    )
                }
                FastStore::Redis(url) => {
                    info!("Connecting to Redis for counters and notifications");
                    let (client, conn) = redis_store::connect(url).await?;
                    (
                        Arc::new(RedisCounterStore::new(conn.clone())),
                        Arc::new(RedisBus::new(client, conn, queue_cap, queue_ttl)),
                    )
                }
            };

        let engagement: Arc<dyn EngagementStore> = match &config.database {
            Database::InMemory => {
                warn!("No database configured, likes and comments are kept in memory");
                Arc::new(InMemoryEngagementStore::new())
            }
            Database::Postgres {
                url,
                max_connections,
            } => {
                info!("Connecting to Postgres (max {} connections)", max_connections);
                let store = PostgresEngagementStore::connect(url, *max_connections).await?;
                store.run_migrations().await?;
                Arc::new(store)
            }
        };

        Ok(Self::new(config, counter_store, bus, engagement))
    }
}
