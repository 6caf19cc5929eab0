pub mod memory_bus;
pub mod memory_engagement;
pub mod moka_cache;
pub mod postgres_engagement;
pub mod redis_store;

pub use memory_bus::InProcessBus;
pub use memory_engagement::InMemoryEngagementStore;
pub use moka_cache::MokaCache;
pub use postgres_engagement::PostgresEngagementStore;
pub use redis_store::{RedisBus, RedisCounterStore};
