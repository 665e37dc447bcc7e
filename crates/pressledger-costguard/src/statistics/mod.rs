//! Statistics module
//!
//! Provides cached rollups of stored print jobs:
//! - StatisticsAggregator: overall, department, user, printer and cost analysis queries
//! - StatisticsCache: TTL-bounded cache backends (DashMap, Redis)

pub mod aggregator;
pub mod cache;

pub use aggregator::{CacheTtlPolicy, StatisticsAggregator};
pub use cache::{
    CacheKey, InMemoryStatisticsCache, RedisStatisticsCache, StatisticsCache,
    StatsKind,
};
