//! Statistics cache
//!
//! Caches aggregate responses keyed by query window so repeated dashboard
//! queries skip the grouped store scans. Entries are TTL-bounded; they are not
//! refreshed when new jobs land inside a cached window unless the caller
//! invalidates explicitly.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pressledger_common::{DepartmentId, PressLedgerError, Result, StatsWindow};
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::store::SavingsRates;

/// Which aggregate a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsKind {
    Overall,
    Department,
    User,
    Printer,
    CostAnalysis,
}

impl StatsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsKind::Overall => "overall",
            StatsKind::Department => "department",
            StatsKind::User => "user",
            StatsKind::Printer => "printer",
            StatsKind::CostAnalysis => "cost_analysis",
        }
    }
}

/// Cache key components
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub kind: StatsKind,
    pub window: StatsWindow,
    pub department_id: Option<DepartmentId>,
    /// Savings rates the value was priced with, for savings-bearing kinds
    pub rates: Option<SavingsRates>,
}

impl CacheKey {
    pub fn new(kind: StatsKind, window: StatsWindow) -> Self {
        Self {
            kind,
            window,
            department_id: None,
            rates: None,
        }
    }

    pub fn for_department(kind: StatsKind, window: StatsWindow, department_id: DepartmentId) -> Self {
        Self {
            kind,
            window,
            department_id: Some(department_id),
            rates: None,
        }
    }

    /// Scope the key to the savings rates used to compute the value
    pub fn with_rates(mut self, rates: SavingsRates) -> Self {
        self.rates = Some(rates);
        self
    }

    /// Deterministic string key; the window bounds stay readable for invalidation
    pub fn to_cache_key(&self, prefix: &str) -> String {
        let scope = self
            .department_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "all".to_string());
        let rates = self
            .rates
            .map(|r| {
                format!(
                    "{}/{}",
                    r.color_cost_diff.normalize(),
                    r.duplex_saving_per_page.normalize()
                )
            })
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{}:stats:{}:{}:{}:{}:{}",
            prefix,
            self.kind.as_str(),
            rates,
            encode_instant(self.window.start),
            encode_instant(self.window.end),
            scope
        )
    }

    /// Recover the window from a key produced by [`CacheKey::to_cache_key`]
    pub fn window_from_cache_key(key: &str) -> Option<StatsWindow> {
        let mut parts = key.rsplit(':');
        let _scope = parts.next()?;
        let end = decode_instant(parts.next()?)?;
        let start = decode_instant(parts.next()?)?;
        StatsWindow::new(start, end).ok()
    }
}

/// `seconds.nanoseconds`, exact for every representable instant
fn encode_instant(ts: DateTime<Utc>) -> String {
    format!("{}.{:09}", ts.timestamp(), ts.timestamp_subsec_nanos())
}

fn decode_instant(raw: &str) -> Option<DateTime<Utc>> {
    let (secs, nanos) = raw.split_once('.')?;
    Utc.timestamp_opt(secs.parse().ok()?, nanos.parse().ok()?)
        .single()
}

/// Cached aggregate with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedValue {
    value: Value,
    window: StatsWindow,
    cached_at: i64,
    expires_at: i64,
}

impl CachedValue {
    fn new(value: Value, window: StatsWindow, ttl: Duration) -> Self {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            value,
            window,
            cached_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    fn is_fresh(&self) -> bool {
        Utc::now().timestamp_millis() < self.expires_at
    }
}

/// Backend for cached aggregate responses
#[async_trait]
pub trait StatisticsCache: Send + Sync {
    /// Fresh cached value, if any
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>>;

    /// Cache a value for `ttl`
    async fn put(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()>;

    /// Drop entries whose window contains `timestamp`
    async fn invalidate_containing(&self, timestamp: DateTime<Utc>) -> Result<u64>;

    /// Drop every entry
    async fn clear(&self) -> Result<u64>;
}

/// In-memory cache using DashMap
pub struct InMemoryStatisticsCache {
    cache: dashmap::DashMap<String, CachedValue>,
    prefix: String,
    max_entries: usize,
}

impl InMemoryStatisticsCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: dashmap::DashMap::new(),
            prefix: "statistics".to_string(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn evict_if_full(&self) {
        if self.cache.len() < self.max_entries {
            return;
        }

        self.cache.retain(|_, v| v.is_fresh());

        // If still at capacity, remove the oldest
        if self.cache.len() >= self.max_entries {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.cached_at)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                self.cache.remove(&key);
            }
        }
    }
}

impl Default for InMemoryStatisticsCache {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CACHE_MAX_ENTRIES)
    }
}

#[async_trait]
impl StatisticsCache for InMemoryStatisticsCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let cache_key = key.to_cache_key(&self.prefix);
        let hit = self
            .cache
            .get(&cache_key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.value().value.clone());
        Ok(hit)
    }

    async fn put(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()> {
        let cache_key = key.to_cache_key(&self.prefix);
        if !self.cache.contains_key(&cache_key) {
            self.evict_if_full();
        }
        self.cache
            .insert(cache_key, CachedValue::new(value, key.window, ttl));
        Ok(())
    }

    async fn invalidate_containing(&self, timestamp: DateTime<Utc>) -> Result<u64> {
        let before = self.cache.len();
        self.cache.retain(|_, v| !v.window.contains(timestamp));
        Ok(before.saturating_sub(self.cache.len()) as u64)
    }

    async fn clear(&self) -> Result<u64> {
        let count = self.cache.len() as u64;
        self.cache.clear();
        Ok(count)
    }
}

/// Redis-based statistics cache
pub struct RedisStatisticsCache {
    /// Redis client
    client: Client,
    /// Shared multiplexed connection
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    /// Key prefix for cache entries
    prefix: String,
}

impl RedisStatisticsCache {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            PressLedgerError::Config(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PressLedgerError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(Some(connection))),
            prefix: "pressledger".to_string(),
        })
    }

    /// Create cache with custom prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    async fn keys(&self, conn: &mut MultiplexedConnection) -> Result<Vec<String>> {
        let pattern = format!("{}:stats:*", self.prefix);
        redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(conn)
            .await
            .map_err(|e| PressLedgerError::Cache(format!("Redis KEYS failed: {}", e)))
    }

    /// Get a connection, reconnecting if needed
    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        let guard = self.connection.read().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        drop(guard);

        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PressLedgerError::Cache(format!("Failed to reconnect to Redis: {}", e)))?;

        *guard = Some(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl StatisticsCache for RedisStatisticsCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        let redis_key = key.to_cache_key(&self.prefix);
        let mut conn = self.get_connection().await?;

        let cached: Option<String> = conn.get(&redis_key).await.map_err(|e| {
            warn!("Cache get error: {}", e);
            PressLedgerError::Cache(format!("Redis get failed: {}", e))
        })?;

        match cached {
            Some(json) => {
                let cached: CachedValue = serde_json::from_str(&json)?;
                if cached.is_fresh() {
                    debug!(key = %redis_key, "Cache hit");
                    Ok(Some(cached.value))
                } else {
                    debug!(key = %redis_key, "Cache expired");
                    Ok(None)
                }
            }
            None => {
                debug!(key = %redis_key, "Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value))]
    async fn put(&self, key: &CacheKey, value: Value, ttl: Duration) -> Result<()> {
        let redis_key = key.to_cache_key(&self.prefix);
        let json = serde_json::to_string(&CachedValue::new(value, key.window, ttl))?;
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.get_connection().await?;
        conn.set_ex::<_, _, ()>(&redis_key, json, ttl_secs)
            .await
            .map_err(|e| {
                warn!("Cache set error: {}", e);
                PressLedgerError::Cache(format!("Redis set failed: {}", e))
            })?;

        debug!(key = %redis_key, ttl_secs, "Cached statistics");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_containing(&self, timestamp: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let stale: Vec<String> = self
            .keys(&mut conn)
            .await?
            .into_iter()
            .filter(|key| {
                CacheKey::window_from_cache_key(key).map_or(false, |w| w.contains(timestamp))
            })
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn
            .del(&stale)
            .await
            .map_err(|e| PressLedgerError::Cache(format!("Redis DEL failed: {}", e)))?;

        debug!(deleted, "Invalidated statistics entries");
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let keys = self.keys(&mut conn).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn
            .del(&keys)
            .await
            .map_err(|e| PressLedgerError::Cache(format!("Redis DEL failed: {}", e)))?;

        debug!(deleted, "Cleared all statistics entries");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn window(start_day: u32, end_day: u32) -> StatsWindow {
        StatsWindow::new(
            Utc.with_ymd_and_hms(2025, 3, start_day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, end_day, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_cache_key_generation() {
        let key = CacheKey::for_department(StatsKind::User, window(1, 8), 12);
        let cache_key = key.to_cache_key("test");

        assert!(cache_key.starts_with("test:stats:user:"));
        assert!(cache_key.ends_with(":12"));
        assert_ne!(
            cache_key,
            CacheKey::new(StatsKind::User, window(1, 8)).to_cache_key("test")
        );
        assert_eq!(CacheKey::window_from_cache_key(&cache_key), Some(window(1, 8)));
    }

    #[test]
    fn test_sub_millisecond_windows_get_distinct_keys() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let narrow = StatsWindow::new(start, start + chrono::Duration::microseconds(100)).unwrap();
        let wide = StatsWindow::new(start, start + chrono::Duration::microseconds(900)).unwrap();

        let narrow_key = CacheKey::new(StatsKind::Overall, narrow).to_cache_key("test");
        let wide_key = CacheKey::new(StatsKind::Overall, wide).to_cache_key("test");

        assert_ne!(narrow_key, wide_key);
        assert_eq!(CacheKey::window_from_cache_key(&narrow_key), Some(narrow));
        assert_eq!(CacheKey::window_from_cache_key(&wide_key), Some(wide));
    }

    #[test]
    fn test_rates_scope_the_key() {
        let base = CacheKey::new(StatsKind::Overall, window(1, 8));
        let rates = |diff, duplex| SavingsRates {
            color_cost_diff: diff,
            duplex_saving_per_page: duplex,
        };

        let old = base.with_rates(rates(Decimal::from(120), Decimal::from(30)));
        let new = base.with_rates(rates(Decimal::from(120), Decimal::from(50)));
        let rescaled = base.with_rates(rates(Decimal::new(12000, 2), Decimal::new(300, 1)));

        assert_ne!(old.to_cache_key("test"), new.to_cache_key("test"));
        assert_eq!(old.to_cache_key("test"), rescaled.to_cache_key("test"));
        assert_eq!(CacheKey::window_from_cache_key(&new.to_cache_key("test")), Some(window(1, 8)));
    }

    #[tokio::test]
    async fn test_in_memory_cache() {
        let cache = InMemoryStatisticsCache::new(100);
        let key = CacheKey::new(StatsKind::Overall, window(1, 8));

        assert!(cache.get(&key).await.unwrap().is_none());

        cache
            .put(&key, json!({"jobs": 3}), Duration::from_secs(60))
            .await
            .unwrap();

        let cached = cache.get(&key).await.unwrap();
        assert_eq!(cached, Some(json!({"jobs": 3})));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = InMemoryStatisticsCache::new(100);
        let key = CacheKey::new(StatsKind::Printer, window(1, 8));

        cache.put(&key, json!([]), Duration::ZERO).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_expire_immediately() {
        let cache = InMemoryStatisticsCache::new(100);
        let key = CacheKey::new(StatsKind::Overall, window(1, 8));

        cache
            .put(&key, json!(7), Duration::from_secs(u64::MAX / 1000))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(json!(7)));
    }

    #[tokio::test]
    async fn test_in_memory_cache_eviction() {
        let cache = InMemoryStatisticsCache::new(2);

        for day in 1..6 {
            let key = CacheKey::new(StatsKind::Overall, window(day, day + 1));
            cache
                .put(&key, json!(day), Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(cache.len() <= 2);
    }

    #[tokio::test]
    async fn test_invalidate_containing() {
        let cache = InMemoryStatisticsCache::new(100);
        let ttl = Duration::from_secs(60);
        cache
            .put(&CacheKey::new(StatsKind::Overall, window(1, 8)), json!(1), ttl)
            .await
            .unwrap();
        cache
            .put(&CacheKey::new(StatsKind::Overall, window(8, 15)), json!(2), ttl)
            .await
            .unwrap();

        let ts = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        assert_eq!(cache.invalidate_containing(ts).await.unwrap(), 1);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.is_empty());
    }
}
