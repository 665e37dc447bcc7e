//! Statistics aggregation
//!
//! Shapes grouped store rows into typed rollups. Each query issues one grouped
//! sum (plus one savings query where savings are reported) and caches the
//! result under its exact window.

use chrono::{DateTime, Utc};
use pressledger_common::{
    CostAnalysis, DepartmentId, DepartmentStatistics, PeriodTotals, PolicyConfiguration,
    PrinterStatistics, Result, SavingsSummary, StatisticsSnapshot, StatsWindow, UserStatistics,
};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::cache::{CacheKey, StatisticsCache, StatsKind};
use crate::metrics::CostGuardMetrics;
use crate::store::{GroupBy, GroupedRow, RecordFilter, RecordStore, SavingsRates, SavingsRow};

/// TTLs for cached statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtlPolicy {
    /// Windows that end after the query time
    pub open_window_ttl: Duration,
    /// Windows entirely in the past
    pub closed_window_ttl: Duration,
}

impl Default for CacheTtlPolicy {
    fn default() -> Self {
        Self {
            open_window_ttl: Duration::from_secs(crate::DEFAULT_OPEN_WINDOW_TTL_SECS),
            closed_window_ttl: Duration::from_secs(crate::DEFAULT_CLOSED_WINDOW_TTL_SECS),
        }
    }
}

impl CacheTtlPolicy {
    /// Windows that ended within the last `open_window_ttl` still count as open
    pub fn for_window(&self, window: &StatsWindow, now: DateTime<Utc>) -> Duration {
        let grace = chrono::Duration::from_std(self.open_window_ttl)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let recent = now
            .checked_sub_signed(grace)
            .map_or(true, |cutoff| window.is_open_at(cutoff));
        if recent {
            self.open_window_ttl
        } else {
            self.closed_window_ttl
        }
    }
}

/// Cached statistics over a record store
pub struct StatisticsAggregator {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn StatisticsCache>,
    ttl: CacheTtlPolicy,
    /// Monthly budget per department
    budgets: HashMap<DepartmentId, Decimal>,
    metrics: Option<Arc<CostGuardMetrics>>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<dyn StatisticsCache>) -> Self {
        Self {
            store,
            cache,
            ttl: CacheTtlPolicy::default(),
            budgets: HashMap::new(),
            metrics: None,
        }
    }

    /// Set cache TTLs
    pub fn with_ttl(mut self, ttl: CacheTtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set department budgets
    pub fn with_budgets(mut self, budgets: HashMap<DepartmentId, Decimal>) -> Self {
        self.budgets = budgets;
        self
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Arc<CostGuardMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Overall totals and savings for `[start, end)`
    #[instrument(skip(self, config))]
    pub async fn overall(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        config: &PolicyConfiguration,
    ) -> Result<StatisticsSnapshot> {
        let window = StatsWindow::new(start, end)?;
        let key = CacheKey::new(StatsKind::Overall, window).with_rates(savings_rates(config));
        self.cached(key, self.compute_overall(window, config)).await
    }

    /// Per-department totals, ordered by department id
    #[instrument(skip(self))]
    pub async fn by_department(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DepartmentStatistics>> {
        let window = StatsWindow::new(start, end)?;
        let key = CacheKey::new(StatsKind::Department, window);
        self.cached(key, self.compute_by_department(window)).await
    }

    /// Per-user totals within a department, most expensive first
    #[instrument(skip(self))]
    pub async fn by_user(
        &self,
        department_id: DepartmentId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UserStatistics>> {
        let window = StatsWindow::new(start, end)?;
        let key = CacheKey::for_department(StatsKind::User, window, department_id);
        self.cached(
            key,
            self.compute_by_user(RecordFilter::department(department_id), window),
        )
        .await
    }

    /// Per-printer totals, busiest first
    #[instrument(skip(self))]
    pub async fn by_printer(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PrinterStatistics>> {
        let window = StatsWindow::new(start, end)?;
        let key = CacheKey::new(StatsKind::Printer, window);
        self.cached(key, self.compute_by_printer(window)).await
    }

    /// Totals, savings and user ranking, optionally scoped to one department
    #[instrument(skip(self, config))]
    pub async fn cost_analysis(
        &self,
        department_id: Option<DepartmentId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        config: &PolicyConfiguration,
    ) -> Result<CostAnalysis> {
        let window = StatsWindow::new(start, end)?;
        let key = match department_id {
            Some(id) => CacheKey::for_department(StatsKind::CostAnalysis, window, id),
            None => CacheKey::new(StatsKind::CostAnalysis, window),
        }
        .with_rates(savings_rates(config));
        self.cached(key, self.compute_cost_analysis(department_id, window, config))
            .await
    }

    /// Drop cached entries whose window contains `timestamp`
    pub async fn invalidate_containing(&self, timestamp: DateTime<Utc>) -> u64 {
        match self.cache.invalidate_containing(timestamp).await {
            Ok(count) => {
                debug!(count, %timestamp, "Invalidated cached statistics");
                count
            }
            Err(e) => {
                warn!(error = %e, "Statistics cache invalidation failed");
                0
            }
        }
    }

    /// Drop every cached entry
    pub async fn clear_cache(&self) -> u64 {
        match self.cache.clear().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Statistics cache clear failed");
                0
            }
        }
    }

    /// Serve from cache, or compute and cache on success
    async fn cached<T, Fut>(&self, key: CacheKey, compute: Fut) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T>>,
    {
        match self.cache.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value::<T>(value) {
                Ok(hit) => {
                    debug!(kind = key.kind.as_str(), "Statistics cache hit");
                    if let Some(metrics) = &self.metrics {
                        metrics.cache_hits.inc();
                    }
                    return Ok(hit);
                }
                Err(e) => warn!(error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Statistics cache read failed"),
        }

        if let Some(metrics) = &self.metrics {
            metrics.cache_misses.inc();
        }

        let fresh = match compute.await {
            Ok(fresh) => fresh,
            Err(e) => {
                if e.is_store_error() {
                    if let Some(metrics) = &self.metrics {
                        metrics.store_errors.inc();
                    }
                }
                return Err(e);
            }
        };

        let ttl = self.ttl.for_window(&key.window, Utc::now());
        match serde_json::to_value(&fresh) {
            Ok(value) => {
                if let Err(e) = self.cache.put(&key, value, ttl).await {
                    warn!(error = %e, "Statistics cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "Statistics not cacheable"),
        }

        Ok(fresh)
    }

    async fn compute_overall(
        &self,
        window: StatsWindow,
        config: &PolicyConfiguration,
    ) -> Result<StatisticsSnapshot> {
        info!(start = %window.start, end = %window.end, "Computing overall statistics");

        let filter = RecordFilter::all();
        let totals = self.totals(&filter, &window).await?;
        let savings = self.savings(&filter, &window, config).await?;

        Ok(StatisticsSnapshot {
            period_start: window.start,
            period_end: window.end,
            totals,
            savings,
        })
    }

    async fn compute_by_department(&self, window: StatsWindow) -> Result<Vec<DepartmentStatistics>> {
        info!(start = %window.start, end = %window.end, "Computing department statistics");

        let mut rows = self
            .store
            .grouped_sum(GroupBy::Department, &RecordFilter::all(), &window)
            .await?;
        rows.sort_by_key(|row| row.key);

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let department_id = row.key?;
                let stats = DepartmentStatistics::new(department_id, row.totals, row.policies);
                Some(match self.budgets.get(&department_id) {
                    Some(budget) => stats.with_budget(*budget),
                    None => stats,
                })
            })
            .collect())
    }

    async fn compute_by_user(
        &self,
        filter: RecordFilter,
        window: StatsWindow,
    ) -> Result<Vec<UserStatistics>> {
        info!(
            department = ?filter.department_id,
            start = %window.start,
            end = %window.end,
            "Computing user statistics"
        );

        let mut rows = self.store.grouped_sum(GroupBy::User, &filter, &window).await?;
        rows.sort_by(|a, b| {
            b.totals
                .total_cost
                .cmp(&a.totals.total_cost)
                .then(a.key.cmp(&b.key))
        });

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(UserStatistics {
                    user_id: row.key?,
                    totals: row.totals,
                    policies: row.policies,
                })
            })
            .collect())
    }

    async fn compute_by_printer(&self, window: StatsWindow) -> Result<Vec<PrinterStatistics>> {
        info!(start = %window.start, end = %window.end, "Computing printer statistics");

        let mut rows = self
            .store
            .grouped_sum(GroupBy::Printer, &RecordFilter::all(), &window)
            .await?;
        rows.sort_by(|a, b| {
            b.totals
                .job_count
                .cmp(&a.totals.job_count)
                .then(a.key.cmp(&b.key))
        });

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(PrinterStatistics {
                    printer_id: row.key?,
                    totals: row.totals,
                    policies: row.policies,
                })
            })
            .collect())
    }

    async fn compute_cost_analysis(
        &self,
        department_id: Option<DepartmentId>,
        window: StatsWindow,
        config: &PolicyConfiguration,
    ) -> Result<CostAnalysis> {
        info!(department = ?department_id, start = %window.start, end = %window.end, "Computing cost analysis");

        let filter = department_id
            .map(RecordFilter::department)
            .unwrap_or_default();
        let totals = self.totals(&filter, &window).await?;
        let savings = self.savings(&filter, &window, config).await?;
        let users = match department_id {
            Some(_) => self.compute_by_user(filter.clone(), window).await?,
            None => Vec::new(),
        };

        let gross = totals.total_cost + savings.total_savings;
        let savings_rate_percentage = if gross > Decimal::ZERO {
            Some((savings.total_savings / gross * Decimal::ONE_HUNDRED).round_dp(2))
        } else {
            None
        };

        Ok(CostAnalysis {
            period_start: window.start,
            period_end: window.end,
            department_id,
            totals,
            savings,
            savings_rate_percentage,
            users,
        })
    }

    async fn totals(&self, filter: &RecordFilter, window: &StatsWindow) -> Result<PeriodTotals> {
        let rows = self
            .store
            .grouped_sum(GroupBy::Overall, filter, window)
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row: GroupedRow| row.totals)
            .unwrap_or_default())
    }

    async fn savings(
        &self,
        filter: &RecordFilter,
        window: &StatsWindow,
        config: &PolicyConfiguration,
    ) -> Result<SavingsSummary> {
        let row: SavingsRow = self
            .store
            .grouped_savings(filter, window, savings_rates(config))
            .await?;

        Ok(SavingsSummary {
            color_converted_count: row.color_converted_count,
            duplex_enforced_count: row.duplex_enforced_count,
            color_savings: row.color_savings,
            duplex_savings: row.duplex_savings,
            total_savings: row.color_savings + row.duplex_savings,
        })
    }
}

fn savings_rates(config: &PolicyConfiguration) -> SavingsRates {
    SavingsRates {
        color_cost_diff: config.pricing.color_cost_diff(),
        duplex_saving_per_page: config.pricing.duplex_saving_per_page,
    }
}
