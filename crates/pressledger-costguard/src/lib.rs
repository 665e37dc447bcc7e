//! # CostGuard
//!
//! Print cost policies, job costing, savings and statistics for PressLedger.
//!
//! ## Submission Pipeline
//!
//! ```text
//! submission -> validate -> PolicyEngine -> CostCalculator -> RecordStore -> SavingsCalculator
//! ```
//!
//! Policies run in a fixed order: color-to-bw conversion, then forced duplex.
//! Cost is always computed from the post-policy page counts.

pub mod config;
pub mod metrics;
pub mod policy;
pub mod pricing;
pub mod statistics;
pub mod store;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pressledger_common::{
    CostAnalysis, DepartmentId, DepartmentStatistics, PolicyConfiguration, PrintJobRecord,
    PrintJobSubmission, PrinterStatistics, Result, SavingsReport, StatisticsSnapshot, StatsWindow,
    UserStatistics,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::CostGuardConfig;
use crate::metrics::CostGuardMetrics;
use crate::policy::PolicyEngine;
use crate::pricing::{CostCalculator, SavingsCalculator};
use crate::statistics::{StatisticsAggregator, StatisticsCache};
use crate::store::RecordStore;

/// Default bound on in-memory cache entries
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default TTL for windows that are still open
pub const DEFAULT_OPEN_WINDOW_TTL_SECS: u64 = 30;

/// Default TTL for windows entirely in the past
pub const DEFAULT_CLOSED_WINDOW_TTL_SECS: u64 = 600;

/// Stored record and the savings its policies produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReceipt {
    pub record: PrintJobRecord,
    pub savings: SavingsReport,
}

/// CostGuard service
pub struct CostGuard {
    /// Current policy, swapped whole on reload
    policy: RwLock<Arc<PolicyConfiguration>>,
    store: Arc<dyn RecordStore>,
    statistics: StatisticsAggregator,
    invalidate_on_write: bool,
    metrics: Option<Arc<CostGuardMetrics>>,
}

impl CostGuard {
    pub fn new(
        policy: PolicyConfiguration,
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn StatisticsCache>,
    ) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy: RwLock::new(Arc::new(policy)),
            statistics: StatisticsAggregator::new(store.clone(), cache),
            store,
            invalidate_on_write: false,
            metrics: None,
        })
    }

    /// Build from loaded configuration
    pub fn from_config(
        config: &CostGuardConfig,
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn StatisticsCache>,
    ) -> Result<Self> {
        config.validate()?;
        let mut guard = Self::new(config.policy_configuration(), store, cache)?;
        guard.statistics = guard
            .statistics
            .with_ttl(config.cache.ttl_policy())
            .with_budgets(config.budget_book());
        guard.invalidate_on_write = config.cache.invalidate_on_write;
        Ok(guard)
    }

    /// Evict cached windows containing each stored job
    pub fn with_invalidate_on_write(mut self, enabled: bool) -> Self {
        self.invalidate_on_write = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<CostGuardMetrics>) -> Self {
        self.statistics = self.statistics.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Snapshot of the current policy
    pub fn policy(&self) -> Arc<PolicyConfiguration> {
        self.policy.read().clone()
    }

    /// Validate, apply policies, cost, store and report savings for one job
    #[instrument(skip(self, submission), fields(job_id = ?submission.job_id))]
    pub async fn submit_job(&self, submission: PrintJobSubmission) -> Result<JobReceipt> {
        let mut record = match submission.validate() {
            Ok(record) => record,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.jobs_rejected.inc();
                }
                warn!(error = %e, "Rejected print job");
                return Err(e.into());
            }
        };

        let config = self.policy();
        let outcome = PolicyEngine::apply(&mut record, &config);
        CostCalculator::price_record(&mut record, &config.pricing);

        let stored = match self.store.insert(record).await {
            Ok(stored) => stored,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.store_errors.inc();
                }
                return Err(e.into());
            }
        };

        let savings = SavingsCalculator::calculate(&stored, &config);

        if let Some(metrics) = &self.metrics {
            metrics.jobs_submitted.inc();
            if stored.was_color_converted {
                metrics.color_conversions.inc();
            }
            if stored.was_duplex_enforced {
                metrics.duplex_enforcements.inc();
            }
            metrics
                .savings_total
                .inc_by(savings.total_savings.to_f64().unwrap_or_default());
        }

        if self.invalidate_on_write {
            self.statistics.invalidate_containing(stored.timestamp).await;
        }

        info!(
            id = ?stored.id,
            total_cost = %stored.cost.total_cost,
            policies = outcome.applied.len(),
            savings = %savings.total_savings,
            "Stored print job"
        );

        Ok(JobReceipt {
            record: stored,
            savings,
        })
    }

    /// Swap in a new policy and drop cached statistics
    pub async fn reload_policy(&self, policy: PolicyConfiguration) -> Result<()> {
        policy.validate()?;
        *self.policy.write() = Arc::new(policy);

        let cleared = self.statistics.clear_cache().await;
        info!(cleared, "Reloaded cost policy");
        Ok(())
    }

    pub async fn overall(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<StatisticsSnapshot> {
        let config = self.policy();
        self.statistics.overall(start, end, &config).await
    }

    /// Overall statistics from the first of this month to now
    pub async fn overall_month_to_date(&self) -> Result<StatisticsSnapshot> {
        let window = StatsWindow::month_to_date(Utc::now());
        self.overall(window.start, window.end).await
    }

    pub async fn by_department(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DepartmentStatistics>> {
        self.statistics.by_department(start, end).await
    }

    pub async fn by_user(
        &self,
        department_id: DepartmentId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UserStatistics>> {
        self.statistics.by_user(department_id, start, end).await
    }

    pub async fn by_printer(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PrinterStatistics>> {
        self.statistics.by_printer(start, end).await
    }

    pub async fn cost_analysis(
        &self,
        department_id: Option<DepartmentId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CostAnalysis> {
        let config = self.policy();
        self.statistics
            .cost_analysis(department_id, start, end, &config)
            .await
    }
}
