//! Prometheus metrics for CostGuard

use pressledger_common::{PressLedgerError, Result};
use prometheus::{Counter, IntCounter, Registry};

/// Counters for job submission and statistics queries
pub struct CostGuardMetrics {
    pub jobs_submitted: IntCounter,
    pub jobs_rejected: IntCounter,
    pub color_conversions: IntCounter,
    pub duplex_enforcements: IntCounter,
    pub savings_total: Counter,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub store_errors: IntCounter,
}

fn metric_error(err: prometheus::Error) -> PressLedgerError {
    PressLedgerError::Internal(format!("Metric setup failed: {}", err))
}

impl CostGuardMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            jobs_submitted: IntCounter::new(
                "pressledger_jobs_submitted_total",
                "Print jobs stored after policy evaluation",
            )
            .map_err(metric_error)?,
            jobs_rejected: IntCounter::new(
                "pressledger_jobs_rejected_total",
                "Print job submissions rejected by validation",
            )
            .map_err(metric_error)?,
            color_conversions: IntCounter::new(
                "pressledger_color_conversions_total",
                "Jobs converted from color to black/white",
            )
            .map_err(metric_error)?,
            duplex_enforcements: IntCounter::new(
                "pressledger_duplex_enforcements_total",
                "Jobs forced to duplex",
            )
            .map_err(metric_error)?,
            savings_total: Counter::new(
                "pressledger_savings_total",
                "Savings attributed to cost policies (currency units)",
            )
            .map_err(metric_error)?,
            cache_hits: IntCounter::new(
                "pressledger_statistics_cache_hits_total",
                "Statistics queries served from cache",
            )
            .map_err(metric_error)?,
            cache_misses: IntCounter::new(
                "pressledger_statistics_cache_misses_total",
                "Statistics queries computed from the store",
            )
            .map_err(metric_error)?,
            store_errors: IntCounter::new(
                "pressledger_store_errors_total",
                "Record store calls that failed",
            )
            .map_err(metric_error)?,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry
            .register(Box::new(self.jobs_submitted.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.jobs_rejected.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.color_conversions.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.duplex_enforcements.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.savings_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.cache_hits.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.cache_misses.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(self.store_errors.clone()))
            .map_err(metric_error)?;
        Ok(())
    }
}
