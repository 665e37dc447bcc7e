//! Integration tests for CostGuard
//!
//! Covers the full flow:
//! - Submission → policies → cost → store → savings
//! - Statistics rollups over stored jobs
//! - Cache behavior against a counting store and a failing store

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pressledger_common::{
    AppliedPolicy, ColorSavingsBasis, PolicyConfiguration, PressLedgerError, PrintJobRecord,
    PrintJobSubmission, StatsWindow, StoreError,
};
use pressledger_costguard::{
    statistics::{InMemoryStatisticsCache, StatisticsAggregator},
    store::{
        GroupBy, GroupedRow, InMemoryRecordStore, RecordFilter, RecordStore, SavingsRates,
        SavingsRow,
    },
    CostGuard,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
}

/// Store wrapper counting grouped queries
struct CountingStore {
    inner: InMemoryRecordStore,
    grouped_calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryRecordStore::new(),
            grouped_calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.grouped_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn insert(&self, record: PrintJobRecord) -> Result<PrintJobRecord, StoreError> {
        self.inner.insert(record).await
    }

    async fn query_range(
        &self,
        filter: &RecordFilter,
        window: &StatsWindow,
    ) -> Result<Vec<PrintJobRecord>, StoreError> {
        self.inner.query_range(filter, window).await
    }

    async fn grouped_sum(
        &self,
        group_by: GroupBy,
        filter: &RecordFilter,
        window: &StatsWindow,
    ) -> Result<Vec<GroupedRow>, StoreError> {
        self.grouped_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.grouped_sum(group_by, filter, window).await
    }

    async fn grouped_savings(
        &self,
        filter: &RecordFilter,
        window: &StatsWindow,
        rates: SavingsRates,
    ) -> Result<SavingsRow, StoreError> {
        self.grouped_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.grouped_savings(filter, window, rates).await
    }
}

/// Store that is always unreachable
struct FailingStore;

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert(&self, _record: PrintJobRecord) -> Result<PrintJobRecord, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn query_range(
        &self,
        _filter: &RecordFilter,
        _window: &StatsWindow,
    ) -> Result<Vec<PrintJobRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn grouped_sum(
        &self,
        _group_by: GroupBy,
        _filter: &RecordFilter,
        _window: &StatsWindow,
    ) -> Result<Vec<GroupedRow>, StoreError> {
        Err(StoreError::Timeout(Duration::from_secs(5)))
    }

    async fn grouped_savings(
        &self,
        _filter: &RecordFilter,
        _window: &StatsWindow,
        _rates: SavingsRates,
    ) -> Result<SavingsRow, StoreError> {
        Err(StoreError::Timeout(Duration::from_secs(5)))
    }
}

async fn seed(guard: &CostGuard) {
    let jobs = [
        // dept 1: converted + duplex
        PrintJobSubmission::new("j1", 1, 11, 1, 10, 1, 9).with_timestamp(ts(1, 9)),
        // dept 1: heavy color, duplex only
        PrintJobSubmission::new("j2", 2, 12, 1, 4, 4, 0).with_timestamp(ts(2, 9)),
        // dept 2: already duplex, no policy
        PrintJobSubmission::new("j3", 1, 21, 2, 6, 0, 6)
            .with_duplex(true)
            .with_timestamp(ts(3, 9)),
        // dept 2: A3 exempt from duplex, single page
        PrintJobSubmission::new("j4", 1, 21, 2, 1, 0, 1)
            .with_paper_size("A3")
            .with_timestamp(ts(4, 9)),
        // outside the window
        PrintJobSubmission::new("j5", 2, 11, 1, 8, 0, 8).with_timestamp(ts(20, 9)),
    ];

    for job in jobs {
        guard.submit_job(job).await.unwrap();
    }
}

fn memory_guard(policy: PolicyConfiguration) -> CostGuard {
    CostGuard::new(
        policy,
        Arc::new(InMemoryRecordStore::new()),
        Arc::new(InMemoryStatisticsCache::default()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_end_to_end_statistics() {
    let guard = memory_guard(PolicyConfiguration::default());
    seed(&guard).await;

    let (start, end) = (ts(1, 0), ts(10, 0));
    let overall = guard.overall(start, end).await.unwrap();

    assert_eq!(overall.totals.job_count, 4);
    assert_eq!(overall.totals.total_pages, 21);
    assert_eq!(overall.totals.color_pages, 4);
    // j1: 10×30 − 10×20 = 100; j2: −4×20 + 4×150 = 520; j3: 6×30 − 6×20 = 60; j4: 30
    assert_eq!(overall.totals.total_cost, dec!(710));
    assert_eq!(overall.savings.color_converted_count, 1);
    assert_eq!(overall.savings.duplex_enforced_count, 2);
    // one converted page × (150 − 30)
    assert_eq!(overall.savings.color_savings, dec!(120));
    // (5 + 2) sheets × 30
    assert_eq!(overall.savings.duplex_savings, dec!(210));

    let departments = guard.by_department(start, end).await.unwrap();
    assert_eq!(departments.len(), 2);
    assert_eq!(departments[0].department_id, 1);
    assert_eq!(departments[0].totals.total_cost, dec!(620));
    assert_eq!(departments[1].totals.job_count, 2);

    let users = guard.by_user(1, start, end).await.unwrap();
    assert_eq!(users[0].user_id, 12);
    assert_eq!(users[1].user_id, 11);

    let printers = guard.by_printer(start, end).await.unwrap();
    assert_eq!(printers[0].printer_id, 1);
    assert_eq!(printers[0].totals.job_count, 3);
}

#[tokio::test]
async fn test_policy_tags_accumulate() {
    let guard = memory_guard(PolicyConfiguration::default());
    let receipt = guard
        .submit_job(PrintJobSubmission::new("both", 1, 1, 1, 20, 2, 18))
        .await
        .unwrap();

    assert!(receipt.record.has_policy(AppliedPolicy::ColorToBwAutoConvert));
    assert_eq!(
        receipt.record.primary_policy(),
        Some(AppliedPolicy::ForceDuplex)
    );
}

#[tokio::test]
async fn test_exact_color_savings_basis() {
    let exact = PolicyConfiguration::default().with_savings_basis(ColorSavingsBasis::ConvertedPages);
    let guard = memory_guard(exact);
    let receipt = guard
        .submit_job(
            PrintJobSubmission::new("c", 1, 1, 1, 10, 1, 9)
                .with_paper_size("PHOTO")
                .with_timestamp(ts(1, 9)),
        )
        .await
        .unwrap();

    assert_eq!(receipt.savings.color_savings, dec!(120));
    assert_eq!(receipt.savings.duplex_savings, Decimal::ZERO);
}

#[tokio::test]
async fn test_cache_hit_does_not_requery_store() {
    let store = Arc::new(CountingStore::new());
    let guard = CostGuard::new(
        PolicyConfiguration::default(),
        store.clone(),
        Arc::new(InMemoryStatisticsCache::default()),
    )
    .unwrap();
    seed(&guard).await;

    let (start, end) = (ts(1, 0), ts(10, 0));
    guard.overall(start, end).await.unwrap();
    let after_first = store.calls();
    assert_eq!(after_first, 2);

    guard.overall(start, end).await.unwrap();
    guard.overall(start, end).await.unwrap();
    assert_eq!(store.calls(), after_first);

    // different window is a different key
    guard.overall(start, ts(9, 0)).await.unwrap();
    assert_eq!(store.calls(), after_first + 2);
}

#[tokio::test]
async fn test_reversed_range_is_rejected() {
    let store = Arc::new(CountingStore::new());
    let guard = CostGuard::new(
        PolicyConfiguration::default(),
        store.clone(),
        Arc::new(InMemoryStatisticsCache::default()),
    )
    .unwrap();

    let err = guard.by_department(ts(5, 0), ts(1, 0)).await.unwrap_err();
    assert!(matches!(err, PressLedgerError::Range(_)));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_empty_range_returns_zeros() {
    let guard = memory_guard(PolicyConfiguration::default());
    seed(&guard).await;

    let snapshot = guard.overall(ts(5, 0), ts(5, 0)).await.unwrap();
    assert_eq!(snapshot.totals.job_count, 0);
    assert_eq!(snapshot.totals.total_cost, Decimal::ZERO);
    assert!(snapshot.savings.total_savings.is_zero());

    assert!(guard.by_printer(ts(5, 0), ts(6, 0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_store_surfaces_errors_and_skips_cache() {
    let cache = Arc::new(InMemoryStatisticsCache::default());
    let guard = CostGuard::new(
        PolicyConfiguration::default(),
        Arc::new(FailingStore),
        cache.clone(),
    )
    .unwrap();

    let err = guard
        .submit_job(PrintJobSubmission::new("x", 1, 1, 1, 2, 0, 2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PressLedgerError::Store(StoreError::Unavailable(_))
    ));

    let err = guard.overall(ts(1, 0), ts(2, 0)).await.unwrap_err();
    assert!(matches!(
        err,
        PressLedgerError::Store(StoreError::Timeout(d)) if d == Duration::from_secs(5)
    ));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_department_budgets() {
    let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
    let guard = CostGuard::new(
        PolicyConfiguration::disabled(),
        store.clone(),
        Arc::new(InMemoryStatisticsCache::default()),
    )
    .unwrap();
    guard
        .submit_job(PrintJobSubmission::new("a", 1, 1, 1, 10, 0, 10).with_timestamp(ts(2, 9)))
        .await
        .unwrap();

    let aggregator = StatisticsAggregator::new(store, Arc::new(InMemoryStatisticsCache::default()))
        .with_budgets(HashMap::from([(1, dec!(1200))]));
    let departments = aggregator.by_department(ts(1, 0), ts(30, 0)).await.unwrap();

    assert_eq!(departments[0].monthly_budget, Some(dec!(1200)));
    assert_eq!(departments[0].budget_usage_percentage, Some(dec!(25)));
    assert_eq!(departments[0].remaining_budget, Some(dec!(900)));
}
