//! Statistics types
//!
//! Aggregates of many job records over a half-open window `[start, end)`.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RangeError;
use crate::types::job_record::{DepartmentId, PrintJobRecord, PrinterId, UserId};

/// Half-open query window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StatsWindow {
    /// Create a window, rejecting an end before the start
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RangeError> {
        if end < start {
            return Err(RangeError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// First day of the current month at 00:00 UTC up to `now`
    ///
    /// The end is rounded up to the next whole second so that repeated calls
    /// within one second share a window.
    pub fn month_to_date(now: DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let end = if now.timestamp_subsec_nanos() == 0 {
            now
        } else {
            Utc.timestamp_opt(now.timestamp() + 1, 0)
                .single()
                .unwrap_or(now)
        };
        Self { start, end }
    }

    /// Whether a timestamp falls inside the window
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// A window still receiving jobs at `now`
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.end > now
    }
}

/// Page and cost totals for a group of jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub job_count: u64,
    pub total_pages: u64,
    pub color_pages: u64,
    pub bw_pages: u64,
    pub total_cost: Decimal,
}

impl PeriodTotals {
    /// Add one costed record
    pub fn add_record(&mut self, record: &PrintJobRecord) {
        self.job_count += 1;
        self.total_pages += u64::from(record.page_count);
        self.color_pages += u64::from(record.color_page_count);
        self.bw_pages += u64::from(record.bw_page_count);
        self.total_cost += record.cost.total_cost;
    }
}

/// Savings attributed to policies over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavingsSummary {
    pub color_converted_count: u64,
    pub duplex_enforced_count: u64,
    pub color_savings: Decimal,
    pub duplex_savings: Decimal,
    pub total_savings: Decimal,
}

/// Overall statistics for a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub totals: PeriodTotals,
    pub savings: SavingsSummary,
}

impl StatisticsSnapshot {
    /// All-zero snapshot for a window with no jobs
    pub fn empty(window: &StatsWindow) -> Self {
        Self {
            period_start: window.start,
            period_end: window.end,
            totals: PeriodTotals::default(),
            savings: SavingsSummary::default(),
        }
    }
}

/// Jobs touched by each policy within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyCounts {
    pub color_converted: u64,
    pub duplex_enforced: u64,
}

/// Per-department statistics with optional budget usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentStatistics {
    pub department_id: DepartmentId,
    pub totals: PeriodTotals,
    pub policies: PolicyCounts,
    pub monthly_budget: Option<Decimal>,
    /// Percentage of the budget spent, rounded to 2 places
    pub budget_usage_percentage: Option<Decimal>,
    pub remaining_budget: Option<Decimal>,
}

impl DepartmentStatistics {
    pub fn new(department_id: DepartmentId, totals: PeriodTotals, policies: PolicyCounts) -> Self {
        Self {
            department_id,
            totals,
            policies,
            monthly_budget: None,
            budget_usage_percentage: None,
            remaining_budget: None,
        }
    }

    /// Fill budget fields from a monthly budget
    pub fn with_budget(mut self, budget: Decimal) -> Self {
        self.monthly_budget = Some(budget);
        self.remaining_budget = Some(budget - self.totals.total_cost);
        self.budget_usage_percentage = if budget.is_zero() {
            None
        } else {
            Some((self.totals.total_cost / budget * Decimal::ONE_HUNDRED).round_dp(2))
        };
        self
    }
}

/// Per-user statistics within a department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub user_id: UserId,
    pub totals: PeriodTotals,
    pub policies: PolicyCounts,
}

/// Per-printer statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterStatistics {
    pub printer_id: PrinterId,
    pub totals: PeriodTotals,
    pub policies: PolicyCounts,
}

/// Cost analysis for a window, optionally scoped to one department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAnalysis {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub department_id: Option<DepartmentId>,
    pub totals: PeriodTotals,
    pub savings: SavingsSummary,
    /// Cost share of total spend that the policies avoided, as a percentage
    pub savings_rate_percentage: Option<Decimal>,
    /// Users ranked by cost; only filled for a department scope
    pub users: Vec<UserStatistics>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_reversed_range() {
        let err = StatsWindow::new(ts(2, 0), ts(1, 0)).unwrap_err();
        assert!(matches!(err, RangeError::EndBeforeStart { .. }));
        let empty = StatsWindow::new(ts(1, 0), ts(1, 0)).unwrap();
        assert!(!empty.contains(ts(1, 0)));
    }

    #[test]
    fn test_window_is_half_open() {
        let window = StatsWindow::new(ts(1, 0), ts(2, 0)).unwrap();
        assert!(window.contains(ts(1, 0)));
        assert!(window.contains(ts(1, 23)));
        assert!(!window.contains(ts(2, 0)));
    }

    #[test]
    fn test_month_to_date() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 15, 30, 0).unwrap();
        let window = StatsWindow::month_to_date(now);
        assert_eq!(window.start, ts(1, 0));
        assert_eq!(window.end, now);
        assert!(!window.is_open_at(now));
    }

    #[test]
    fn test_month_to_date_rounds_end_up() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 15, 30, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let later = now + chrono::Duration::milliseconds(500);

        let window = StatsWindow::month_to_date(now);
        assert_eq!(window.end, Utc.with_ymd_and_hms(2025, 3, 17, 15, 30, 1).unwrap());
        assert!(window.contains(now));
        assert!(window.is_open_at(now));
        assert_eq!(StatsWindow::month_to_date(later), window);
    }

    #[test]
    fn test_department_budget() {
        let totals = PeriodTotals {
            job_count: 4,
            total_pages: 40,
            color_pages: 0,
            bw_pages: 40,
            total_cost: dec!(1200),
        };
        let stats = DepartmentStatistics::new(7, totals, PolicyCounts::default())
            .with_budget(dec!(4800));

        assert_eq!(stats.remaining_budget, Some(dec!(3600)));
        assert_eq!(stats.budget_usage_percentage, Some(dec!(25)));
    }

    #[test]
    fn test_zero_budget_has_no_percentage() {
        let stats = DepartmentStatistics::new(1, PeriodTotals::default(), PolicyCounts::default())
            .with_budget(Decimal::ZERO);
        assert_eq!(stats.budget_usage_percentage, None);
        assert_eq!(stats.remaining_budget, Some(Decimal::ZERO));
    }

    #[test]
    fn test_empty_snapshot() {
        let window = StatsWindow::new(ts(1, 0), ts(2, 0)).unwrap();
        let snapshot = StatisticsSnapshot::empty(&window);
        assert_eq!(snapshot.totals, PeriodTotals::default());
        assert_eq!(snapshot.savings.total_savings, Decimal::ZERO);
    }
}
