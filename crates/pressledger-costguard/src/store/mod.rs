//! Record store interface
//!
//! The ledger of costed print jobs lives behind [`RecordStore`]. Range queries
//! are half-open `[start, end)`; grouping and summation happen in the store.

pub mod memory;

use async_trait::async_trait;
use pressledger_common::{
    DepartmentId, PeriodTotals, PolicyCounts, PrintJobRecord, PrinterId, StatsWindow, StoreError,
    UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use memory::InMemoryRecordStore;

/// Optional equality filters applied before grouping
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordFilter {
    pub department_id: Option<DepartmentId>,
    pub user_id: Option<UserId>,
    pub printer_id: Option<PrinterId>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn department(department_id: DepartmentId) -> Self {
        Self {
            department_id: Some(department_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &PrintJobRecord) -> bool {
        self.department_id.map_or(true, |id| record.department_id == id)
            && self.user_id.map_or(true, |id| record.user_id == id)
            && self.printer_id.map_or(true, |id| record.printer_id == id)
    }
}

/// Grouping key for summed queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Single row over the whole range
    Overall,
    Department,
    User,
    Printer,
}

impl GroupBy {
    /// Key of a record under this grouping
    pub fn key_of(&self, record: &PrintJobRecord) -> Option<u64> {
        match self {
            GroupBy::Overall => None,
            GroupBy::Department => Some(record.department_id),
            GroupBy::User => Some(record.user_id),
            GroupBy::Printer => Some(record.printer_id),
        }
    }
}

/// One group from [`RecordStore::grouped_sum`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedRow {
    /// Group key, `None` for [`GroupBy::Overall`]
    pub key: Option<u64>,
    pub totals: PeriodTotals,
    pub policies: PolicyCounts,
}

/// Rates the store multiplies savings by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SavingsRates {
    /// Color price minus bw price, per converted page
    pub color_cost_diff: Decimal,
    /// Saving per sheet avoided by forced duplex
    pub duplex_saving_per_page: Decimal,
}

/// Result of [`RecordStore::grouped_savings`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsRow {
    pub color_converted_count: u64,
    pub duplex_enforced_count: u64,
    pub color_savings: Decimal,
    pub duplex_savings: Decimal,
}

/// Storage backend for costed print job records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a costed record, returning it with its assigned id
    async fn insert(&self, record: PrintJobRecord) -> Result<PrintJobRecord, StoreError>;

    /// Records matching the filter in the window, ordered by timestamp
    async fn query_range(
        &self,
        filter: &RecordFilter,
        window: &StatsWindow,
    ) -> Result<Vec<PrintJobRecord>, StoreError>;

    /// Summed totals per group
    async fn grouped_sum(
        &self,
        group_by: GroupBy,
        filter: &RecordFilter,
        window: &StatsWindow,
    ) -> Result<Vec<GroupedRow>, StoreError>;

    /// Policy counts and savings sums
    async fn grouped_savings(
        &self,
        filter: &RecordFilter,
        window: &StatsWindow,
        rates: SavingsRates,
    ) -> Result<SavingsRow, StoreError>;
}
