//! # PressLedger Common
//!
//! Shared types and errors for the PressLedger print cost ledger.
//!
//! ## Core Types
//!
//! - [`PrintJobSubmission`]/[`PrintJobRecord`]: one print event, before and after validation
//! - [`PolicyConfiguration`]/[`PricingSchedule`]: policy switches and per-page prices
//! - [`SavingsReport`]: savings attributed to the policies that fired on a job
//! - [`StatisticsSnapshot`]: aggregate totals and savings over a time window

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{JobError, PressLedgerError, RangeError, Result, StoreError};
pub use types::{
    job_record::{
        AppliedPolicy, DepartmentId, JobStage, JobStatus, PrintJobRecord, PrintJobSubmission,
        PrinterId, UserId,
    },
    pricing::{
        ColorSavingsBasis, CostBreakdown, PolicyConfiguration, PricingSchedule, SavingsReport,
    },
    statistics::{
        CostAnalysis, DepartmentStatistics, PeriodTotals, PolicyCounts, PrinterStatistics,
        SavingsSummary, StatisticsSnapshot, StatsWindow, UserStatistics,
    },
};

/// PressLedger version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default black/white price per page (minor currency units)
pub const DEFAULT_PRICE_PER_PAGE_BW: u32 = 30;

/// Default color price per page (minor currency units)
pub const DEFAULT_PRICE_PER_PAGE_COLOR: u32 = 150;

/// Default duplex discount per page (minor currency units)
pub const DEFAULT_DUPLEX_DISCOUNT_PER_PAGE: u32 = 20;

/// Default reported saving per converted color page
pub const DEFAULT_COLOR_CONVERSION_SAVING_PER_PAGE: u32 = 120;

/// Default reported saving per sheet avoided by duplex
pub const DEFAULT_DUPLEX_SAVING_PER_PAGE: u32 = 30;

/// Default color ratio threshold, in percent (10%)
pub const DEFAULT_COLOR_RATIO_THRESHOLD_PCT: i64 = 10;
