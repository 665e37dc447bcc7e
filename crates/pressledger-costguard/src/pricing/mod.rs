//! Pricing module
//!
//! Provides per-job money figures:
//! - Cost breakdown from page split and duplex setting
//! - Savings attributed to the policies that fired

pub mod calculator;
pub mod savings;

pub use calculator::CostCalculator;
pub use savings::SavingsCalculator;
