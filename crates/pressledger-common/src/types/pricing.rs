//! Pricing and policy configuration
//!
//! Job cost is derived from page counts:
//! - BW: bw pages × bw rate, minus a per-page duplex discount on duplex jobs
//! - Color: color pages × color rate
//!
//! Total: bw cost + color cost

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PressLedgerError, Result};

/// Per-page prices and the savings constants used in reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSchedule {
    /// Cost of one black/white page
    pub price_per_page_bw: Decimal,

    /// Cost of one color page
    pub price_per_page_color: Decimal,

    /// Discount per page (scaled by total pages) for duplex jobs
    pub duplex_discount_per_page: Decimal,

    /// Reported saving per page reclassified from color to bw
    pub color_conversion_saving_per_page: Decimal,

    /// Reported saving per sheet avoided by forced duplex
    pub duplex_saving_per_page: Decimal,
}

impl Default for PricingSchedule {
    fn default() -> Self {
        Self {
            price_per_page_bw: Decimal::from(crate::DEFAULT_PRICE_PER_PAGE_BW),
            price_per_page_color: Decimal::from(crate::DEFAULT_PRICE_PER_PAGE_COLOR),
            duplex_discount_per_page: Decimal::from(crate::DEFAULT_DUPLEX_DISCOUNT_PER_PAGE),
            color_conversion_saving_per_page: Decimal::from(
                crate::DEFAULT_COLOR_CONVERSION_SAVING_PER_PAGE,
            ),
            duplex_saving_per_page: Decimal::from(crate::DEFAULT_DUPLEX_SAVING_PER_PAGE),
        }
    }
}

impl PricingSchedule {
    /// Price difference between a color page and a bw page
    pub fn color_cost_diff(&self) -> Decimal {
        self.price_per_page_color - self.price_per_page_bw
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("price_per_page_bw", self.price_per_page_bw),
            ("price_per_page_color", self.price_per_page_color),
            ("duplex_discount_per_page", self.duplex_discount_per_page),
            (
                "color_conversion_saving_per_page",
                self.color_conversion_saving_per_page,
            ),
            ("duplex_saving_per_page", self.duplex_saving_per_page),
        ];

        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(PressLedgerError::Config(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Multiplier used for color-conversion savings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSavingsBasis {
    /// Current bw page count of the converted job (historical ledger figure)
    #[default]
    PostConversionBwPages,
    /// Exact number of pages the conversion reclassified
    ConvertedPages,
}

/// Cost-reduction policy configuration, shared read-only per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfiguration {
    /// Reclassify low-color jobs as black/white
    pub auto_convert_color_to_bw: bool,

    /// Force eligible simplex jobs to duplex
    pub force_duplex: bool,

    /// Maximum color/total ratio (inclusive) eligible for conversion
    pub color_page_ratio_threshold: Decimal,

    /// How color-conversion savings are attributed
    pub color_savings_basis: ColorSavingsBasis,

    /// Prices and savings constants
    pub pricing: PricingSchedule,
}

impl Default for PolicyConfiguration {
    fn default() -> Self {
        Self {
            auto_convert_color_to_bw: true,
            force_duplex: true,
            color_page_ratio_threshold: Decimal::new(crate::DEFAULT_COLOR_RATIO_THRESHOLD_PCT, 2),
            color_savings_basis: ColorSavingsBasis::default(),
            pricing: PricingSchedule::default(),
        }
    }
}

impl PolicyConfiguration {
    /// Configuration with every policy switched off
    pub fn disabled() -> Self {
        Self {
            auto_convert_color_to_bw: false,
            force_duplex: false,
            ..Self::default()
        }
    }

    /// Set color conversion flag
    pub fn with_color_conversion(mut self, enabled: bool) -> Self {
        self.auto_convert_color_to_bw = enabled;
        self
    }

    /// Set forced duplex flag
    pub fn with_force_duplex(mut self, enabled: bool) -> Self {
        self.force_duplex = enabled;
        self
    }

    /// Set color ratio threshold
    pub fn with_threshold(mut self, threshold: Decimal) -> Self {
        self.color_page_ratio_threshold = threshold;
        self
    }

    /// Set savings basis
    pub fn with_savings_basis(mut self, basis: ColorSavingsBasis) -> Self {
        self.color_savings_basis = basis;
        self
    }

    /// Set pricing schedule
    pub fn with_pricing(mut self, pricing: PricingSchedule) -> Self {
        self.pricing = pricing;
        self
    }

    /// Check threshold bounds and price signs
    pub fn validate(&self) -> Result<()> {
        if self.color_page_ratio_threshold < Decimal::ZERO
            || self.color_page_ratio_threshold > Decimal::ONE
        {
            return Err(PressLedgerError::Config(format!(
                "color_page_ratio_threshold must be within [0, 1], got {}",
                self.color_page_ratio_threshold
            )));
        }
        self.pricing.validate()
    }
}

/// Monetary breakdown of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub bw_cost: Decimal,
    pub color_cost: Decimal,
    pub total_cost: Decimal,
}

/// Savings attributed to the policies that fired on one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavingsReport {
    /// Savings from color-to-bw conversion
    pub color_savings: Decimal,
    /// Savings from forced duplex
    pub duplex_savings: Decimal,
    /// Sum of both
    pub total_savings: Decimal,
}

impl SavingsReport {
    pub fn new(color_savings: Decimal, duplex_savings: Decimal) -> Self {
        Self {
            color_savings,
            duplex_savings,
            total_savings: color_savings + duplex_savings,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total_savings.is_zero()
    }
}
