//! Savings attribution
//!
//! Computes what the fired policies saved on one job:
//! - Color conversion: pages × `color_conversion_saving_per_page`
//! - Forced duplex: ⌊total / 2⌋ × `duplex_saving_per_page`

use pressledger_common::{ColorSavingsBasis, PolicyConfiguration, PrintJobRecord, SavingsReport};
use rust_decimal::Decimal;

/// Stateless savings calculator
pub struct SavingsCalculator;

impl SavingsCalculator {
    /// Savings for a record that has been through the policy engine
    pub fn calculate(record: &PrintJobRecord, config: &PolicyConfiguration) -> SavingsReport {
        let pricing = &config.pricing;

        let color_savings = if record.was_color_converted {
            Decimal::from(Self::color_savings_pages(record, config.color_savings_basis))
                * pricing.color_conversion_saving_per_page
        } else {
            Decimal::ZERO
        };

        let duplex_savings = if record.was_duplex_enforced {
            Decimal::from(Self::sheets_saved(record.page_count)) * pricing.duplex_saving_per_page
        } else {
            Decimal::ZERO
        };

        SavingsReport::new(color_savings, duplex_savings)
    }

    /// Pages the color saving is multiplied by
    pub fn color_savings_pages(record: &PrintJobRecord, basis: ColorSavingsBasis) -> u32 {
        match basis {
            ColorSavingsBasis::PostConversionBwPages => record.bw_page_count,
            ColorSavingsBasis::ConvertedPages => record.converted_color_pages,
        }
    }

    /// Sheets avoided by printing `pages` double-sided
    pub fn sheets_saved(pages: u32) -> u32 {
        pages / 2
    }
}
