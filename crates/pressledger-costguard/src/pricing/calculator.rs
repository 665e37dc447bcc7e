//! Job cost calculator
//!
//! ```text
//! bw    = bw_pages × bw_rate − (duplex ? total_pages × duplex_discount : 0)
//! color = color_pages × color_rate
//! total = bw + color
//! ```
//!
//! The duplex discount scales with the total page count and is taken from the
//! bw share only, so a color-heavy duplex job can end up with a negative bw cost.

use pressledger_common::{CostBreakdown, PricingSchedule, PrintJobRecord};
use rust_decimal::Decimal;
use tracing::debug;

/// Stateless cost calculator over a pricing schedule
pub struct CostCalculator;

impl CostCalculator {
    /// Compute the cost breakdown for a page split
    pub fn compute(
        bw_pages: u32,
        color_pages: u32,
        total_pages: u32,
        is_duplex: bool,
        pricing: &PricingSchedule,
    ) -> CostBreakdown {
        let mut bw_cost = Decimal::from(bw_pages) * pricing.price_per_page_bw;
        if is_duplex {
            bw_cost -= Decimal::from(total_pages) * pricing.duplex_discount_per_page;
        }
        let color_cost = Decimal::from(color_pages) * pricing.price_per_page_color;

        CostBreakdown {
            bw_cost,
            color_cost,
            total_cost: bw_cost + color_cost,
        }
    }

    /// Cost a record in place from its current page split and duplex flag
    pub fn price_record(record: &mut PrintJobRecord, pricing: &PricingSchedule) -> CostBreakdown {
        let cost = Self::compute(
            record.bw_page_count,
            record.color_page_count,
            record.page_count,
            record.is_duplex,
            pricing,
        );
        if cost.bw_cost < Decimal::ZERO {
            debug!(
                job_id = %record.job_id,
                bw_cost = %cost.bw_cost,
                "Duplex discount exceeds bw cost"
            );
        }
        record.set_cost(cost);
        cost
    }
}
