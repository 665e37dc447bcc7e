//! Cost-reduction policy engine
//!
//! Evaluates, in order:
//! 1. Color-to-bw auto conversion for jobs under the color ratio threshold
//! 2. Forced duplex for eligible simplex jobs
//!
//! Only a `Raw` record is evaluated, so applying the engine twice is a no-op.

use pressledger_common::{AppliedPolicy, JobStage, PolicyConfiguration, PrintJobRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::pricing::SavingsCalculator;

/// What the engine did to one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Policies that fired, in evaluation order
    pub applied: Vec<AppliedPolicy>,
    /// Record was already evaluated and left untouched
    pub already_evaluated: bool,
}

impl PolicyOutcome {
    pub fn fired(&self, policy: AppliedPolicy) -> bool {
        self.applied.contains(&policy)
    }
}

/// Stateless policy engine
pub struct PolicyEngine;

impl PolicyEngine {
    /// Apply every enabled policy to a raw record
    pub fn apply(record: &mut PrintJobRecord, config: &PolicyConfiguration) -> PolicyOutcome {
        if record.stage != JobStage::Raw {
            debug!(job_id = %record.job_id, stage = ?record.stage, "Policies already evaluated");
            return PolicyOutcome {
                applied: Vec::new(),
                already_evaluated: true,
            };
        }

        debug!(job_id = %record.job_id, "Applying cost policies");
        let mut outcome = PolicyOutcome::default();

        if config.auto_convert_color_to_bw && Self::should_convert_color(record, config) {
            Self::convert_color_to_bw(record, config);
            outcome.applied.push(AppliedPolicy::ColorToBwAutoConvert);
        }

        if config.force_duplex && Self::should_force_duplex(record) {
            Self::enforce_duplex(record, config);
            outcome.applied.push(AppliedPolicy::ForceDuplex);
        }

        record.stage = JobStage::Evaluated;
        debug!(job_id = %record.job_id, applied = ?outcome.applied, "Cost policies applied");
        outcome
    }

    /// Color pages present and `color / total ≤ threshold`
    pub fn should_convert_color(record: &PrintJobRecord, config: &PolicyConfiguration) -> bool {
        if record.color_page_count == 0 || record.page_count == 0 {
            return false;
        }
        // color / total ≤ t  ⇔  color ≤ t × total, without a division
        Decimal::from(record.color_page_count)
            <= config.color_page_ratio_threshold * Decimal::from(record.page_count)
    }

    /// Simplex, not A3/PHOTO, at least two pages
    pub fn should_force_duplex(record: &PrintJobRecord) -> bool {
        !record.is_duplex && !record.is_duplex_exempt_paper() && record.page_count >= 2
    }

    fn convert_color_to_bw(record: &mut PrintJobRecord, config: &PolicyConfiguration) {
        let color_pages = record.color_page_count;
        let ratio = record.color_ratio();

        record.bw_page_count += color_pages;
        record.converted_color_pages = color_pages;
        record.color_page_count = 0;
        record.was_color_converted = true;
        record.record_policy(AppliedPolicy::ColorToBwAutoConvert);

        info!(
            job_id = %record.job_id,
            color_pages,
            color_ratio = %ratio,
            estimated_saving = %(Decimal::from(color_pages)
                * config.pricing.color_conversion_saving_per_page),
            "Color job converted to black/white"
        );
    }

    fn enforce_duplex(record: &mut PrintJobRecord, config: &PolicyConfiguration) {
        record.is_duplex = true;
        record.was_duplex_enforced = true;
        record.record_policy(AppliedPolicy::ForceDuplex);

        let sheets_saved = SavingsCalculator::sheets_saved(record.page_count);
        info!(
            job_id = %record.job_id,
            sheets_saved,
            estimated_saving = %(Decimal::from(sheets_saved)
                * config.pricing.duplex_saving_per_page),
            "Duplex enforced"
        );
    }
}
