//! In-memory record store
//!
//! Uses DashMap for concurrent access. Grouped queries scan the map, which is
//! fine for tests and the simulator but not for production volumes.

use async_trait::async_trait;
use dashmap::DashMap;
use pressledger_common::{JobStage, PrintJobRecord, StatsWindow, StoreError};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{GroupBy, GroupedRow, RecordFilter, RecordStore, SavingsRates, SavingsRow};
use crate::pricing::SavingsCalculator;

/// In-memory ledger of print job records
pub struct InMemoryRecordStore {
    /// All records by assigned id
    records: DashMap<u64, PrintJobRecord>,

    /// Next id to assign
    next_id: AtomicU64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matching(&self, filter: &RecordFilter, window: &StatsWindow) -> Vec<PrintJobRecord> {
        self.records
            .iter()
            .filter(|entry| window.contains(entry.timestamp) && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, mut record: PrintJobRecord) -> Result<PrintJobRecord, StoreError> {
        if record.stage != JobStage::Costed {
            return Err(StoreError::Rejected(format!(
                "job {} has not been costed",
                record.job_id
            )));
        }
        if let Some(id) = record.id {
            return Err(StoreError::Rejected(format!(
                "job {} is already stored with id {}",
                record.job_id, id
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        record.id = Some(id);
        self.records.insert(id, record.clone());

        debug!(id, job_id = %record.job_id, "Stored print job");
        Ok(record)
    }

    async fn query_range(
        &self,
        filter: &RecordFilter,
        window: &StatsWindow,
    ) -> Result<Vec<PrintJobRecord>, StoreError> {
        let mut records = self.matching(filter, window);
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn grouped_sum(
        &self,
        group_by: GroupBy,
        filter: &RecordFilter,
        window: &StatsWindow,
    ) -> Result<Vec<GroupedRow>, StoreError> {
        let mut groups: BTreeMap<Option<u64>, GroupedRow> = BTreeMap::new();
        if group_by == GroupBy::Overall {
            groups.insert(
                None,
                GroupedRow {
                    key: None,
                    totals: Default::default(),
                    policies: Default::default(),
                },
            );
        }

        for record in self.matching(filter, window) {
            let key = group_by.key_of(&record);
            let row = groups.entry(key).or_insert_with(|| GroupedRow {
                key,
                totals: Default::default(),
                policies: Default::default(),
            });
            row.totals.add_record(&record);
            if record.was_color_converted {
                row.policies.color_converted += 1;
            }
            if record.was_duplex_enforced {
                row.policies.duplex_enforced += 1;
            }
        }

        Ok(groups.into_values().collect())
    }

    async fn grouped_savings(
        &self,
        filter: &RecordFilter,
        window: &StatsWindow,
        rates: SavingsRates,
    ) -> Result<SavingsRow, StoreError> {
        let mut row = SavingsRow::default();

        for record in self.matching(filter, window) {
            if record.was_color_converted {
                row.color_converted_count += 1;
                row.color_savings +=
                    Decimal::from(record.converted_color_pages) * rates.color_cost_diff;
            }
            if record.was_duplex_enforced {
                row.duplex_enforced_count += 1;
                row.duplex_savings += Decimal::from(SavingsCalculator::sheets_saved(
                    record.page_count,
                )) * rates.duplex_saving_per_page;
            }
        }

        Ok(row)
    }
}
