//! Print job records
//!
//! A [`PrintJobSubmission`] is untrusted caller input. Validation turns it into a
//! [`PrintJobRecord`], which then moves through
//! `Raw → Evaluated → Costed` before it is stored as a ledger entry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::types::pricing::CostBreakdown;

pub type PrinterId = u64;
pub type UserId = u64;
pub type DepartmentId = u64;

/// Paper sizes that are never forced to duplex
pub const DUPLEX_EXEMPT_PAPER_SIZES: [&str; 2] = ["A3", "PHOTO"];

/// Cost-saving policy that fired on a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppliedPolicy {
    /// Low-color job reclassified as black/white
    ColorToBwAutoConvert,
    /// Simplex job switched to duplex
    ForceDuplex,
}

impl AppliedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliedPolicy::ColorToBwAutoConvert => "COLOR_TO_BW_AUTO_CONVERT",
            AppliedPolicy::ForceDuplex => "FORCE_DUPLEX",
        }
    }
}

impl std::fmt::Display for AppliedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle position of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Validated, no policy evaluated yet
    Raw,
    /// Policies evaluated
    Evaluated,
    /// Cost fields populated
    Costed,
}

/// Job completion status reported by the printer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Completed,
    Failed,
    Cancelled,
}

/// Unvalidated print job as submitted by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJobSubmission {
    pub job_id: Option<String>,
    pub printer_id: Option<PrinterId>,
    pub user_id: Option<UserId>,
    pub department_id: Option<DepartmentId>,
    /// Defaults to the submission time
    pub timestamp: Option<DateTime<Utc>>,
    pub document_name: Option<String>,
    pub file_size_kb: Option<u64>,
    pub page_count: i64,
    #[serde(default)]
    pub color_page_count: i64,
    #[serde(default)]
    pub bw_page_count: i64,
    #[serde(default)]
    pub is_duplex: bool,
    #[serde(default = "default_copies")]
    pub copies: i64,
    #[serde(default = "default_paper_size")]
    pub paper_size: String,
    #[serde(default)]
    pub status: JobStatus,
}

fn default_copies() -> i64 {
    1
}

fn default_paper_size() -> String {
    "A4".to_string()
}

impl PrintJobSubmission {
    /// Create a submission with the required identifiers and page split
    pub fn new(
        job_id: impl Into<String>,
        printer_id: PrinterId,
        user_id: UserId,
        department_id: DepartmentId,
        page_count: i64,
        color_page_count: i64,
        bw_page_count: i64,
    ) -> Self {
        Self {
            job_id: Some(job_id.into()),
            printer_id: Some(printer_id),
            user_id: Some(user_id),
            department_id: Some(department_id),
            timestamp: None,
            document_name: None,
            file_size_kb: None,
            page_count,
            color_page_count,
            bw_page_count,
            is_duplex: false,
            copies: default_copies(),
            paper_size: default_paper_size(),
            status: JobStatus::default(),
        }
    }

    /// Set duplex flag
    pub fn with_duplex(mut self, is_duplex: bool) -> Self {
        self.is_duplex = is_duplex;
        self
    }

    /// Set paper size
    pub fn with_paper_size(mut self, paper_size: impl Into<String>) -> Self {
        self.paper_size = paper_size.into();
        self
    }

    /// Set timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set document name
    pub fn with_document(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    /// Set copies
    pub fn with_copies(mut self, copies: i64) -> Self {
        self.copies = copies;
        self
    }

    /// Validate and convert into a raw record, stamping `now` if no timestamp was given
    pub fn validate_at(self, now: DateTime<Utc>) -> Result<PrintJobRecord, JobError> {
        let job_id = match self.job_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(JobError::MissingIdentifier { field: "job_id" }),
        };
        let printer_id = require_id(self.printer_id, "printer_id")?;
        let user_id = require_id(self.user_id, "user_id")?;
        let department_id = require_id(self.department_id, "department_id")?;

        for (field, value) in [
            ("page_count", self.page_count),
            ("color_page_count", self.color_page_count),
            ("bw_page_count", self.bw_page_count),
        ] {
            if value < 0 {
                return Err(JobError::NegativePageCount { field, value });
            }
        }
        if self.page_count == 0 {
            return Err(JobError::NonPositiveTotal(self.page_count));
        }
        if self.color_page_count.saturating_add(self.bw_page_count) > self.page_count {
            return Err(JobError::PageSplitExceedsTotal {
                color: self.color_page_count,
                bw: self.bw_page_count,
                total: self.page_count,
            });
        }
        if self.copies < 1 {
            return Err(JobError::InvalidCopies(self.copies));
        }

        Ok(PrintJobRecord {
            id: None,
            job_id,
            printer_id,
            user_id,
            department_id,
            timestamp: self.timestamp.unwrap_or(now),
            document_name: self.document_name,
            file_size_kb: self.file_size_kb,
            page_count: to_pages(self.page_count)?,
            color_page_count: to_pages(self.color_page_count)?,
            bw_page_count: to_pages(self.bw_page_count)?,
            is_duplex: self.is_duplex,
            copies: to_pages(self.copies)?,
            paper_size: self.paper_size,
            status: self.status,
            cost: CostBreakdown::default(),
            was_color_converted: false,
            was_duplex_enforced: false,
            converted_color_pages: 0,
            applied_policies: Vec::new(),
            stage: JobStage::Raw,
        })
    }

    /// Validate using the current time as the default timestamp
    pub fn validate(self) -> Result<PrintJobRecord, JobError> {
        self.validate_at(Utc::now())
    }
}

fn require_id(id: Option<u64>, field: &'static str) -> Result<u64, JobError> {
    match id {
        Some(id) if id != 0 => Ok(id),
        _ => Err(JobError::MissingIdentifier { field }),
    }
}

fn to_pages(value: i64) -> Result<u32, JobError> {
    u32::try_from(value).map_err(|_| JobError::PageCountOverflow(value))
}

impl TryFrom<PrintJobSubmission> for PrintJobRecord {
    type Error = JobError;

    fn try_from(submission: PrintJobSubmission) -> Result<Self, Self::Error> {
        submission.validate()
    }
}

/// One print event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJobRecord {
    /// Store-assigned id, absent until inserted
    pub id: Option<u64>,
    pub job_id: String,
    pub printer_id: PrinterId,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub timestamp: DateTime<Utc>,
    pub document_name: Option<String>,
    pub file_size_kb: Option<u64>,
    /// Total pages, always >= 1
    pub page_count: u32,
    pub color_page_count: u32,
    pub bw_page_count: u32,
    pub is_duplex: bool,
    pub copies: u32,
    pub paper_size: String,
    pub status: JobStatus,
    pub cost: CostBreakdown,
    pub was_color_converted: bool,
    pub was_duplex_enforced: bool,
    /// Pages reclassified by color-to-bw conversion
    pub converted_color_pages: u32,
    /// Every policy that fired, in evaluation order
    pub applied_policies: Vec<AppliedPolicy>,
    pub stage: JobStage,
}

impl PrintJobRecord {
    /// Last policy that fired, matching the single-field ledger view
    pub fn primary_policy(&self) -> Option<AppliedPolicy> {
        self.applied_policies.last().copied()
    }

    /// Whether the given policy fired
    pub fn has_policy(&self, policy: AppliedPolicy) -> bool {
        self.applied_policies.contains(&policy)
    }

    /// Tag the record with a policy, once
    pub fn record_policy(&mut self, policy: AppliedPolicy) {
        if !self.has_policy(policy) {
            self.applied_policies.push(policy);
        }
    }

    /// Paper sizes excluded from forced duplex (case-insensitive)
    pub fn is_duplex_exempt_paper(&self) -> bool {
        DUPLEX_EXEMPT_PAPER_SIZES
            .iter()
            .any(|size| size.eq_ignore_ascii_case(&self.paper_size))
    }

    /// Color pages as a fraction of the total
    pub fn color_ratio(&self) -> Decimal {
        if self.page_count == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.color_page_count) / Decimal::from(self.page_count)
    }

    /// Set costs and advance to `Costed`
    pub fn set_cost(&mut self, cost: CostBreakdown) {
        self.cost = cost;
        self.stage = JobStage::Costed;
    }
}
