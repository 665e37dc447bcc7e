//! Error types for PressLedger
//!
//! Provides a unified error type and domain-specific error variants

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using PressLedgerError
pub type Result<T> = std::result::Result<T, PressLedgerError>;

/// Unified error type for PressLedger operations
#[derive(Debug, Error)]
pub enum PressLedgerError {
    // Job precondition violations
    #[error("Invalid print job: {0}")]
    Job(#[from] JobError),

    // Query range errors
    #[error("Invalid query range: {0}")]
    Range(#[from] RangeError),

    // Record store errors
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    // Cache backend errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Print job precondition violations, raised before any policy or cost work
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Missing required identifier: {field}")]
    MissingIdentifier { field: &'static str },

    #[error("Negative page count for {field}: {value}")]
    NegativePageCount { field: &'static str, value: i64 },

    #[error("Total page count must be at least 1, got {0}")]
    NonPositiveTotal(i64),

    #[error("Page split exceeds total: {color} color + {bw} bw > {total}")]
    PageSplitExceedsTotal { color: i64, bw: i64, total: i64 },

    #[error("Copies must be at least 1, got {0}")]
    InvalidCopies(i64),

    #[error("Page count out of range: {0}")]
    PageCountOverflow(i64),
}

/// Query window errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("End {end} is before start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Errors surfaced by a record store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store rejected record: {0}")]
    Rejected(String),
}

impl From<serde_json::Error> for PressLedgerError {
    fn from(err: serde_json::Error) -> Self {
        PressLedgerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for PressLedgerError {
    fn from(err: anyhow::Error) -> Self {
        PressLedgerError::Internal(err.to_string())
    }
}

impl PressLedgerError {
    /// True when the error came from the record store
    pub fn is_store_error(&self) -> bool {
        matches!(self, PressLedgerError::Store(_))
    }
}
