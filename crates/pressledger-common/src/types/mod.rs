//! Core data types for PressLedger

pub mod job_record;
pub mod pricing;
pub mod statistics;
