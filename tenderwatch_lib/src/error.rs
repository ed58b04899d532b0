//! Run-level error type for the ingestion pipeline.
//!
//! Chunk- and page-scoped failures are handled (logged and skipped) inside
//! the driver and never surface here; only pre-flight validation, storage
//! setup, and error-log I/O can abort a run.

use chrono::NaiveDate;

use crate::db::DbError;

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    /// Start date after end date. Fatal, checked before any request is made.
    #[error("start date {start} must not be after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    /// A caller-supplied parameter failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Storage failure outside the per-record constraint path.
    #[error("storage error: {0}")]
    Db(#[from] DbError),
    /// The per-run error logs could not be written.
    #[error("error log I/O failed: {0}")]
    Log(#[from] std::io::Error),
}
