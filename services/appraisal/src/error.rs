use chrono::NaiveDate;
use thiserror::Error;

use crate::record::DateFieldKind;
use crate::status::CanonicalStatus;

/// Errors raised by the core pipeline.
///
/// Per-row date problems are collected as [`crate::record::ParseIssue`]s during
/// a load rather than aborting it; everything else fails the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppraisalError {
    #[error("unrecognized status: '{0}'")]
    UnrecognizedStatus(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("unparseable {field} value '{value}'")]
    UnparseableDate { field: DateFieldKind, value: String },

    #[error("status token '{token}' is listed under both {first} and {second}")]
    ConflictingTaxonomy {
        token: String,
        first: CanonicalStatus,
        second: CanonicalStatus,
    },

    #[error("bucket width must be at least one month")]
    InvalidBucketWidth,

    #[error("date arithmetic out of range from {0}")]
    DateOutOfRange(NaiveDate),

    #[error("unknown bucket label '{0}'")]
    UnknownBucketLabel(String),

    #[error("column '{0}' not found in source")]
    MissingColumn(String),
}

pub type Result<T> = std::result::Result<T, AppraisalError>;

/// Validate that `start <= end`.
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(AppraisalError::InvalidDateRange { start, end });
    }
    Ok(())
}
