//! Appraisal statistics: listing status normalization and time-bucketed
//! market summaries anchored to an effective date.

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod error;
pub mod ingest;
pub mod narrate;
pub mod output;
pub mod record;
pub mod report;
pub mod status;
pub mod trend;

pub use aggregate::{aggregate, BucketStat, ListingSnapshot, Metric, WindowStats};
pub use bucket::{calendar_grid, make_buckets, select_range, Bucket, BucketScheme, CalendarUnit};
pub use error::{AppraisalError, Result};
pub use record::{DateFieldKind, DateParser, DateValue, LoadReport, RawRow, Record, RecordSet};
pub use status::{CanonicalStatus, StatusClassifier, Taxonomy, TaxonomyLists, UnrecognizedPolicy};
pub use trend::{fit, fit_series, TrendResult};
