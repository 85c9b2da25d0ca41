//! Report assembly: buckets → stats → trends → summaries

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::aggregate::{aggregate, listing_snapshot, window_stats, BucketStat, Metric};
use crate::bucket::{calendar_grid, make_buckets, select_range, Bucket, BucketScheme, CalendarUnit};
use crate::error::Result;
use crate::narrate::{
    narrate_bucket, narrate_listings, narrate_window, BucketSummary, ListingSummary, WindowSummary,
};
use crate::record::{DateFieldKind, MissingValueReport, RecordSet};
use crate::status::CanonicalStatus;
use crate::trend::{fit_metric, TrendResult};

/// Bucket stats in chronological order with trends over them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub effective_date: NaiveDate,
    pub stats: Vec<BucketStat>,
    pub summaries: Vec<BucketSummary>,
    pub price_trend: TrendResult,
    pub days_trend: TrendResult,
}

impl PeriodReport {
    /// Aggregate closed-date statistics over `buckets`
    pub fn build(records: &RecordSet, buckets: &[Bucket], effective_date: NaiveDate) -> Self {
        let stats = aggregate(records, buckets, DateFieldKind::ClosedDate);
        let summaries = stats.iter().map(narrate_bucket).collect();
        let price_trend = fit_metric(&stats, Metric::MedianPrice);
        let days_trend = fit_metric(&stats, Metric::MedianDays);
        Self {
            effective_date,
            stats,
            summaries,
            price_trend,
            days_trend,
        }
    }
}

/// Optional label bounds for a displayed sub-range
#[derive(Debug, Clone, Default)]
pub struct LabelRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn restrict<'a>(buckets: &'a [Bucket], range: &LabelRange) -> Result<&'a [Bucket]> {
    let first = buckets.first().map(|b| b.label.as_str());
    let last = buckets.last().map(|b| b.label.as_str());
    match (range.from.as_deref().or(first), range.to.as_deref().or(last)) {
        (Some(from), Some(to)) => select_range(buckets, from, to),
        _ => Ok(buckets),
    }
}

/// Trailing 12-month windows; Closed records only
pub fn yearly(
    records: &RecordSet,
    effective_date: NaiveDate,
    years: usize,
    range: &LabelRange,
) -> Result<PeriodReport> {
    let closed = records.filter_by_status(&[CanonicalStatus::Closed]);
    let buckets = make_buckets(effective_date, BucketScheme::TrailingYears, years)?;
    let selected = restrict(&buckets, range)?;
    info!("Yearly report over {} windows", selected.len());
    Ok(PeriodReport::build(&closed, selected, effective_date))
}

/// Rolling 3-month windows. Without explicit labels the most recent
/// `window` quarters are shown.
pub fn quarterly(
    records: &RecordSet,
    effective_date: NaiveDate,
    quarters: usize,
    window: usize,
    range: &LabelRange,
) -> Result<PeriodReport> {
    let buckets = make_buckets(effective_date, BucketScheme::Rolling { months: 3 }, quarters)?;
    let range = if range.from.is_none() && range.to.is_none() && window > 0 {
        let start = buckets.len().saturating_sub(window);
        LabelRange {
            from: buckets.get(start).map(|b| b.label.clone()),
            to: buckets.last().map(|b| b.label.clone()),
        }
    } else {
        range.clone()
    };
    let selected = restrict(&buckets, &range)?;
    info!("Quarterly report over {} windows", selected.len());
    Ok(PeriodReport::build(records, selected, effective_date))
}

/// Calendar grid between two dates
pub fn calendar(
    records: &RecordSet,
    effective_date: NaiveDate,
    unit: CalendarUnit,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PeriodReport> {
    let buckets = calendar_grid(unit, start, end)?;
    info!("{:?} report over {} calendar units", unit, buckets.len());
    Ok(PeriodReport::build(records, &buckets, effective_date))
}

/// Last `months` calendar months ending with the effective date's month
pub fn monthly(records: &RecordSet, effective_date: NaiveDate, months: usize) -> Result<PeriodReport> {
    let buckets = make_buckets(
        effective_date,
        BucketScheme::Calendar {
            unit: CalendarUnit::Month,
        },
        months,
    )?;
    Ok(PeriodReport::build(records, &buckets, effective_date))
}

/// One trailing 12-month window with its narrative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub stat: BucketStat,
    pub summary: WindowSummary,
}

/// Overview for the effective date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub effective_date: NaiveDate,
    pub record_count: usize,
    pub status_counts: BTreeMap<CanonicalStatus, usize>,
    /// Most recent window first
    pub windows: Vec<WindowReport>,
    pub listings: ListingSummary,
    pub missing_values: MissingValueReport,
}

/// Status counts cover every loaded record; windows, listings and missing
/// values cover only `statuses` (all records when empty).
pub fn statistics(
    loaded: &RecordSet,
    statuses: &[CanonicalStatus],
    effective_date: NaiveDate,
    years: usize,
) -> Result<StatisticsReport> {
    let filtered;
    let records = if statuses.is_empty() {
        loaded
    } else {
        filtered = loaded.filter_by_status(statuses);
        &filtered
    };

    let mut buckets = make_buckets(effective_date, BucketScheme::TrailingYears, years)?;
    buckets.reverse();

    let stats = aggregate(records, &buckets, DateFieldKind::ClosedDate);
    let mut windows = Vec::with_capacity(buckets.len());
    for (bucket, stat) in buckets.iter().zip(stats) {
        let in_window =
            records.filter_by_date_range(DateFieldKind::ClosedDate, bucket.start, bucket.end)?;
        windows.push(WindowReport {
            label: bucket.label.clone(),
            start: bucket.start,
            end: bucket.end,
            stat,
            summary: narrate_window(&window_stats(&in_window)),
        });
    }

    let listings = narrate_listings(&listing_snapshot(records, effective_date)?);

    Ok(StatisticsReport {
        effective_date,
        record_count: loaded.len(),
        status_counts: loaded.status_counts(),
        windows,
        listings,
        missing_values: records.missing_value_report(),
    })
}
