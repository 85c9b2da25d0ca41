//! Per-bucket median price / median days-on-market / count

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;
use crate::error::{AppraisalError, Result};
use crate::record::{DateFieldKind, RecordSet};
use crate::status::CanonicalStatus;

/// Statistics for one bucket. Medians are `None` when no matched record
/// carries a value, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStat {
    pub bucket_label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub median_price: Option<f64>,
    pub median_days: Option<f64>,
    /// Records whose date falls in the bucket
    pub count: usize,
    /// Of those, records with a sold price
    pub price_samples: usize,
    /// Of those, records with a market time
    pub days_samples: usize,
}

impl BucketStat {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Which statistic of a [`BucketStat`] to read as a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    MedianPrice,
    MedianDays,
    Count,
}

impl Metric {
    pub fn value(&self, stat: &BucketStat) -> Option<f64> {
        match self {
            Metric::MedianPrice => stat.median_price,
            Metric::MedianDays => stat.median_days,
            Metric::Count => Some(stat.count as f64),
        }
    }
}

/// Standard median; mean of the two middle values for even lengths
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    prices: Vec<f64>,
    days: Vec<f64>,
}

/// Aggregate `records` over `buckets` keyed on `field`, one stat per bucket in
/// input order.
///
/// Buckets must not overlap. Each record is placed with a binary search over
/// the buckets sorted by start date, so cost is O(records * log buckets).
pub fn aggregate(records: &RecordSet, buckets: &[Bucket], field: DateFieldKind) -> Vec<BucketStat> {
    let mut order: Vec<usize> = (0..buckets.len()).collect();
    order.sort_by_key(|&i| buckets[i].start);

    let mut acc: Vec<Accumulator> = buckets.iter().map(|_| Accumulator::default()).collect();

    for record in records.iter() {
        let Some(date) = record.date(field) else {
            continue;
        };
        // Last bucket starting on or before `date`
        let pos = order.partition_point(|&i| buckets[i].start <= date);
        if pos == 0 {
            continue;
        }
        let idx = order[pos - 1];
        if !buckets[idx].contains(date) {
            continue;
        }

        let slot = &mut acc[idx];
        slot.count += 1;
        if let Some(price) = record.sold_price {
            slot.prices.push(price);
        }
        if let Some(days) = record.market_time {
            slot.days.push(f64::from(days));
        }
    }

    buckets
        .iter()
        .zip(acc)
        .map(|(bucket, mut slot)| BucketStat {
            bucket_label: bucket.label.clone(),
            start: bucket.start,
            end: bucket.end,
            median_price: median(&mut slot.prices),
            median_days: median(&mut slot.days),
            count: slot.count,
            price_samples: slot.prices.len(),
            days_samples: slot.days.len(),
        })
        .collect()
}

/// Closed-sale statistics over a whole record set (one 12-month window, say)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub closed_count: usize,
    pub median_price: Option<f64>,
    pub median_days: Option<f64>,
}

pub fn window_stats(records: &RecordSet) -> WindowStats {
    let closed = records.filter_by_status(&[CanonicalStatus::Closed]);
    let mut prices: Vec<f64> = closed.iter().filter_map(|r| r.sold_price).collect();
    let mut days: Vec<f64> = closed
        .iter()
        .filter_map(|r| r.market_time.map(f64::from))
        .collect();
    WindowStats {
        closed_count: closed.len(),
        median_price: median(&mut prices),
        median_days: median(&mut days),
    }
}

/// Current inventory as of the effective date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    /// All Active records, no date filter
    pub active_count: usize,
    /// Contingent or Pending records with a contract date on or after
    /// `reference - 12 months`; no upper bound
    pub contingent_pending_count: usize,
}

pub fn listing_snapshot(records: &RecordSet, reference: NaiveDate) -> Result<ListingSnapshot> {
    let year_ago = reference
        .checked_sub_months(Months::new(12))
        .ok_or(AppraisalError::DateOutOfRange(reference))?;

    let active_count = records
        .iter()
        .filter(|r| r.canonical_status == CanonicalStatus::Active)
        .count();
    let contingent_pending_count = records
        .iter()
        .filter(|r| {
            matches!(
                r.canonical_status,
                CanonicalStatus::Contingent | CanonicalStatus::Pending
            )
        })
        .filter(|r| {
            r.date(DateFieldKind::ContractDate)
                .is_some_and(|d| d >= year_ago)
        })
        .count();

    Ok(ListingSnapshot {
        active_count,
        contingent_pending_count,
    })
}

/// One closed sale as a plottable point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePoint {
    pub identifier: String,
    pub closed_date: NaiveDate,
    pub sold_price: Option<f64>,
    pub market_time: Option<u32>,
}

/// Closed records with a closed date in `[start, end]`, sorted by date
pub fn sale_points(records: &RecordSet, start: NaiveDate, end: NaiveDate) -> Result<Vec<SalePoint>> {
    let in_range = records
        .filter_by_status(&[CanonicalStatus::Closed])
        .filter_by_date_range(DateFieldKind::ClosedDate, start, end)?;
    let mut points: Vec<SalePoint> = in_range
        .iter()
        .filter_map(|r| {
            r.closed_date.date().map(|closed_date| SalePoint {
                identifier: r.identifier.clone(),
                closed_date,
                sold_price: r.sold_price,
                market_time: r.market_time,
            })
        })
        .collect();
    points.sort_by_key(|p| p.closed_date);
    Ok(points)
}
