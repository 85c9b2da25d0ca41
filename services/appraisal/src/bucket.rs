//! Date buckets anchored to an effective date or a calendar grid

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{check_range, AppraisalError, Result};

/// A labeled closed interval `[start, end]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Position in the producing scheme; for reference-anchored schemes 0 is
    /// the window ending at the reference date
    pub ordinal: usize,
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Bucket {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} to {})", self.label, self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarUnit {
    Month,
    Quarter,
    Year,
}

impl CalendarUnit {
    fn months(&self) -> u32 {
        match self {
            CalendarUnit::Month => 1,
            CalendarUnit::Quarter => 3,
            CalendarUnit::Year => 12,
        }
    }

    /// First day of the unit containing `date`
    pub fn floor(&self, date: NaiveDate) -> NaiveDate {
        let month = match self {
            CalendarUnit::Month => date.month(),
            CalendarUnit::Quarter => (date.month0() / 3) * 3 + 1,
            CalendarUnit::Year => 1,
        };
        // Day 1 of an existing month always exists
        NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
    }

    fn label(&self, start: NaiveDate) -> String {
        match self {
            CalendarUnit::Month => start.format("%Y-%m").to_string(),
            CalendarUnit::Quarter => format!("{}Q{}", start.year(), start.month0() / 3 + 1),
            CalendarUnit::Year => start.year().to_string(),
        }
    }

    fn bucket_at(&self, start: NaiveDate, ordinal: usize) -> Result<Bucket> {
        let next = start
            .checked_add_months(Months::new(self.months()))
            .ok_or(AppraisalError::DateOutOfRange(start))?;
        let end = day_before(next)?;
        Ok(Bucket {
            ordinal,
            label: self.label(start),
            start,
            end,
        })
    }
}

impl std::str::FromStr for CalendarUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "month" | "monthly" => Ok(CalendarUnit::Month),
            "quarter" | "quarterly" => Ok(CalendarUnit::Quarter),
            "year" | "yearly" => Ok(CalendarUnit::Year),
            other => Err(format!("unknown calendar unit '{}'", other)),
        }
    }
}

/// How buckets are laid out relative to the reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketScheme {
    /// 12-month windows ending at the reference date, tiled backward
    TrailingYears,
    /// `months`-wide windows ending at the reference date, tiled backward
    Rolling { months: u32 },
    /// Calendar units, the last one containing the reference date
    Calendar { unit: CalendarUnit },
}

/// Build `count` buckets for `scheme`, returned in chronological order.
///
/// Reference-anchored windows are computed from month offsets of the
/// reference date itself (`ref - k*N months`), so end-of-month clamping never
/// accumulates drift, and adjacent windows never share a day.
pub fn make_buckets(reference: NaiveDate, scheme: BucketScheme, count: usize) -> Result<Vec<Bucket>> {
    let buckets = match scheme {
        BucketScheme::TrailingYears => trailing(reference, 12, count, |i| {
            format!("{}-{} Months", i * 12, (i + 1) * 12)
        })?,
        BucketScheme::Rolling { months } => {
            let prefix = match months {
                1 => "M",
                3 => "Q",
                6 => "H",
                12 => "Y",
                _ => "P",
            };
            trailing(reference, months, count, |i| format!("{}{}", prefix, i + 1))?
        }
        BucketScheme::Calendar { unit } => {
            let last = unit.floor(reference);
            let mut out = Vec::with_capacity(count);
            for i in 0..count {
                let offset = unit.months() * i as u32;
                let start = last
                    .checked_sub_months(Months::new(offset))
                    .ok_or(AppraisalError::DateOutOfRange(reference))?;
                out.push(unit.bucket_at(start, i)?);
            }
            out.reverse();
            out
        }
    };

    debug!(
        "Built {} buckets for {:?} anchored at {}",
        buckets.len(),
        scheme,
        reference
    );
    Ok(buckets)
}

fn trailing<F>(reference: NaiveDate, months: u32, count: usize, label: F) -> Result<Vec<Bucket>>
where
    F: Fn(usize) -> String,
{
    if months == 0 {
        return Err(AppraisalError::InvalidBucketWidth);
    }

    let boundary = |k: usize| -> Result<NaiveDate> {
        let offset = u32::try_from(k)
            .ok()
            .and_then(|k| k.checked_mul(months))
            .ok_or(AppraisalError::DateOutOfRange(reference))?;
        reference
            .checked_sub_months(Months::new(offset))
            .ok_or(AppraisalError::DateOutOfRange(reference))
    };

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let end = boundary(i)?;
        let start = boundary(i + 1)?
            .checked_add_days(Days::new(1))
            .ok_or(AppraisalError::DateOutOfRange(reference))?;
        out.push(Bucket {
            ordinal: i,
            label: label(i),
            start,
            end,
        });
    }
    out.reverse();
    Ok(out)
}

/// Every calendar unit touching `[start, end]`, chronological, with true
/// calendar boundaries even where the range starts or ends mid-unit.
pub fn calendar_grid(unit: CalendarUnit, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bucket>> {
    check_range(start, end)?;

    let mut out = Vec::new();
    let mut cursor = unit.floor(start);
    while cursor <= end {
        let bucket = unit.bucket_at(cursor, out.len())?;
        cursor = bucket
            .end
            .checked_add_days(Days::new(1))
            .ok_or(AppraisalError::DateOutOfRange(bucket.end))?;
        out.push(bucket);
    }
    Ok(out)
}

/// The contiguous run of buckets between two labels, inclusive, in the order
/// given. The labels may be passed in either order.
pub fn select_range<'a>(buckets: &'a [Bucket], from: &str, to: &str) -> Result<&'a [Bucket]> {
    let position = |label: &str| {
        buckets
            .iter()
            .position(|b| b.label == label)
            .ok_or_else(|| AppraisalError::UnknownBucketLabel(label.to_string()))
    };
    let a = position(from)?;
    let b = position(to)?;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Ok(&buckets[lo..=hi])
}

fn day_before(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_sub_days(Days::new(1))
        .ok_or(AppraisalError::DateOutOfRange(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_contiguous(buckets: &[Bucket]) {
        for pair in buckets.windows(2) {
            assert!(pair[0].start <= pair[0].end);
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start, "{} / {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_trailing_years() {
        let buckets = make_buckets(date(2025, 7, 7), BucketScheme::TrailingYears, 5).unwrap();
        assert_eq!(buckets.len(), 5);

        let latest = buckets.last().unwrap();
        assert_eq!(latest.ordinal, 0);
        assert_eq!(latest.label, "0-12 Months");
        assert_eq!(latest.start, date(2024, 7, 8));
        assert_eq!(latest.end, date(2025, 7, 7));

        let oldest = &buckets[0];
        assert_eq!(oldest.ordinal, 4);
        assert_eq!(oldest.label, "48-60 Months");
        assert_eq!(oldest.start, date(2020, 7, 8));
        assert_eq!(oldest.end, date(2021, 7, 7));

        assert_contiguous(&buckets);
    }

    #[test]
    fn test_trailing_years_leap_day() {
        let buckets = make_buckets(date(2024, 2, 29), BucketScheme::TrailingYears, 3).unwrap();
        assert_contiguous(&buckets);
        assert_eq!(buckets[2].start, date(2023, 3, 1));
        assert_eq!(buckets[1].end, date(2023, 2, 28));
        assert_eq!(buckets[0].end, date(2022, 2, 28));
    }

    #[test]
    fn test_rolling_quarters() {
        let buckets =
            make_buckets(date(2025, 7, 7), BucketScheme::Rolling { months: 3 }, 20).unwrap();
        assert_eq!(buckets.len(), 20);
        assert_eq!(buckets[0].label, "Q20");
        assert_eq!(buckets[19].label, "Q1");
        assert_eq!(buckets[19].start, date(2025, 4, 8));
        assert_eq!(buckets[19].end, date(2025, 7, 7));
        assert_eq!(buckets[18].end, date(2025, 4, 7));
        assert_contiguous(&buckets);
    }

    #[test]
    fn test_rolling_month_end_has_no_drift() {
        let buckets =
            make_buckets(date(2025, 5, 31), BucketScheme::Rolling { months: 3 }, 4).unwrap();
        assert_contiguous(&buckets);
        let ends: Vec<NaiveDate> = buckets.iter().rev().map(|b| b.end).collect();
        assert_eq!(
            ends,
            vec![date(2025, 5, 31), date(2025, 2, 28), date(2024, 11, 30), date(2024, 8, 31)]
        );
    }

    #[test]
    fn test_zero_width_rejected() {
        let err = make_buckets(date(2025, 1, 1), BucketScheme::Rolling { months: 0 }, 3).unwrap_err();
        assert_eq!(err, AppraisalError::InvalidBucketWidth);
    }

    #[test]
    fn test_zero_count_is_empty() {
        let buckets = make_buckets(date(2025, 1, 1), BucketScheme::TrailingYears, 0).unwrap();
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_calendar_scheme_keeps_true_boundaries() {
        let buckets = make_buckets(
            date(2025, 8, 15),
            BucketScheme::Calendar { unit: CalendarUnit::Quarter },
            3,
        )
        .unwrap();
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2025Q1", "2025Q2", "2025Q3"]);
        // Partial current quarter still spans the full calendar quarter
        assert_eq!(buckets[2].start, date(2025, 7, 1));
        assert_eq!(buckets[2].end, date(2025, 9, 30));
        assert_contiguous(&buckets);
    }

    #[test]
    fn test_calendar_grid_months() {
        let buckets = calendar_grid(CalendarUnit::Month, date(2024, 11, 20), date(2025, 2, 3)).unwrap();
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
        assert_eq!(buckets[0].start, date(2024, 11, 1));
        assert_eq!(buckets[3].end, date(2025, 2, 28));
        assert_eq!(buckets[3].ordinal, 3);
        assert_contiguous(&buckets);
    }

    #[test]
    fn test_calendar_grid_years() {
        let buckets = calendar_grid(CalendarUnit::Year, date(2020, 1, 1), date(2025, 12, 31)).unwrap();
        assert_eq!(buckets.len(), 6);
        assert_eq!(buckets[0].label, "2020");
        assert_eq!(buckets[5].end, date(2025, 12, 31));
    }

    #[test]
    fn test_calendar_grid_rejects_inverted_range() {
        let err = calendar_grid(CalendarUnit::Month, date(2025, 2, 1), date(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, AppraisalError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_select_range() {
        let buckets =
            make_buckets(date(2025, 7, 7), BucketScheme::Rolling { months: 3 }, 20).unwrap();
        let selected = select_range(&buckets, "Q8", "Q1").unwrap();
        assert_eq!(selected.len(), 8);
        assert_eq!(selected[0].label, "Q8");
        assert_eq!(selected[7].label, "Q1");

        let same = select_range(&buckets, "Q1", "Q8").unwrap();
        assert_eq!(same, selected);

        assert_eq!(
            select_range(&buckets, "Q21", "Q1").unwrap_err(),
            AppraisalError::UnknownBucketLabel("Q21".to_string())
        );
    }

    #[test]
    fn test_calendar_unit_from_str() {
        assert_eq!("Quarter".parse::<CalendarUnit>().unwrap(), CalendarUnit::Quarter);
        assert!("week".parse::<CalendarUnit>().is_err());
    }
}
