//! Plain-value summaries for presentation layers

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::{BucketStat, ListingSnapshot, WindowStats};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub count: usize,
    pub median_price: Option<f64>,
    pub median_days: Option<f64>,
    pub median_price_text: String,
    pub median_days_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub closed_count: usize,
    pub median_price: Option<f64>,
    pub median_days: Option<f64>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub active_count: usize,
    pub contingent_pending_count: usize,
    pub text: String,
}

pub fn narrate_bucket(stat: &BucketStat) -> BucketSummary {
    BucketSummary {
        label: stat.bucket_label.clone(),
        start: stat.start,
        end: stat.end,
        count: stat.count,
        median_price: stat.median_price,
        median_days: stat.median_days,
        median_price_text: price_text(stat.median_price),
        median_days_text: days_text(stat.median_days),
    }
}

pub fn narrate_window(stats: &WindowStats) -> WindowSummary {
    let text = format!(
        "{} closed sales with a median market time of {} and median sales price of {}.",
        stats.closed_count,
        days_text(stats.median_days),
        price_text(stats.median_price),
    );
    WindowSummary {
        closed_count: stats.closed_count,
        median_price: stats.median_price,
        median_days: stats.median_days,
        text,
    }
}

pub fn narrate_listings(snapshot: &ListingSnapshot) -> ListingSummary {
    ListingSummary {
        active_count: snapshot.active_count,
        contingent_pending_count: snapshot.contingent_pending_count,
        text: format!(
            "There are currently {} active listings and {} contingent/pending listings.",
            snapshot.active_count, snapshot.contingent_pending_count
        ),
    }
}

fn price_text(value: Option<f64>) -> String {
    value.map(format_currency).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn days_text(value: Option<f64>) -> String {
    match value {
        Some(days) if days.fract() == 0.0 => format!("{:.0} days", days),
        Some(days) => format!("{:.1} days", days),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Whole dollars with thousands separators, e.g. `$1,250,000`
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}", sign, grouped)
}
