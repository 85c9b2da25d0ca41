//! Listing export ingestion: maps source columns onto [`RawRow`]s

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::ColumnMapping;
use crate::error::AppraisalError;
use crate::record::RawRow;

/// Per-file overview shown before analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub file_name: String,
    pub row_count: usize,
    /// Raw status token → rows, before classification
    pub status_counts: BTreeMap<String, usize>,
    /// Price / market-time cells that were present but not numeric
    pub rejected_numbers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub rows: Vec<RawRow>,
    pub summaries: Vec<SourceSummary>,
}

/// Read and concatenate several CSV exports
pub fn read_sources<P: AsRef<Path>>(paths: &[P], mapping: &ColumnMapping) -> Result<Ingested> {
    let mut ingested = Ingested::default();
    for path in paths {
        let (rows, summary) = read_listing_csv(path.as_ref(), mapping)?;
        ingested.rows.extend(rows);
        ingested.summaries.push(summary);
    }
    info!(
        "Ingested {} rows from {} sources",
        ingested.rows.len(),
        ingested.summaries.len()
    );
    Ok(ingested)
}

/// Every column is read as text: ids keep leading zeros and formatted
/// numbers like `$1,250,000` reach [`parse_price`] instead of failing the scan.
pub fn read_listing_csv(path: &Path, mapping: &ColumnMapping) -> Result<(Vec<RawRow>, SourceSummary)> {
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(0))
        .finish()
        .with_context(|| format!("Failed to read CSV {:?}", path))?
        .collect()
        .with_context(|| format!("Failed to collect CSV {:?}", path))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let (rows, rejected_numbers) =
        rows_from_frame(&df, mapping).with_context(|| format!("Schema mismatch in {}", file_name))?;

    let mut status_counts = BTreeMap::new();
    for row in &rows {
        *status_counts.entry(row.raw_status.clone()).or_insert(0) += 1;
    }

    info!("Read {} rows from {}", rows.len(), file_name);
    Ok((
        rows,
        SourceSummary {
            file_name,
            row_count: df.height(),
            status_counts,
            rejected_numbers,
        },
    ))
}

/// Convert a frame to rows. Every mapped column must be present; numeric
/// cells that fail to parse become `None` and are counted.
pub fn rows_from_frame(df: &DataFrame, mapping: &ColumnMapping) -> Result<(Vec<RawRow>, usize)> {
    let available = df.get_column_names();
    for name in [
        &mapping.identifier,
        &mapping.contract_date,
        &mapping.closed_date,
        &mapping.sold_price,
        &mapping.market_time,
        &mapping.status,
    ] {
        if !available.iter().any(|c| *c == name.as_str()) {
            return Err(AppraisalError::MissingColumn(name.clone()).into());
        }
    }

    let as_text = |name: &str| -> Result<Series> {
        df.column(name)?
            .cast(&DataType::String)
            .with_context(|| format!("Column '{}' cannot be read as text", name))
    };
    let identifier = as_text(&mapping.identifier)?;
    let contract_date = as_text(&mapping.contract_date)?;
    let closed_date = as_text(&mapping.closed_date)?;
    let sold_price = as_text(&mapping.sold_price)?;
    let market_time = as_text(&mapping.market_time)?;
    let status = as_text(&mapping.status)?;

    let identifier = identifier.str()?;
    let contract_date = contract_date.str()?;
    let closed_date = closed_date.str()?;
    let sold_price = sold_price.str()?;
    let market_time = market_time.str()?;
    let status = status.str()?;

    let mut rejected = 0;
    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let price_cell = sold_price.get(i);
        let price = parse_price(price_cell);
        if price.is_none() && is_present(price_cell) {
            rejected += 1;
        }

        let time_cell = market_time.get(i);
        let days = parse_days(time_cell);
        if days.is_none() && is_present(time_cell) {
            rejected += 1;
        }

        rows.push(RawRow {
            identifier: identifier.get(i).unwrap_or("").trim().to_string(),
            contract_date: contract_date.get(i).map(|s| s.to_string()),
            closed_date: closed_date.get(i).map(|s| s.to_string()),
            sold_price: price,
            market_time: days,
            raw_status: status.get(i).unwrap_or("").to_string(),
        });
    }

    if rejected > 0 {
        warn!("{} numeric cells could not be parsed", rejected);
    }
    Ok((rows, rejected))
}

fn is_present(cell: Option<&str>) -> bool {
    cell.is_some_and(|s| !s.trim().is_empty())
}

/// `"$1,250,000"` → 1250000.0; negative amounts are rejected
pub fn parse_price(cell: Option<&str>) -> Option<f64> {
    let cleaned: String = cell?
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Whole non-negative days; `"30.0"` is accepted
pub fn parse_days(cell: Option<&str>) -> Option<u32> {
    let value = cell?.trim().replace(',', "").parse::<f64>().ok()?;
    if value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Some(value as u32)
    } else {
        None
    }
}
