//! Output writing for bucket statistics (CSV / Parquet) and reports (JSON)

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::aggregate::BucketStat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

/// Bucket stats as a frame, one row per bucket in order
pub fn stats_frame(stats: &[BucketStat]) -> Result<DataFrame> {
    let label_col: Vec<&str> = stats.iter().map(|s| s.bucket_label.as_str()).collect();
    let start_col: Vec<String> = stats.iter().map(|s| s.start.to_string()).collect();
    let end_col: Vec<String> = stats.iter().map(|s| s.end.to_string()).collect();
    let price_col: Vec<Option<f64>> = stats.iter().map(|s| s.median_price).collect();
    let days_col: Vec<Option<f64>> = stats.iter().map(|s| s.median_days).collect();
    let count_col: Vec<u64> = stats.iter().map(|s| s.count as u64).collect();

    let df = DataFrame::new(vec![
        Series::new("period", label_col),
        Series::new("start", start_col),
        Series::new("end", end_col),
        Series::new("median_price", price_col),
        Series::new("median_days", days_col),
        Series::new("count", count_col),
    ])?;
    Ok(df)
}

/// Write `stats` to `<dir>/<name>.<ext>`
pub fn write_stats(dir: &Path, name: &str, stats: &[BucketStat], format: TableFormat) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {:?}", dir))?;

    let path = dir.join(format!("{}.{}", name, format.extension()));
    let mut df = stats_frame(stats)?;
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    match format {
        TableFormat::Csv => CsvWriter::new(file)
            .finish(&mut df)
            .context("Failed to write CSV file")?,
        TableFormat::Parquet => {
            ParquetWriter::new(file)
                .finish(&mut df)
                .context("Failed to write Parquet file")?;
        }
    }

    tracing::info!("Wrote {} bucket stats to {:?}", stats.len(), path);
    Ok(path)
}

/// Pretty JSON to `<dir>/<name>.json`
pub fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {:?}", dir))?;
    let path = dir.join(format!("{}.json", name));
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    tracing::info!("Wrote report to {:?}", path);
    Ok(path)
}
