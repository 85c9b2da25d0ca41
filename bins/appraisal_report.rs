//! Appraisal report CLI
//!
//! Usage:
//!   appraisal_report summary   --input listings.csv --effective-date 2025-07-07
//!   appraisal_report yearly    --input a.csv --input b.csv --from "24-36 Months"
//!   appraisal_report quarterly --input listings.csv --from Q8 --to Q1 --out reports
//!   appraisal_report monthly   --input listings.csv --start 2024-07 --end 2025-07
//!   appraisal_report calendar  --input listings.csv --unit quarter --start 2023-01-01 --end 2025-06-30
//!   appraisal_report individual --input listings.csv --start 2024-01-01 --end 2025-07-07 --save

use anyhow::{Context, Result};
use chrono::{Months, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use appraisal::aggregate::sale_points;
use appraisal::config::Config;
use appraisal::ingest::read_sources;
use appraisal::output::{write_json, write_stats, TableFormat};
use appraisal::report::{self, LabelRange, PeriodReport};
use appraisal::{CalendarUnit, CanonicalStatus, RecordSet};

#[derive(Parser)]
#[command(name = "appraisal_report")]
#[command(about = "Time-bucketed listing statistics anchored to an effective date")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CommonArgs {
    #[arg(long, default_value = "config/appraisal.toml")]
    config: String,
    /// Listing export CSV; repeat for several sources
    #[arg(long, required = true)]
    input: Vec<PathBuf>,
    /// Effective date (YYYY-MM-DD); defaults to the configured date, then today
    #[arg(long)]
    effective_date: Option<NaiveDate>,
    /// Keep only these canonical statuses (Active, Contingent, Pending, Closed)
    #[arg(long)]
    status: Vec<String>,
    /// Write JSON and tables here instead of printing
    #[arg(long)]
    out: Option<PathBuf>,
    /// Write to the configured output_dir
    #[arg(long)]
    save: bool,
    /// Table format for bucket stats written with --out
    #[arg(long, default_value = "csv")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Status counts, trailing 12-month summaries, listings and missing values
    Summary {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Trailing 12-month windows with trend lines
    Yearly {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Rolling quarters from the effective date
    Quarterly {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Calendar months (YYYY-MM bounds)
    Monthly {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Calendar grid between two dates
    Calendar {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long, default_value = "year")]
        unit: CalendarUnit,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Closed sales in a date range as individual points
    Individual {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

struct Session {
    config: Config,
    /// Every loaded record, before the status filter
    loaded: RecordSet,
    statuses: Vec<CanonicalStatus>,
    records: RecordSet,
    effective_date: NaiveDate,
    out: Option<PathBuf>,
    format: TableFormat,
}

fn open_session(common: &CommonArgs) -> Result<Session> {
    let config = Config::load(&common.config)?;
    let classifier = config.classifier()?;
    let parser = config.date_parser();

    let ingested = read_sources(&common.input, &config.columns)?;
    for summary in &ingested.summaries {
        tracing::info!(
            "{}: {} rows, status values {:?}",
            summary.file_name,
            summary.row_count,
            summary.status_counts
        );
    }

    let loaded = RecordSet::load(ingested.rows, &classifier, &parser)
        .context("Failed to load listing records")?;
    for issue in &loaded.parse_issues {
        tracing::warn!("row {} ({}): {}", issue.row, issue.identifier, issue.error);
    }

    let statuses = common
        .status
        .iter()
        .map(|s| CanonicalStatus::parse(s).with_context(|| format!("Unknown status filter '{}'", s)))
        .collect::<Result<Vec<_>>>()?;
    let records = if statuses.is_empty() {
        loaded.records.clone()
    } else {
        loaded.records.filter_by_status(&statuses)
    };

    let effective_date = common
        .effective_date
        .or(config.report.effective_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    tracing::info!(
        "Effective date {}, {} records in scope",
        effective_date,
        records.len()
    );

    let format = match common.format.as_str() {
        "csv" => TableFormat::Csv,
        "parquet" => TableFormat::Parquet,
        other => anyhow::bail!("Unsupported table format '{}'", other),
    };

    let out = match (&common.out, common.save) {
        (Some(dir), _) => Some(dir.clone()),
        (None, true) => Some(PathBuf::from(&config.output_dir)),
        (None, false) => None,
    };

    Ok(Session {
        config,
        loaded: loaded.records,
        statuses,
        records,
        effective_date,
        out,
        format,
    })
}

fn emit<T: Serialize>(session: &Session, name: &str, value: &T) -> Result<()> {
    match &session.out {
        Some(dir) => {
            write_json(dir, name, value)?;
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn emit_period(session: &Session, name: &str, report: &PeriodReport) -> Result<()> {
    if let Some(dir) = &session.out {
        write_stats(dir, name, &report.stats, session.format)?;
    }
    emit(session, name, report)
}

fn parse_month(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .with_context(|| format!("Expected YYYY-MM, got '{}'", value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { common } => {
            let session = open_session(&common)?;
            let report = report::statistics(
                &session.loaded,
                &session.statuses,
                session.effective_date,
                session.config.report.trailing_years,
            )?;
            emit(&session, "summary", &report)?;
        }
        Commands::Yearly { common, from, to } => {
            let session = open_session(&common)?;
            let report = report::yearly(
                &session.records,
                session.effective_date,
                session.config.report.trailing_years,
                &LabelRange { from, to },
            )?;
            emit_period(&session, "yearly", &report)?;
        }
        Commands::Quarterly { common, from, to } => {
            let session = open_session(&common)?;
            let report = report::quarterly(
                &session.records,
                session.effective_date,
                session.config.report.rolling_quarters,
                session.config.report.quarter_window,
                &LabelRange { from, to },
            )?;
            emit_period(&session, "quarterly", &report)?;
        }
        Commands::Monthly { common, start, end } => {
            let session = open_session(&common)?;
            let report = match (start, end) {
                (None, None) => report::monthly(
                    &session.records,
                    session.effective_date,
                    session.config.report.monthly_window,
                )?,
                (start, end) => {
                    let end = match end {
                        Some(e) => parse_month(&e)?,
                        None => session.effective_date,
                    };
                    let start = match start {
                        Some(s) => parse_month(&s)?,
                        None => end
                            .checked_sub_months(Months::new(12))
                            .context("Start month out of range")?,
                    };
                    report::calendar(
                        &session.records,
                        session.effective_date,
                        CalendarUnit::Month,
                        start,
                        end,
                    )?
                }
            };
            emit_period(&session, "monthly", &report)?;
        }
        Commands::Calendar {
            common,
            unit,
            start,
            end,
        } => {
            let session = open_session(&common)?;
            let report =
                report::calendar(&session.records, session.effective_date, unit, start, end)?;
            emit_period(&session, "calendar", &report)?;
        }
        Commands::Individual { common, start, end } => {
            let session = open_session(&common)?;
            let end = end.unwrap_or(session.effective_date);
            let start = match start {
                Some(s) => s,
                None => end
                    .checked_sub_months(Months::new(60))
                    .context("Start date out of range")?,
            };
            let points = sale_points(&session.records, start, end)?;
            tracing::info!("{} closed sales between {} and {}", points.len(), start, end);
            emit(&session, "individual", &points)?;
        }
    }

    Ok(())
}
