//! Listing records and the immutable record set

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{info, warn};

use crate::error::{check_range, AppraisalError, Result};
use crate::status::{CanonicalStatus, StatusClassifier};

/// Which date column an operation reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFieldKind {
    ContractDate,
    ClosedDate,
}

impl fmt::Display for DateFieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFieldKind::ContractDate => f.write_str("contract_date"),
            DateFieldKind::ClosedDate => f.write_str("closed_date"),
        }
    }
}

/// A date cell after parsing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DateValue {
    Parsed(NaiveDate),
    Missing,
    /// Present in the source but not a date; keeps the raw text
    Unparsed(String),
}

impl DateValue {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateValue::Parsed(d) => Some(*d),
            _ => None,
        }
    }

    /// Text form that parses back to the same value
    fn to_raw(&self) -> Option<String> {
        match self {
            DateValue::Parsed(d) => Some(d.format("%Y-%m-%d").to_string()),
            DateValue::Missing => None,
            DateValue::Unparsed(raw) => Some(raw.clone()),
        }
    }
}

/// A row as handed over by ingestion, columns already mapped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub identifier: String,
    pub contract_date: Option<String>,
    pub closed_date: Option<String>,
    pub sold_price: Option<f64>,
    pub market_time: Option<u32>,
    pub raw_status: String,
}

impl RawRow {
    fn row_key(&self) -> RowKey {
        RowKey {
            identifier: self.identifier.clone(),
            contract_date: self.contract_date.clone(),
            closed_date: self.closed_date.clone(),
            sold_price: self.sold_price.map(f64::to_bits),
            market_time: self.market_time,
            raw_status: self.raw_status.clone(),
        }
    }
}

/// Hashable full-row identity
#[derive(Debug, PartialEq, Eq, Hash)]
struct RowKey {
    identifier: String,
    contract_date: Option<String>,
    closed_date: Option<String>,
    sold_price: Option<u64>,
    market_time: Option<u32>,
    raw_status: String,
}

/// Formats tried when none are configured, in order
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y/%m/%d",
];

/// Parses date cells against an ordered list of chrono formats
#[derive(Debug, Clone)]
pub struct DateParser {
    formats: Vec<String>,
}

impl DateParser {
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        for format in &self.formats {
            if format.contains("%H") {
                if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                    return Some(dt.date());
                }
            } else if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
                return Some(d);
            }
        }
        None
    }

    fn parse_cell(&self, cell: Option<&str>) -> DateValue {
        match cell.map(str::trim) {
            None | Some("") => DateValue::Missing,
            Some(raw) => match self.parse(raw) {
                Some(d) => DateValue::Parsed(d),
                None => DateValue::Unparsed(raw.to_string()),
            },
        }
    }
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect())
    }
}

/// One listing transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub identifier: String,
    pub contract_date: DateValue,
    pub closed_date: DateValue,
    pub sold_price: Option<f64>,
    pub market_time: Option<u32>,
    pub raw_status: String,
    pub canonical_status: CanonicalStatus,
}

impl Record {
    pub fn date(&self, field: DateFieldKind) -> Option<NaiveDate> {
        match field {
            DateFieldKind::ContractDate => self.contract_date.date(),
            DateFieldKind::ClosedDate => self.closed_date.date(),
        }
    }

    /// Whole calendar months from the closed date to `reference`
    pub fn months_since(&self, reference: NaiveDate) -> Option<i32> {
        self.closed_date
            .date()
            .map(|closed| month_index(reference) - month_index(closed))
    }

    pub fn to_raw_row(&self) -> RawRow {
        RawRow {
            identifier: self.identifier.clone(),
            contract_date: self.contract_date.to_raw(),
            closed_date: self.closed_date.to_raw(),
            sold_price: self.sold_price,
            market_time: self.market_time,
            raw_status: self.raw_status.clone(),
        }
    }
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// A date cell that could not be parsed, kept for the missing-value report
#[derive(Debug, Clone, PartialEq)]
pub struct ParseIssue {
    /// Position in the input rows
    pub row: usize,
    pub identifier: String,
    pub error: AppraisalError,
}

/// Outcome of [`RecordSet::load`]
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub records: RecordSet,
    /// Rows identical to an earlier row in every column
    pub exact_duplicates: usize,
    /// Rows dropped because an earlier row had the same identifier and closed date
    pub key_duplicates: usize,
    pub parse_issues: Vec<ParseIssue>,
}

impl LoadReport {
    pub fn duplicates_removed(&self) -> usize {
        self.exact_duplicates + self.key_duplicates
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingField {
    pub field: String,
    pub count: usize,
}

/// Columns with absent or unparsed values and the rows affected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingValueReport {
    pub fields: Vec<MissingField>,
    pub affected: Vec<String>,
}

impl MissingValueReport {
    pub fn is_clean(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Classified, deduplicated listing records. Never mutated after load;
/// filters return new sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    /// Parse, classify and deduplicate `rows`.
    ///
    /// Unparseable dates become `DateValue::Unparsed` and are listed in the
    /// report. An unclassifiable status aborts the load under a rejecting policy.
    pub fn load(
        rows: Vec<RawRow>,
        classifier: &StatusClassifier,
        parser: &DateParser,
    ) -> Result<LoadReport> {
        let total = rows.len();
        let mut seen_rows = HashSet::new();
        let mut seen_keys: HashSet<(String, DateValue)> = HashSet::new();
        let mut exact_duplicates = 0;
        let mut key_duplicates = 0;
        let mut parse_issues = Vec::new();
        let mut records = Vec::with_capacity(total);

        for (row_idx, row) in rows.into_iter().enumerate() {
            if !seen_rows.insert(row.row_key()) {
                exact_duplicates += 1;
                continue;
            }

            let canonical_status = classifier.classify(&row.raw_status)?;
            let contract_date = parser.parse_cell(row.contract_date.as_deref());
            let closed_date = parser.parse_cell(row.closed_date.as_deref());

            if !seen_keys.insert((row.identifier.clone(), closed_date.clone())) {
                key_duplicates += 1;
                continue;
            }

            for (field, value) in [
                (DateFieldKind::ContractDate, &contract_date),
                (DateFieldKind::ClosedDate, &closed_date),
            ] {
                if let DateValue::Unparsed(raw) = value {
                    parse_issues.push(ParseIssue {
                        row: row_idx,
                        identifier: row.identifier.clone(),
                        error: AppraisalError::UnparseableDate {
                            field,
                            value: raw.clone(),
                        },
                    });
                }
            }

            records.push(Record {
                identifier: row.identifier,
                contract_date,
                closed_date,
                sold_price: row.sold_price,
                market_time: row.market_time,
                raw_status: row.raw_status,
                canonical_status,
            });
        }

        info!(
            "Loaded {} of {} rows ({} exact duplicates, {} identifier/closed-date duplicates removed)",
            records.len(),
            total,
            exact_duplicates,
            key_duplicates
        );
        if !parse_issues.is_empty() {
            warn!("{} date cells could not be parsed", parse_issues.len());
        }

        Ok(LoadReport {
            records: RecordSet { records },
            exact_duplicates,
            key_duplicates,
            parse_issues,
        })
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows that reload to an equal set
    pub fn to_rows(&self) -> Vec<RawRow> {
        self.records.iter().map(Record::to_raw_row).collect()
    }

    pub fn filter_by_status(&self, statuses: &[CanonicalStatus]) -> RecordSet {
        self.filter(|r| statuses.contains(&r.canonical_status))
    }

    /// Records whose `field` lies in `[start, end]`. Absent or unparsed dates
    /// never match.
    pub fn filter_by_date_range(
        &self,
        field: DateFieldKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RecordSet> {
        check_range(start, end)?;
        Ok(self.filter(|r| r.date(field).is_some_and(|d| d >= start && d <= end)))
    }

    fn filter<F: Fn(&Record) -> bool>(&self, keep: F) -> RecordSet {
        RecordSet {
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Calendar-month distance from each record's closed date to `reference`.
    ///
    /// An identifier that closed more than once maps to its most recent sale.
    pub fn months_since(&self, reference: NaiveDate) -> BTreeMap<String, Option<i32>> {
        let mut out: BTreeMap<String, Option<i32>> = BTreeMap::new();
        for record in &self.records {
            let months = record.months_since(reference);
            out.entry(record.identifier.clone())
                .and_modify(|existing| {
                    *existing = match (*existing, months) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    }
                })
                .or_insert(months);
        }
        out
    }

    /// Record count per canonical status; every status is present
    pub fn status_counts(&self) -> BTreeMap<CanonicalStatus, usize> {
        let mut counts: BTreeMap<CanonicalStatus, usize> =
            CanonicalStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for record in &self.records {
            *counts.entry(record.canonical_status).or_default() += 1;
        }
        counts
    }

    pub fn missing_value_report(&self) -> MissingValueReport {
        let mut contract = 0;
        let mut closed = 0;
        let mut price = 0;
        let mut market_time = 0;
        let mut affected = Vec::new();

        for record in &self.records {
            let mut missing = false;
            if record.contract_date.date().is_none() {
                contract += 1;
                missing = true;
            }
            if record.closed_date.date().is_none() {
                closed += 1;
                missing = true;
            }
            if record.sold_price.is_none() {
                price += 1;
                missing = true;
            }
            if record.market_time.is_none() {
                market_time += 1;
                missing = true;
            }
            if missing {
                affected.push(record.identifier.clone());
            }
        }

        let fields = [
            ("contract_date", contract),
            ("closed_date", closed),
            ("sold_price", price),
            ("market_time", market_time),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(field, count)| MissingField {
            field: field.to_string(),
            count,
        })
        .collect();

        MissingValueReport { fields, affected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Taxonomy, TaxonomyLists, UnrecognizedPolicy};

    fn classifier() -> StatusClassifier {
        StatusClassifier::new(
            Taxonomy::from_lists(&TaxonomyLists::mls_v1()).unwrap(),
            UnrecognizedPolicy::Reject,
        )
    }

    fn row(id: &str, closed: Option<&str>, price: Option<f64>, status: &str) -> RawRow {
        RawRow {
            identifier: id.to_string(),
            contract_date: Some("2025-01-10".to_string()),
            closed_date: closed.map(|s| s.to_string()),
            sold_price: price,
            market_time: price.map(|_| 30),
            raw_status: status.to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn load(rows: Vec<RawRow>) -> LoadReport {
        RecordSet::load(rows, &classifier(), &DateParser::default()).unwrap()
    }

    #[test]
    fn test_default_parser_formats() {
        let parser = DateParser::default();
        assert_eq!(parser.parse("2025-07-07"), Some(date(2025, 7, 7)));
        assert_eq!(parser.parse("2025-07-07 10:30:00"), Some(date(2025, 7, 7)));
        assert_eq!(parser.parse("2025-07-07T10:30:00"), Some(date(2025, 7, 7)));
        assert_eq!(parser.parse("7/7/2025"), Some(date(2025, 7, 7)));
        assert_eq!(parser.parse("2025/07/07"), Some(date(2025, 7, 7)));
        assert_eq!(parser.parse("July 7"), None);
    }

    #[test]
    fn test_load_classifies_and_parses() {
        let report = load(vec![
            row("1", Some("2025-03-01"), Some(250000.0), "CLSD"),
            row("2", None, None, "ACTV"),
        ]);
        let records = report.records.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].canonical_status, CanonicalStatus::Closed);
        assert_eq!(records[0].closed_date, DateValue::Parsed(date(2025, 3, 1)));
        assert_eq!(records[1].closed_date, DateValue::Missing);
        assert!(report.parse_issues.is_empty());
    }

    #[test]
    fn test_load_removes_exact_duplicates() {
        let r = row("1", Some("2025-03-01"), Some(250000.0), "CLSD");
        let report = load(vec![r.clone(), r.clone(), r]);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.exact_duplicates, 2);
        assert_eq!(report.duplicates_removed(), 2);
    }

    #[test]
    fn test_load_removes_identifier_closed_date_duplicates() {
        // Same listing closing on the same date reported by two sources
        let a = row("1", Some("2025-03-01"), Some(250000.0), "CLSD");
        let b = row("1", Some("03/01/2025"), Some(251000.0), "SOLD");
        let c = row("1", Some("2024-03-01"), Some(200000.0), "SOLD");
        let report = load(vec![a, b, c]);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.key_duplicates, 1);
        assert_eq!(report.records.records()[0].sold_price, Some(250000.0));
    }

    #[test]
    fn test_unparseable_date_is_recorded() {
        let report = load(vec![row("7", Some("not a date"), Some(1.0), "S")]);
        assert_eq!(report.records.len(), 1);
        assert_eq!(
            report.records.records()[0].closed_date,
            DateValue::Unparsed("not a date".to_string())
        );
        assert_eq!(report.parse_issues.len(), 1);
        assert_eq!(report.parse_issues[0].row, 0);
        assert_eq!(report.parse_issues[0].identifier, "7");
        assert!(matches!(
            report.parse_issues[0].error,
            AppraisalError::UnparseableDate { field: DateFieldKind::ClosedDate, .. }
        ));
    }

    #[test]
    fn test_unrecognized_status_aborts_load() {
        let result = RecordSet::load(
            vec![row("1", None, None, "WITHDRAWN")],
            &classifier(),
            &DateParser::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            AppraisalError::UnrecognizedStatus("WITHDRAWN".to_string())
        );
    }

    #[test]
    fn test_reload_is_identity() {
        let rows = vec![
            row("1", Some("2025-03-01"), Some(250000.0), "CLSD"),
            row("1", Some("2025-03-01"), Some(250000.0), "CLSD"),
            row("2", Some("garbage"), None, "pend"),
            row("3", Some("7/4/2024"), Some(99000.0), "SOLD"),
        ];
        let once = load(rows).records;
        let twice = load(once.to_rows()).records;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_by_status() {
        let set = load(vec![
            row("1", Some("2025-03-01"), Some(1.0), "CLSD"),
            row("2", None, None, "ACTV"),
            row("3", None, None, "PEND"),
        ])
        .records;
        let filtered = set.filter_by_status(&[CanonicalStatus::Closed, CanonicalStatus::Pending]);
        let ids: Vec<&str> = filtered.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_filter_by_date_range_inclusive() {
        let set = load(vec![
            row("1", Some("2025-01-01"), Some(1.0), "CLSD"),
            row("2", Some("2025-01-31"), Some(1.0), "CLSD"),
            row("3", Some("2025-02-01"), Some(1.0), "CLSD"),
            row("4", None, None, "ACTV"),
        ])
        .records;
        let jan = set
            .filter_by_date_range(DateFieldKind::ClosedDate, date(2025, 1, 1), date(2025, 1, 31))
            .unwrap();
        assert_eq!(jan.len(), 2);

        let err = set
            .filter_by_date_range(DateFieldKind::ClosedDate, date(2025, 2, 1), date(2025, 1, 1))
            .unwrap_err();
        assert!(matches!(err, AppraisalError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_months_since_is_calendar_based() {
        let set = load(vec![
            row("1", Some("2025-01-31"), Some(1.0), "CLSD"),
            row("2", Some("2024-02-15"), Some(1.0), "CLSD"),
            row("3", None, None, "ACTV"),
        ])
        .records;
        let months = set.months_since(date(2025, 2, 1));
        assert_eq!(months["1"], Some(1));
        assert_eq!(months["2"], Some(12));
        assert_eq!(months["3"], None);
    }

    #[test]
    fn test_months_since_repeated_identifier_uses_latest_sale() {
        let set = load(vec![
            row("1", Some("2023-06-01"), Some(1.0), "CLSD"),
            row("1", Some("2025-06-01"), Some(1.0), "CLSD"),
        ])
        .records;
        assert_eq!(set.months_since(date(2025, 7, 7))["1"], Some(1));
    }

    #[test]
    fn test_status_counts_include_zero() {
        let set = load(vec![row("1", None, None, "ACTV"), row("2", None, None, "A")]).records;
        let counts = set.status_counts();
        assert_eq!(counts[&CanonicalStatus::Active], 2);
        assert_eq!(counts[&CanonicalStatus::Closed], 0);
        assert_eq!(counts.len(), 4);
    }

    #[test]
    fn test_missing_value_report() {
        let set = load(vec![
            row("1", Some("2025-01-01"), Some(1.0), "CLSD"),
            row("2", None, None, "ACTV"),
        ])
        .records;
        let report = set.missing_value_report();
        assert_eq!(report.affected, vec!["2".to_string()]);
        assert!(report
            .fields
            .contains(&MissingField { field: "closed_date".to_string(), count: 1 }));
        assert!(!report.is_clean());
    }
}
