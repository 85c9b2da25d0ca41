use appraisal::{
    aggregate, calendar_grid, fit_series, make_buckets, BucketScheme, CalendarUnit, CanonicalStatus,
    DateFieldKind, DateParser, DateValue, RawRow, Record, RecordSet, StatusClassifier, Taxonomy,
    TaxonomyLists, TrendResult, UnrecognizedPolicy,
};
use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use proptest::test_runner::Config;
use std::collections::HashSet;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
}

fn classifier() -> StatusClassifier {
    StatusClassifier::new(
        Taxonomy::from_lists(&TaxonomyLists::mls_v1()).unwrap(),
        UnrecognizedPolicy::Reject,
    )
}

fn raw_row() -> impl Strategy<Value = RawRow> {
    (
        0u32..40,
        proptest::option::of(0u64..4000),
        proptest::option::of(50_000u32..900_000),
        proptest::sample::select(vec!["CLSD", "SOLD", "ACTV", "PEND", "CTGO", "bad-date"]),
    )
        .prop_map(|(id, closed_offset, price, status)| {
            let closed = closed_offset.map(|d| {
                if status == "bad-date" {
                    "someday".to_string()
                } else {
                    (base_date() + Days::new(d)).format("%Y-%m-%d").to_string()
                }
            });
            RawRow {
                identifier: id.to_string(),
                contract_date: Some("2014-12-01".to_string()),
                closed_date: closed,
                sold_price: price.map(f64::from),
                market_time: price.map(|p| p % 200),
                raw_status: if status == "bad-date" { "S".to_string() } else { status.to_string() },
            }
        })
}

fn closed_record(offset: u64) -> Record {
    Record {
        identifier: offset.to_string(),
        contract_date: DateValue::Missing,
        closed_date: DateValue::Parsed(base_date() + Days::new(offset)),
        sold_price: Some(100_000.0 + offset as f64),
        market_time: Some((offset % 90) as u32),
        raw_status: "CLSD".to_string(),
        canonical_status: CanonicalStatus::Closed,
    }
}

proptest! {
    #![proptest_config(Config::with_cases(128))]

    #[test]
    fn trailing_years_are_contiguous_and_end_at_reference(
        offset in 0u64..5000,
        count in 1usize..12,
    ) {
        let reference = base_date() + Days::new(offset);
        let buckets = make_buckets(reference, BucketScheme::TrailingYears, count).unwrap();
        prop_assert_eq!(buckets.len(), count);
        prop_assert_eq!(buckets.last().unwrap().end, reference);
        for b in &buckets {
            prop_assert!(b.start <= b.end);
        }
        for pair in buckets.windows(2) {
            prop_assert_eq!(pair[0].end + Days::new(1), pair[1].start);
        }
    }

    #[test]
    fn rolling_windows_are_contiguous(
        offset in 0u64..5000,
        months in 1u32..13,
        count in 1usize..30,
    ) {
        let reference = base_date() + Days::new(offset);
        let buckets = make_buckets(reference, BucketScheme::Rolling { months }, count).unwrap();
        prop_assert_eq!(buckets.last().unwrap().end, reference);
        for pair in buckets.windows(2) {
            prop_assert!(pair[0].start <= pair[0].end);
            prop_assert_eq!(pair[0].end + Days::new(1), pair[1].start);
        }
        let mut labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        prop_assert_eq!(labels.len(), count);
    }

    #[test]
    fn aggregation_conserves_counts(offsets in proptest::collection::vec(0u64..3650, 0..200)) {
        let records = RecordSet::from_records(offsets.iter().map(|&o| closed_record(o)).collect());
        let start = base_date();
        let end = base_date() + Days::new(3649);
        for unit in [CalendarUnit::Month, CalendarUnit::Quarter, CalendarUnit::Year] {
            let buckets = calendar_grid(unit, start, end).unwrap();
            let stats = aggregate(&records, &buckets, DateFieldKind::ClosedDate);
            prop_assert_eq!(stats.len(), buckets.len());
            prop_assert_eq!(stats.iter().map(|s| s.count).sum::<usize>(), records.len());
            for s in &stats {
                prop_assert_eq!(s.count == 0, s.median_price.is_none());
                prop_assert_eq!(s.count == 0, s.median_days.is_none());
            }
        }
    }

    #[test]
    fn reload_is_idempotent(rows in proptest::collection::vec(raw_row(), 0..60)) {
        let c = classifier();
        let parser = DateParser::default();
        let mut doubled = rows.clone();
        doubled.extend(rows.iter().cloned());

        let once = RecordSet::load(rows, &c, &parser).unwrap().records;
        let twice = RecordSet::load(once.to_rows(), &c, &parser).unwrap().records;
        let from_doubled = RecordSet::load(doubled, &c, &parser).unwrap().records;

        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(&once, &from_doubled);

        let keys: HashSet<(String, DateValue)> = once
            .iter()
            .map(|r| (r.identifier.clone(), r.closed_date.clone()))
            .collect();
        prop_assert_eq!(keys.len(), once.len());
    }

    #[test]
    fn exact_lines_fit_exactly(slope in -1000i32..1000, intercept in -100_000i32..100_000, n in 2usize..30) {
        let values: Vec<Option<f64>> = (0..n)
            .map(|i| Some(slope as f64 * i as f64 + intercept as f64))
            .collect();
        match fit_series(&values) {
            TrendResult::Fit { slope: s, intercept: i } => {
                prop_assert!((s - slope as f64).abs() < 1e-6);
                prop_assert!((i - intercept as f64).abs() < 1e-4);
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}

#[test]
fn classifier_policy_is_consistent() {
    let reject = classifier();
    let fallback = StatusClassifier::new(
        Taxonomy::from_lists(&TaxonomyLists::mls_v1()).unwrap(),
        UnrecognizedPolicy::Fallback {
            status: CanonicalStatus::Active,
        },
    );
    for _ in 0..3 {
        assert!(reject.classify("EXPIRED").is_err());
        assert_eq!(fallback.classify("EXPIRED").unwrap(), CanonicalStatus::Active);
    }
}
