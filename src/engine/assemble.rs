//! Summary Assembler.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{Summary, iso_date};
use crate::engine::classify::{PartitionKey, PartitionOutcome};
use crate::engine::grouping::FixtureColumn;
use crate::engine::normalize::TestRecord;

/// Every distinct calendar date among `records`, ascending and duplicate-free.
///
/// The axis is independent of fixture grouping: a row with a valid timestamp
/// contributes its date even when it lands in no partition.
pub fn collect_dates(records: &[TestRecord]) -> Vec<NaiveDate> {
    records
        .iter()
        .filter_map(|r| r.timestamp.date())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fold partition counts into `fixture -> ISO date -> counts`.
pub fn assemble_summary(
    column: &FixtureColumn,
    partitions: &BTreeMap<PartitionKey, PartitionOutcome>,
    records: &[TestRecord],
) -> Summary {
    let mut fixtures: BTreeMap<String, BTreeMap<String, _>> = BTreeMap::new();
    for (key, outcome) in partitions {
        fixtures
            .entry(key.fixture.clone())
            .or_default()
            .insert(iso_date(key.date), outcome.counts);
    }

    Summary {
        fixture_column: column.name.clone(),
        synthetic_fixture: column.synthetic,
        fixtures,
        dates: collect_dates(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClassificationResult, PassFlag, Timestamp};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn record(d: u32, fixture: &str) -> TestRecord {
        TestRecord {
            row: 0,
            serial: "S".to_string(),
            timestamp: Timestamp::Valid(day(d).and_hms_opt(8, 0, 0).unwrap()),
            flag: PassFlag::Pass,
            fixture: fixture.to_string(),
        }
    }

    fn column() -> FixtureColumn {
        FixtureColumn {
            name: "FwPC".to_string(),
            index: 2,
            synthetic: false,
        }
    }

    #[test]
    fn dates_are_sorted_and_unique() {
        let mut invalid = record(1, "F1");
        invalid.timestamp = Timestamp::Invalid;
        let records = vec![record(3, "F1"), record(1, "F2"), record(3, "F2"), invalid];
        assert_eq!(collect_dates(&records), vec![day(1), day(3)]);
    }

    #[test]
    fn date_axis_includes_rows_without_a_fixture() {
        let records = vec![record(1, "F1"), record(2, "")];
        let summary = assemble_summary(&column(), &BTreeMap::new(), &records);
        assert_eq!(summary.dates, vec![day(1), day(2)]);
    }

    #[test]
    fn nests_partitions_by_fixture_then_iso_date() {
        let counts = ClassificationResult {
            total_test: 2,
            pass: 1,
            false_defect: 0,
            true_defect: 1,
            fail: 1,
        };
        let mut partitions = BTreeMap::new();
        partitions.insert(
            PartitionKey {
                fixture: "F1".to_string(),
                date: day(5),
            },
            PartitionOutcome {
                counts,
                ..PartitionOutcome::default()
            },
        );
        let summary = assemble_summary(&column(), &partitions, &[record(5, "F1")]);
        assert_eq!(summary.fixture_column, "FwPC");
        assert_eq!(summary.fixtures["F1"]["2024-02-05"], counts);
        assert_eq!(summary.result("F1", day(5)), Some(&counts));
        assert_eq!(summary.result("F1", day(6)), None);
    }

    #[test]
    fn empty_input_gives_empty_summary() {
        let summary = assemble_summary(&column(), &BTreeMap::new(), &[]);
        assert!(summary.is_empty());
        assert!(summary.dates.is_empty());
    }
}
