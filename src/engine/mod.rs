//! Test-result classification and aggregation engine.
//!
//! Data flow:
//! raw table -> `normalize` -> filter -> `grouping` -> `classify` -> `assemble`
//!
//! Everything here is a pure, synchronous transformation over an owned snapshot
//! of the input. The returned [`Analysis`] is a single immutable value holding
//! the summary, the partition membership sets and the working rows needed for
//! drill-downs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::{ClassifyPolicy, FilterParams, OutcomeBucket, PassFlag, RawTable, StageConfig, Summary};
use crate::error::AppError;

pub mod assemble;
pub mod classify;
pub mod grouping;
pub mod normalize;

pub use assemble::{assemble_summary, collect_dates};
pub use classify::{PartitionKey, PartitionOutcome, classify_partition, classify_records, partition_records};
pub use grouping::{FixtureColumn, SYNTHETIC_FIXTURE_COLUMN, SYNTHETIC_FIXTURE_LABEL, resolve_fixture_column};
pub use normalize::{NormalizeStats, NormalizedTable, TestRecord, clean_cell, normalize_table, parse_timestamp};

/// Result of one classification run for one stage.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub stage_config: StageConfig,
    pub policy: ClassifyPolicy,
    pub filter: FilterParams,
    /// Working copy (cleaned cells, synthetic column if any, filtered records).
    pub table: NormalizedTable,
    pub fixture_column: FixtureColumn,
    pub partitions: BTreeMap<PartitionKey, PartitionOutcome>,
    pub summary: Summary,
}

impl Analysis {
    pub fn stats(&self) -> &NormalizeStats {
        &self.table.stats
    }

    pub fn partition(&self, fixture: &str, date: NaiveDate) -> Option<&PartitionOutcome> {
        self.partitions.get(&PartitionKey {
            fixture: fixture.to_string(),
            date,
        })
    }

    /// Records that take part in classification for `fixture`, optionally
    /// restricted to one day.
    fn scoped_records<'a>(&'a self, fixture: &str, date: Option<NaiveDate>) -> impl Iterator<Item = &'a TestRecord> {
        self.table.records.iter().filter(move |r| {
            let Some(d) = r.timestamp.date() else {
                return false;
            };
            r.fixture == fixture && !r.serial.is_empty() && date.is_none_or(|want| want == d)
        })
    }

    /// Classify every row of one fixture across the whole filtered range.
    ///
    /// Unlike the per-day partitions, a unit that failed on Monday and passed on
    /// Tuesday counts as a false defect here.
    pub fn fixture_outcomes(&self, fixture: &str) -> PartitionOutcome {
        let records: Vec<&TestRecord> = self.scoped_records(fixture, None).collect();
        classify_partition(&records, &self.policy)
    }

    /// Rows behind one drill-down bucket.
    ///
    /// With `date` set the bucket is taken from that day's partition, otherwise
    /// from [`Analysis::fixture_outcomes`]. `Pass` yields the passing attempts,
    /// the defect buckets yield the failing attempts and `NeverPassed` yields
    /// every attempt of the serials concerned.
    pub fn bucket_rows(&self, fixture: &str, bucket: OutcomeBucket, date: Option<NaiveDate>) -> Vec<&TestRecord> {
        let outcome = match date {
            Some(d) => match self.partition(fixture, d) {
                Some(p) => p.clone(),
                None => return Vec::new(),
            },
            None => self.fixture_outcomes(fixture),
        };
        let serials = outcome.members.bucket(bucket);

        self.scoped_records(fixture, date)
            .filter(|r| serials.contains(&r.serial))
            .filter(|r| match bucket {
                OutcomeBucket::Pass => r.flag == PassFlag::Pass,
                OutcomeBucket::FalseDefect | OutcomeBucket::TrueDefect => r.flag == PassFlag::Fail,
                OutcomeBucket::NeverPassed => true,
            })
            .collect()
    }
}

/// Run the whole engine over one stage's rows.
///
/// Fails only when a required column is missing. An empty row set produces an
/// empty summary.
pub fn analyze(
    raw: &RawTable,
    config: &StageConfig,
    policy: ClassifyPolicy,
    filter: &FilterParams,
) -> Result<Analysis, AppError> {
    let mut table = normalize_table(raw, config)?;

    if filter.has_date_bounds() {
        let before = table.records.len();
        table.records.retain(|r| filter.admits(r.timestamp));
        table.stats.filtered_out += before - table.records.len();
    }

    let fixture_column = resolve_fixture_column(&mut table, config);

    if let Some(wanted) = filter.fixture.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        let before = table.records.len();
        table.records.retain(|r| r.fixture == wanted);
        table.stats.filtered_out += before - table.records.len();
    }

    let partitions = classify_records(&table.records, &policy);
    let summary = assemble_summary(&fixture_column, &partitions, &table.records);

    info!(
        rows = table.stats.rows,
        kept = table.records.len(),
        fixtures = summary.fixtures.len(),
        days = summary.dates.len(),
        fixture_column = %fixture_column.name,
        "analysis complete"
    );

    Ok(Analysis {
        stage_config: config.clone(),
        policy,
        filter: filter.clone(),
        table,
        fixture_column,
        partitions,
        summary,
    })
}

/// Rows whose serial number contains `query` (case-insensitive).
///
/// The returned table keeps the source headers; cells are cleaned.
pub fn search_serial(raw: &RawTable, serial_col: &str, query: &str) -> Result<RawTable, AppError> {
    let needle = clean_cell(query).to_lowercase();
    if needle.is_empty() {
        return Err(AppError::input("Search query is empty"));
    }
    let idx = raw
        .column_index(serial_col)
        .ok_or_else(|| AppError::input(format!("Missing required column(s): `{serial_col}`")))?;

    let rows: Vec<Vec<String>> = raw
        .rows
        .iter()
        .filter(|row| {
            row.get(idx)
                .is_some_and(|cell| clean_cell(cell).to_lowercase().contains(&needle))
        })
        .map(|row| row.iter().map(|c| clean_cell(c)).collect())
        .collect();

    debug!(query = %needle, matches = rows.len(), "serial search");

    Ok(RawTable {
        headers: raw.headers.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CountUnit, Stage};

    fn fw_table(rows: &[[&str; 4]]) -> RawTable {
        RawTable {
            headers: ["SNumber", "FwStamp", "FwPC", "FwPass"].iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample() -> RawTable {
        fw_table(&[
            ["S1", "2024-01-01 08:00:00", "PC1", "X"],
            ["S1", "2024-01-01 09:00:00", "PC1", "O"],
            ["S2", "2024-01-01 10:00:00", "PC1", "X"],
            ["S2", "2024-01-02 08:00:00", "PC1", "O"],
            ["S3", "2024-01-02 11:00:00", "PC2", "o"],
            ["S4", "bad", "PC2", "X"],
        ])
    }

    #[test]
    fn analyze_builds_nested_summary() {
        let a = analyze(&sample(), &Stage::Fw.default_config(), ClassifyPolicy::default(), &FilterParams::default()).unwrap();
        assert_eq!(a.summary.dates, vec![day(1), day(2)]);
        assert_eq!(a.summary.fixture_names().collect::<Vec<_>>(), vec!["PC1", "PC2"]);

        let d1 = a.summary.result("PC1", day(1)).unwrap();
        assert_eq!((d1.total_test, d1.pass, d1.false_defect, d1.true_defect, d1.fail), (2, 1, 1, 1, 2));
        assert!(a.summary.result("PC2", day(1)).is_none());
        assert_eq!(a.stats().invalid_timestamps, 1);
    }

    #[test]
    fn every_partition_satisfies_the_count_invariants() {
        for unit in [CountUnit::Serial, CountUnit::Attempt] {
            let policy = ClassifyPolicy {
                count_unit: unit,
                include_unknown_in_total: false,
            };
            let a = analyze(&sample(), &Stage::Fw.default_config(), policy, &FilterParams::default()).unwrap();
            for p in a.partitions.values() {
                assert_eq!(p.counts.false_defect + p.counts.true_defect, p.counts.fail);
                assert!(p.members.true_defect.is_disjoint(&p.members.pass));
                assert!(p.members.false_defect.is_subset(&p.members.pass));
            }
        }
    }

    #[test]
    fn analysis_is_idempotent() {
        let raw = sample();
        let cfg = Stage::Fw.default_config();
        let a = analyze(&raw, &cfg, ClassifyPolicy::default(), &FilterParams::default()).unwrap();
        let b = analyze(&raw, &cfg, ClassifyPolicy::default(), &FilterParams::default()).unwrap();
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.partitions, b.partitions);
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let a = analyze(&fw_table(&[]), &Stage::Fw.default_config(), ClassifyPolicy::default(), &FilterParams::default()).unwrap();
        assert!(a.summary.is_empty());
        assert!(a.summary.dates.is_empty());
    }

    #[test]
    fn absent_fixture_column_yields_one_synthetic_group() {
        let raw = RawTable {
            headers: vec!["SNumber".into(), "FwStamp".into(), "FwPass".into()],
            rows: vec![
                vec!["A".into(), "2024-01-01".into(), "O".into()],
                vec!["B".into(), "2024-01-03".into(), "X".into()],
            ],
        };
        let a = analyze(&raw, &Stage::Fw.default_config(), ClassifyPolicy::default(), &FilterParams::default()).unwrap();
        assert!(a.summary.synthetic_fixture);
        assert_eq!(a.summary.fixture_names().collect::<Vec<_>>(), vec![SYNTHETIC_FIXTURE_LABEL]);
        assert_eq!(a.summary.fixtures[SYNTHETIC_FIXTURE_LABEL].len(), 2);
    }

    #[test]
    fn filters_restrict_dates_and_fixture() {
        let filter = FilterParams {
            start: Some(day(2)),
            end: Some(day(2)),
            fixture: Some("PC1".to_string()),
        };
        let a = analyze(&sample(), &Stage::Fw.default_config(), ClassifyPolicy::default(), &filter).unwrap();
        assert_eq!(a.summary.dates, vec![day(2)]);
        assert_eq!(a.summary.fixture_names().collect::<Vec<_>>(), vec!["PC1"]);
        // 3 rows on day 1, the invalid timestamp, then S3 on PC2.
        assert_eq!(a.stats().filtered_out, 5);
    }

    #[test]
    fn fixture_drill_down_spans_the_whole_range() {
        let a = analyze(&sample(), &Stage::Fw.default_config(), ClassifyPolicy::default(), &FilterParams::default()).unwrap();

        // Per day, S2 is a true defect on day 1.
        let d1 = a.partition("PC1", day(1)).unwrap();
        assert!(d1.members.true_defect.contains("S2"));

        // Across the range, S2 eventually passed.
        let all = a.fixture_outcomes("PC1");
        assert!(all.members.false_defect.contains("S2"));
        assert!(all.members.true_defect.is_empty());

        let rows = a.bucket_rows("PC1", OutcomeBucket::FalseDefect, None);
        let serials: Vec<&str> = rows.iter().map(|r| r.serial.as_str()).collect();
        assert_eq!(serials, vec!["S1", "S2"]);

        let rows = a.bucket_rows("PC1", OutcomeBucket::NeverPassed, Some(day(1)));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].serial, "S2");
        assert!(a.bucket_rows("PC1", OutcomeBucket::Pass, Some(day(9))).is_empty());
    }

    #[test]
    fn serial_search_is_case_insensitive_substring() {
        let raw = fw_table(&[
            ["=\"ab-100\"", "2024-01-01", "PC1", "O"],
            ["AB-200", "2024-01-01", "PC1", "X"],
            ["CD-300", "2024-01-01", "PC1", "O"],
        ]);
        let hits = search_serial(&raw, "snumber", "Ab-").unwrap();
        assert_eq!(hits.rows.len(), 2);
        assert_eq!(hits.rows[0][0], "ab-100");

        assert_eq!(search_serial(&raw, "SNumber", "  ").unwrap_err().exit_code(), 2);
        assert_eq!(search_serial(&raw, "Serial", "AB").unwrap_err().exit_code(), 2);
    }
}
