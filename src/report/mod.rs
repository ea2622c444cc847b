//! Reporting utilities: fixture × date tables and daily series.

use chrono::NaiveDate;

use crate::domain::{ClassificationResult, Summary};

pub mod format;

pub use format::*;

/// Row labels in report order (matches `ClassificationResult::metrics`).
pub const METRIC_LABELS: [&str; 5] = ["total_test", "pass", "false_defect", "true_defect", "fail"];

/// One fixture's metrics over the global date axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub fixture: String,
    pub dates: Vec<NaiveDate>,
    /// `None` where the fixture has no partition on that date.
    pub cells: Vec<Option<ClassificationResult>>,
}

impl ReportTable {
    /// Metric values for row `metric` (index into [`METRIC_LABELS`]).
    pub fn metric_row(&self, metric: usize) -> Vec<Option<usize>> {
        self.cells
            .iter()
            .map(|c| c.and_then(|r| r.metrics().get(metric).copied()))
            .collect()
    }

    pub fn pass_rate_row(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(|c| c.map(|r| r.pass_rate())).collect()
    }

    /// Counts summed over every date of the table.
    pub fn totals(&self) -> ClassificationResult {
        self.cells.iter().flatten().fold(ClassificationResult::default(), add_counts)
    }
}

/// Column label for a date (`yymmdd`).
pub fn date_label(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// Build report tables in fixture order, optionally for a single fixture.
///
/// Every table spans the same date axis so fixtures line up column by column.
pub fn report_tables(summary: &Summary, fixture: Option<&str>) -> Vec<ReportTable> {
    summary
        .fixture_names()
        .filter(|name| fixture.is_none_or(|f| f == *name))
        .map(|name| ReportTable {
            fixture: name.to_string(),
            dates: summary.dates.clone(),
            cells: summary
                .dates
                .iter()
                .map(|d| summary.result(name, *d).copied())
                .collect(),
        })
        .collect()
}

/// Per-date counts summed across fixtures (or for one fixture).
///
/// Dates with no partition at all yield zero counts so the series stays aligned
/// with the date axis.
pub fn daily_series(summary: &Summary, fixture: Option<&str>) -> Vec<(NaiveDate, ClassificationResult)> {
    summary
        .dates
        .iter()
        .map(|d| {
            let counts = summary
                .fixture_names()
                .filter(|name| fixture.is_none_or(|f| f == *name))
                .filter_map(|name| summary.result(name, *d))
                .fold(ClassificationResult::default(), add_counts);
            (*d, counts)
        })
        .collect()
}

fn add_counts(acc: ClassificationResult, r: &ClassificationResult) -> ClassificationResult {
    ClassificationResult {
        total_test: acc.total_test + r.total_test,
        pass: acc.pass + r.pass,
        false_defect: acc.false_defect + r.false_defect,
        true_defect: acc.true_defect + r.true_defect,
        fail: acc.fail + r.fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn counts(total: usize, pass: usize, fd: usize, td: usize) -> ClassificationResult {
        ClassificationResult {
            total_test: total,
            pass,
            false_defect: fd,
            true_defect: td,
            fail: fd + td,
        }
    }

    pub(crate) fn summary() -> Summary {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let mut fixtures = BTreeMap::new();
        fixtures.insert(
            "PC1".to_string(),
            BTreeMap::from([("2024-01-15".to_string(), counts(2, 2, 1, 0)), ("2024-01-16".to_string(), counts(3, 2, 0, 1))]),
        );
        fixtures.insert("PC2".to_string(), BTreeMap::from([("2024-01-16".to_string(), counts(1, 1, 0, 0))]));
        Summary {
            fixture_column: "FwPC".to_string(),
            synthetic_fixture: false,
            fixtures,
            dates: vec![d1, d2],
        }
    }

    #[test]
    fn tables_share_the_global_date_axis() {
        let tables = report_tables(&summary(), None);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].fixture, "PC2");
        assert_eq!(tables[1].metric_row(0), vec![None, Some(1)]);
        assert_eq!(tables[0].metric_row(4), vec![Some(1), Some(1)]);
        assert_eq!(tables[0].totals(), counts(5, 4, 1, 1));
    }

    #[test]
    fn fixture_filter_selects_one_table() {
        let tables = report_tables(&summary(), Some("PC2"));
        assert_eq!(tables.len(), 1);
        assert!(report_tables(&summary(), Some("nope")).is_empty());
    }

    #[test]
    fn daily_series_sums_fixtures() {
        let series = daily_series(&summary(), None);
        assert_eq!(series[0].1, counts(2, 2, 1, 0));
        assert_eq!(series[1].1, counts(4, 3, 0, 1));
        let pc2 = daily_series(&summary(), Some("PC2"));
        assert_eq!(pc2[0].1, ClassificationResult::default());
    }

    #[test]
    fn date_labels_are_yymmdd() {
        assert_eq!(date_label(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()), "240105");
    }
}
