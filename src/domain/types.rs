//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during classification
//! - exported to JSON/CSV
//! - reloaded later for rendering (`fy show`)

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Production test stage.
///
/// Every stage writes its own timestamp / fixture / pass-flag columns into the
/// shared inspection history; the serial number column is common to all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// PCB test.
    Pcb,
    /// Firmware download/verify.
    Fw,
    /// RF transmit test.
    Rftx,
    /// Semi-assembly test.
    Semi,
    /// Functional battery/ADC test.
    Func,
}

impl Stage {
    pub const ALL: [Stage; 5] = [Stage::Pcb, Stage::Fw, Stage::Rftx, Stage::Semi, Stage::Func];

    /// Short key used in file names and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Stage::Pcb => "pcb",
            Stage::Fw => "fw",
            Stage::Rftx => "rftx",
            Stage::Semi => "semi",
            Stage::Func => "func",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Pcb => "PCB",
            Stage::Fw => "FW",
            Stage::Rftx => "RF-TX",
            Stage::Semi => "Semi-Assy",
            Stage::Func => "Func (Batadc)",
        }
    }

    /// Built-in column layout for this stage.
    pub fn default_config(self) -> StageConfig {
        match self {
            Stage::Pcb => StageConfig::new("PcbStartTime", "PcbMaxIrPwr", "PcbPass"),
            Stage::Fw => StageConfig::new("FwStamp", "FwPC", "FwPass"),
            Stage::Rftx => StageConfig::new("RfTxStamp", "RfTxPC", "RfTxPass").with_fallbacks(&["RftxPC"]),
            Stage::Semi => StageConfig::new("SemiAssyStartTime", "SemiAssyPC", "SemiAssyPass")
                .with_fallbacks(&["SemiAssyMaxSolarVolt", "SemiAssyMaxBatVolt", "BatadcPC"])
                .with_timestamp_format("%Y%m%d%H%M%S"),
            Stage::Func => StageConfig::new("BatadcStamp", "BatadcPC", "BatadcPass"),
        }
    }

    pub fn next(self) -> Stage {
        let idx = Stage::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Stage::ALL[(idx + 1) % Stage::ALL.len()]
    }

    pub fn prev(self) -> Stage {
        let idx = Stage::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Stage::ALL[(idx + Stage::ALL.len() - 1) % Stage::ALL.len()]
    }
}

/// Column names used by one stage.
///
/// Passed explicitly to the engine; nothing is resolved by naming convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageConfig {
    pub serial_col: String,
    pub timestamp_col: String,
    /// Preferred fixture/station column.
    pub fixture_col: String,
    /// Alternative fixture columns, tried in order when `fixture_col` is absent or blank.
    #[serde(default)]
    pub fixture_fallbacks: Vec<String>,
    pub pass_flag_col: String,
    /// Preferred `chrono` format for the timestamp column (tolerant parsing is used as fallback).
    #[serde(default)]
    pub timestamp_format: Option<String>,
}

impl StageConfig {
    fn new(timestamp_col: &str, fixture_col: &str, pass_flag_col: &str) -> Self {
        Self {
            serial_col: "SNumber".to_string(),
            timestamp_col: timestamp_col.to_string(),
            fixture_col: fixture_col.to_string(),
            fixture_fallbacks: Vec::new(),
            pass_flag_col: pass_flag_col.to_string(),
            timestamp_format: None,
        }
    }

    fn with_fallbacks(mut self, fallbacks: &[&str]) -> Self {
        self.fixture_fallbacks = fallbacks.iter().map(|s| s.to_string()).collect();
        self
    }

    fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = Some(format.to_string());
        self
    }

    /// Columns without which the stage cannot be classified at all.
    pub fn required_columns(&self) -> [&str; 3] {
        [
            self.serial_col.as_str(),
            self.timestamp_col.as_str(),
            self.pass_flag_col.as_str(),
        ]
    }

    /// Fixture column candidates in priority order.
    pub fn fixture_candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.fixture_col.as_str()).chain(self.fixture_fallbacks.iter().map(String::as_str))
    }
}

/// Canonical pass/fail token of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassFlag {
    /// `O`
    Pass,
    /// `X`
    Fail,
    /// Blank or anything else; excluded from pass/fail tallies.
    Unknown,
}

impl PassFlag {
    /// Map an already cleaned, trimmed and upper-cased token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "O" => PassFlag::Pass,
            "X" => PassFlag::Fail,
            _ => PassFlag::Unknown,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            PassFlag::Pass => "O",
            PassFlag::Fail => "X",
            PassFlag::Unknown => "",
        }
    }
}

/// Parsed attempt timestamp.
///
/// Unparseable cells become `Invalid` rather than an error so that grouping can
/// skip the row while every other column stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timestamp {
    Valid(NaiveDateTime),
    Invalid,
}

impl Timestamp {
    /// Calendar date in naive/local time.
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            Timestamp::Valid(dt) => Some(dt.date()),
            Timestamp::Invalid => None,
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Timestamp::Valid(_))
    }
}

/// Unit that the per-partition counts are expressed in.
///
/// One run-wide choice; every stage is counted the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CountUnit {
    /// Count distinct serial numbers.
    #[default]
    Serial,
    /// Count individual test attempts (rows).
    Attempt,
}

/// Counting policy for the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClassifyPolicy {
    pub count_unit: CountUnit,
    /// Fold serials/rows with blank or unrecognized flags into `total_test`.
    pub include_unknown_in_total: bool,
}

/// Pre-analysis row filter (inclusive date range + optional single fixture).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FilterParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub fixture: Option<String>,
}

impl FilterParams {
    pub fn has_date_bounds(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Whether a row with the given timestamp survives the date bounds.
    ///
    /// With any bound set, rows without a valid timestamp are dropped.
    pub fn admits(&self, ts: Timestamp) -> bool {
        if !self.has_date_bounds() {
            return true;
        }
        let Some(date) = ts.date() else {
            return false;
        };
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

/// Counts for one (fixture, day) partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub total_test: usize,
    pub pass: usize,
    pub false_defect: usize,
    pub true_defect: usize,
    pub fail: usize,
}

impl ClassificationResult {
    /// Pass rate in percent (0 when nothing was tested).
    pub fn pass_rate(&self) -> f64 {
        if self.total_test == 0 {
            0.0
        } else {
            100.0 * self.pass as f64 / self.total_test as f64
        }
    }

    /// Values in report order: total, pass, false defect, true defect, fail.
    pub fn metrics(&self) -> [usize; 5] {
        [self.total_test, self.pass, self.false_defect, self.true_defect, self.fail]
    }
}

/// Drill-down buckets exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBucket {
    Pass,
    FalseDefect,
    TrueDefect,
    /// Every serial without a passing attempt (failed or unknown only).
    NeverPassed,
}

impl OutcomeBucket {
    pub const ALL: [OutcomeBucket; 4] = [
        OutcomeBucket::Pass,
        OutcomeBucket::FalseDefect,
        OutcomeBucket::TrueDefect,
        OutcomeBucket::NeverPassed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OutcomeBucket::Pass => "PASS",
            OutcomeBucket::FalseDefect => "FALSE DEFECT",
            OutcomeBucket::TrueDefect => "TRUE DEFECT",
            OutcomeBucket::NeverPassed => "FAIL",
        }
    }

    pub fn next(self) -> OutcomeBucket {
        let idx = OutcomeBucket::ALL.iter().position(|b| *b == self).unwrap_or(0);
        OutcomeBucket::ALL[(idx + 1) % OutcomeBucket::ALL.len()]
    }
}

/// Serial numbers per outcome bucket (sorted).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeSets {
    pub pass: BTreeSet<String>,
    pub false_defect: BTreeSet<String>,
    pub true_defect: BTreeSet<String>,
    pub never_passed: BTreeSet<String>,
}

impl OutcomeSets {
    pub fn bucket(&self, bucket: OutcomeBucket) -> &BTreeSet<String> {
        match bucket {
            OutcomeBucket::Pass => &self.pass,
            OutcomeBucket::FalseDefect => &self.false_defect,
            OutcomeBucket::TrueDefect => &self.true_defect,
            OutcomeBucket::NeverPassed => &self.never_passed,
        }
    }
}

/// Nested per-fixture, per-day results plus the global date axis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Column the rows were grouped by (may be the synthetic single-group column).
    pub fixture_column: String,
    pub synthetic_fixture: bool,
    /// fixture -> ISO date (`YYYY-MM-DD`) -> counts.
    pub fixtures: BTreeMap<String, BTreeMap<String, ClassificationResult>>,
    /// Every distinct calendar date seen, ascending.
    pub dates: Vec<NaiveDate>,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn result(&self, fixture: &str, date: NaiveDate) -> Option<&ClassificationResult> {
        self.fixtures.get(fixture)?.get(&iso_date(date))
    }

    pub fn fixture_names(&self) -> impl Iterator<Item = &str> {
        self.fixtures.keys().map(String::as_str)
    }
}

/// `YYYY-MM-DD`.
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// A materialized table of raw rows with named columns.
///
/// Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Case-insensitive header lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub csv_path: PathBuf,
    pub stage: Stage,
    pub columns: StageConfig,
    pub policy: ClassifyPolicy,
    pub filter: FilterParams,

    /// Print per-fixture drill-down lists.
    pub details: bool,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_without_bounds_admits_invalid_timestamps() {
        let filter = FilterParams::default();
        assert!(filter.admits(Timestamp::Invalid));
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let filter = FilterParams {
            start: Some(d(2)),
            end: Some(d(4)),
            fixture: None,
        };
        let at = |day| Timestamp::Valid(d(day).and_hms_opt(23, 59, 59).unwrap());
        assert!(!filter.admits(at(1)));
        assert!(filter.admits(at(2)));
        assert!(filter.admits(at(4)));
        assert!(!filter.admits(at(5)));
        assert!(!filter.admits(Timestamp::Invalid));
    }

    #[test]
    fn stage_cycle_wraps() {
        assert_eq!(Stage::Func.next(), Stage::Pcb);
        assert_eq!(Stage::Pcb.prev(), Stage::Func);
    }

    #[test]
    fn semi_stage_carries_compact_timestamp_format() {
        let cfg = Stage::Semi.default_config();
        assert_eq!(cfg.timestamp_format.as_deref(), Some("%Y%m%d%H%M%S"));
        let candidates: Vec<&str> = cfg.fixture_candidates().collect();
        assert_eq!(candidates[0], "SemiAssyPC");
        assert_eq!(candidates.len(), 4);
    }

    #[test]
    fn pass_rate_handles_empty_partition() {
        assert_eq!(ClassificationResult::default().pass_rate(), 0.0);
        let r = ClassificationResult {
            total_test: 4,
            pass: 3,
            false_defect: 1,
            true_defect: 1,
            fail: 2,
        };
        assert!((r.pass_rate() - 75.0).abs() < 1e-12);
    }
}
