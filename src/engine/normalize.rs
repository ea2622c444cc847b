//! Row Normalizer.
//!
//! Spreadsheet exports of the inspection history carry a few quoting artifacts
//! (`="123"`, `""123""`, `"123"`). Normalization removes them cell by cell,
//! canonicalizes the stage's pass flag and parses the stage's timestamp.
//!
//! Normalization is column-wise and row-independent: a bad cell never
//! invalidates the rest of its row. Only a missing *required column* is fatal.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{PassFlag, RawTable, StageConfig, Timestamp};
use crate::error::AppError;

/// Date-time layouts tried (in order) after the stage's preferred format.
const DATETIME_FORMATS: [&str; 11] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y%m%d%H%M%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts (midnight is assumed).
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d", "%m/%d/%Y"];

/// One normalized test attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    /// Index into `NormalizedTable::rows`.
    pub row: usize,
    pub serial: String,
    pub timestamp: Timestamp,
    pub flag: PassFlag,
    /// Filled in by the grouping key resolver; empty until then.
    pub fixture: String,
}

/// Row-level anomalies absorbed during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub rows: usize,
    pub invalid_timestamps: usize,
    pub unknown_flags: usize,
    pub blank_serials: usize,
    pub blank_fixture_rows: usize,
    pub filtered_out: usize,
}

/// Working copy of the input: cleaned cells plus one record per row.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub records: Vec<TestRecord>,
    pub stats: NormalizeStats,
}

impl NormalizedTable {
    /// Case-insensitive header lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Append a column holding `value` on every row and return its index.
    pub fn push_constant_column(&mut self, name: &str, value: &str) -> usize {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.to_string());
        }
        self.headers.len() - 1
    }
}

/// Strip one spreadsheet quoting artifact from a raw cell.
///
/// Blank input yields an empty string; unmatched values pass through trimmed.
pub fn clean_cell(value: &str) -> String {
    let s = value.trim();

    if let Some(inner) = s.strip_prefix("=\"").and_then(|r| r.strip_suffix('"')) {
        return inner.to_string();
    }
    if let Some(inner) = s.strip_prefix("\"\"").and_then(|r| r.strip_suffix("\"\"")) {
        return inner.to_string();
    }
    if let Some(inner) = s.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        return inner.to_string();
    }
    // A CSV reader turns `""X""` into an empty quoted field followed by `X""`.
    if let Some(inner) = s.strip_suffix("\"\"").filter(|r| !r.contains('"')) {
        return inner.trim().to_string();
    }

    s.to_string()
}

/// Canonicalize a pass-flag cell (`o`, ` O `, `="O"` -> `Pass`).
pub fn normalize_flag(value: &str) -> PassFlag {
    PassFlag::from_token(&clean_cell(value).trim().to_ascii_uppercase())
}

/// Tolerant timestamp parsing.
///
/// The stage's preferred format is tried first, then a fixed list of common
/// layouts and RFC 3339. Offsets are dropped (naive local time is kept).
pub fn parse_timestamp(value: &str, preferred: Option<&str>) -> Timestamp {
    let cleaned = clean_cell(value);
    let s = cleaned.trim();
    if s.is_empty() {
        return Timestamp::Invalid;
    }

    if let Some(fmt) = preferred {
        if let Some(dt) = parse_with(s, fmt) {
            return Timestamp::Valid(dt);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Timestamp::Valid(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Timestamp::Valid(dt.naive_local());
    }

    for fmt in DATE_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(s, fmt).ok().and_then(|d| d.and_hms_opt(0, 0, 0)) {
            return Timestamp::Valid(dt);
        }
    }

    Timestamp::Invalid
}

fn parse_with(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Normalize a raw table for one stage.
///
/// Fails only when a required column is missing; the error names every
/// missing column.
pub fn normalize_table(raw: &RawTable, config: &StageConfig) -> Result<NormalizedTable, AppError> {
    let missing: Vec<&str> = config
        .required_columns()
        .into_iter()
        .filter(|name| raw.column_index(name).is_none())
        .collect();
    if !missing.is_empty() {
        let list = missing
            .iter()
            .map(|c| format!("`{c}`"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(AppError::input(format!("Missing required column(s): {list}")));
    }

    // Presence was checked above.
    let serial_idx = raw.column_index(&config.serial_col).unwrap_or_default();
    let ts_idx = raw.column_index(&config.timestamp_col).unwrap_or_default();
    let flag_idx = raw.column_index(&config.pass_flag_col).unwrap_or_default();
    let width = raw.headers.len();

    let mut stats = NormalizeStats {
        rows: raw.rows.len(),
        ..NormalizeStats::default()
    };
    let mut rows = Vec::with_capacity(raw.rows.len());
    let mut records = Vec::with_capacity(raw.rows.len());

    for (row_idx, raw_row) in raw.rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|i| raw_row.get(i).map(|c| clean_cell(c)).unwrap_or_default())
            .collect();

        let timestamp = parse_timestamp(&cells[ts_idx], config.timestamp_format.as_deref());
        if !timestamp.is_valid() {
            stats.invalid_timestamps += 1;
        }

        let flag = normalize_flag(&cells[flag_idx]);
        if flag == PassFlag::Unknown {
            stats.unknown_flags += 1;
        }

        let serial = cells[serial_idx].trim().to_string();
        if serial.is_empty() {
            stats.blank_serials += 1;
        }

        records.push(TestRecord {
            row: row_idx,
            serial,
            timestamp,
            flag,
            fixture: String::new(),
        });
        rows.push(cells);
    }

    debug!(
        rows = stats.rows,
        invalid_timestamps = stats.invalid_timestamps,
        unknown_flags = stats.unknown_flags,
        blank_serials = stats.blank_serials,
        "normalized rows"
    );

    Ok(NormalizedTable {
        headers: raw.headers.iter().map(|h| h.trim().to_string()).collect(),
        rows,
        records,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        Timestamp::Valid(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap(),
        )
    }

    #[test]
    fn clean_cell_unwraps_quoting_artifacts() {
        assert_eq!(clean_cell("=\"0012345\""), "0012345");
        assert_eq!(clean_cell("\"\"PC-01\"\""), "PC-01");
        assert_eq!(clean_cell("\"O\""), "O");
        assert_eq!(clean_cell("  plain "), "plain");
        assert_eq!(clean_cell(""), "");
        assert_eq!(clean_cell("\"\""), "");
        assert_eq!(clean_cell("O\"\""), "O");
        assert_eq!(clean_cell("a\"b\"\""), "a\"b\"\"");
    }

    #[test]
    fn flags_are_trimmed_and_upper_cased() {
        assert_eq!(normalize_flag(" o "), PassFlag::Pass);
        assert_eq!(normalize_flag("=\"x\""), PassFlag::Fail);
        assert_eq!(normalize_flag(""), PassFlag::Unknown);
        assert_eq!(normalize_flag("PASS"), PassFlag::Unknown);
    }

    #[test]
    fn timestamps_parse_tolerantly() {
        assert_eq!(parse_timestamp("2024-01-15 09:30:00", None), dt(2024, 1, 15, 9, 30, 0));
        assert_eq!(parse_timestamp("2024/01/15 09:30:00", None), dt(2024, 1, 15, 9, 30, 0));
        assert_eq!(parse_timestamp("=\"20240115093000\"", None), dt(2024, 1, 15, 9, 30, 0));
        assert_eq!(parse_timestamp("2024-01-15", None), dt(2024, 1, 15, 0, 0, 0));
        assert_eq!(
            parse_timestamp("2024-01-15T23:10:00+09:00", None),
            dt(2024, 1, 15, 23, 10, 0)
        );
        assert_eq!(parse_timestamp("not a date", None), Timestamp::Invalid);
        assert_eq!(parse_timestamp("   ", None), Timestamp::Invalid);
    }

    #[test]
    fn preferred_format_wins() {
        // Day-first input would otherwise be read month-first.
        assert_eq!(
            parse_timestamp("03/02/2024 10:00:00", Some("%d/%m/%Y %H:%M:%S")),
            dt(2024, 2, 3, 10, 0, 0)
        );
    }

    #[test]
    fn missing_required_columns_are_all_named() {
        let raw = RawTable {
            headers: vec!["SNumber".to_string(), "Other".to_string()],
            rows: vec![],
        };
        let err = normalize_table(&raw, &crate::domain::Stage::Pcb.default_config()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("`PcbStartTime`"));
        assert!(err.message().contains("`PcbPass`"));
        assert!(!err.message().contains("`SNumber`"));
    }

    #[test]
    fn bad_cells_do_not_reject_rows() {
        let raw = RawTable {
            headers: vec!["snumber".to_string(), "PcbStartTime".to_string(), "PcbPass".to_string()],
            rows: vec![
                vec!["=\"A1\"".to_string(), "garbage".to_string(), "o".to_string()],
                vec!["A2".to_string(), "2024-01-15 10:00:00".to_string(), "?".to_string()],
            ],
        };
        let table = normalize_table(&raw, &crate::domain::Stage::Pcb.default_config()).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].serial, "A1");
        assert_eq!(table.records[0].timestamp, Timestamp::Invalid);
        assert_eq!(table.records[0].flag, PassFlag::Pass);
        assert_eq!(table.records[1].flag, PassFlag::Unknown);
        assert_eq!(table.stats.invalid_timestamps, 1);
        assert_eq!(table.stats.unknown_flags, 1);
        assert_eq!(table.cell(0, 0), "A1");
    }
}
