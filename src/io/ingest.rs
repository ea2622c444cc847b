//! CSV ingest.
//!
//! This module is responsible for turning an inspection-history export into a
//! rectangular [`RawTable`]. It does not interpret any column; that is the
//! engine's job.
//!
//! Exports found in the wild:
//! - may start with a few preamble lines (report title, query parameters)
//! - may carry a UTF-8 BOM and spreadsheet quoting artifacts on the header
//! - may have a leading unnamed index column
//! - may contain bytes that are not valid UTF-8
//!
//! Header detection looks for the first record (within the first 100) that
//! carries every requested key column.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::RawTable;
use crate::engine::clean_cell;
use crate::error::{AppError, EXIT_NO_DATA};

/// Number of leading records scanned for the header row.
pub const HEADER_SCAN_LIMIT: usize = 100;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the table plus what was skipped on the way.
#[derive(Debug, Clone)]
pub struct IngestedTable {
    /// Human-readable origin (file path or `demo`).
    pub source: String,
    pub table: RawTable,
    /// 1-based line of the detected header.
    pub header_line: usize,
    pub preamble_rows: usize,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl IngestedTable {
    /// Wrap an in-memory table (no preamble, no errors).
    pub fn from_table(source: impl Into<String>, table: RawTable) -> Self {
        let rows_read = table.rows.len();
        Self {
            source: source.into(),
            table,
            header_line: 1,
            preamble_rows: 0,
            row_errors: Vec::new(),
            rows_read,
        }
    }
}

/// Anything that can produce a table of rows with named columns.
pub trait RowSource {
    fn describe(&self) -> String;

    fn load(&self) -> Result<IngestedTable, AppError>;
}

/// Delimited file on disk.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    /// Columns that identify the header row.
    pub header_keys: Vec<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, header_keys: &[&str]) -> Self {
        Self {
            path: path.into(),
            header_keys: header_keys.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RowSource for CsvSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<IngestedTable, AppError> {
        let mut ingested = read_csv_file(&self.path, &self.header_keys)?;
        ingested.source = self.describe();
        Ok(ingested)
    }
}

impl RowSource for RawTable {
    fn describe(&self) -> String {
        "in-memory table".to_string()
    }

    fn load(&self) -> Result<IngestedTable, AppError> {
        Ok(IngestedTable::from_table(self.describe(), self.clone()))
    }
}

pub fn read_csv_file(path: &Path, header_keys: &[String]) -> Result<IngestedTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let keys: Vec<&str> = header_keys.iter().map(String::as_str).collect();
    read_table(file, &keys)
}

/// Read delimited data from any reader.
pub fn read_table<R: Read>(mut reader: R, header_keys: &[&str]) -> Result<IngestedTable, AppError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| AppError::input(format!("Failed to read CSV: {e}")))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());

    let mut records: Vec<(usize, Vec<String>)> = Vec::new();
    let mut row_errors = Vec::new();

    for (idx, result) in reader.byte_records().enumerate() {
        match result {
            Ok(record) => {
                let line = record.position().map_or(idx + 1, |p| content_line(&bytes, p));
                let cells = record
                    .iter()
                    .map(|c| String::from_utf8_lossy(c).into_owned())
                    .collect();
                records.push((line, cells));
            }
            Err(e) => {
                let line = e.position().map_or(idx + 1, |p| content_line(&bytes, p));
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
            }
        }
    }

    if records.is_empty() {
        return Err(AppError::new(EXIT_NO_DATA, "CSV contains no records."));
    }

    let header_idx = detect_header(&records, header_keys).unwrap_or_else(|| {
        if !header_keys.is_empty() {
            warn!(keys = ?header_keys, "no header row found; using the first record");
        }
        0
    });
    if header_idx > 0 {
        warn!(rows = header_idx, "skipped preamble rows before the header");
    }

    let (header_line, header_cells) = &records[header_idx];
    let mut headers: Vec<String> = header_cells.iter().map(|h| normalize_header_name(h)).collect();

    // Index columns written by dataframe exports have no name.
    let drop_first = headers.len() > 1 && headers[0].is_empty();
    if drop_first {
        headers.remove(0);
    }
    let width = headers.len();

    let mut rows = Vec::with_capacity(records.len() - header_idx - 1);
    for (_, cells) in &records[header_idx + 1..] {
        let skip = usize::from(drop_first);
        let mut row: Vec<String> = cells.iter().skip(skip).take(width).cloned().collect();
        row.resize(width, String::new());
        if row.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(row);
    }

    debug!(
        header_line = *header_line,
        columns = width,
        rows = rows.len(),
        row_errors = row_errors.len(),
        "read csv"
    );

    Ok(IngestedTable {
        source: String::new(),
        rows_read: records.len() - header_idx - 1,
        table: RawTable { headers, rows },
        header_line: *header_line,
        preamble_rows: header_idx,
        row_errors,
    })
}

/// 1-based line where a record's content starts.
///
/// The reader reports the position where it started scanning, which lies on
/// the first of any blank lines it skipped before the record.
fn content_line(bytes: &[u8], pos: &csv::Position) -> usize {
    let mut line = pos.line() as usize;
    let start = usize::try_from(pos.byte()).unwrap_or(bytes.len());
    for b in bytes.iter().skip(start) {
        match b {
            b'\n' => line += 1,
            b'\r' => {}
            _ => break,
        }
    }
    line
}

fn detect_header(records: &[(usize, Vec<String>)], keys: &[&str]) -> Option<usize> {
    if keys.is_empty() {
        return Some(0);
    }
    records.iter().take(HEADER_SCAN_LIMIT).position(|(_, cells)| {
        let names: Vec<String> = cells.iter().map(|c| normalize_header_name(c)).collect();
        keys.iter()
            .all(|k| names.iter().any(|n| n.eq_ignore_ascii_case(k.trim())))
    })
}

fn normalize_header_name(name: &str) -> String {
    // Excel writes a BOM in front of the first header cell.
    clean_cell(name.trim().trim_start_matches('\u{feff}'))
}
