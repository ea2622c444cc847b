//! Export report tables and raw rows to CSV.
//!
//! Exports are meant to open cleanly in spreadsheets, so they start with a
//! UTF-8 BOM.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::RawTable;
use crate::error::AppError;
use crate::report::{METRIC_LABELS, ReportTable, date_label, fmt_rate};

const UTF8_BOM: &str = "\u{feff}";

/// Write one block per fixture: a `fixture,<name>` line, a header of `yymmdd`
/// date columns, the metric rows (`N/A` where a day has no data) and a blank
/// line between blocks.
pub fn write_report_csv(path: &Path, tables: &[ReportTable]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_report(&mut out, tables)
        .and_then(|()| out.flush().map_err(csv::Error::from))
        .map_err(|e| AppError::runtime(format!("Failed to write export CSV '{}': {e}", path.display())))
}

fn write_report<W: Write>(out: &mut W, tables: &[ReportTable]) -> csv::Result<()> {
    out.write_all(UTF8_BOM.as_bytes())?;
    for (n, table) in tables.iter().enumerate() {
        if n > 0 {
            writeln!(out)?;
        }
        // Block lines have different widths.
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(&mut *out);
        writer.write_record(["fixture", table.fixture.as_str()])?;

        let mut header = vec!["metric".to_string()];
        header.extend(table.dates.iter().map(|d| date_label(*d)));
        writer.write_record(&header)?;

        for (i, label) in METRIC_LABELS.iter().enumerate() {
            let mut row = vec![label.to_string()];
            row.extend(
                table
                    .metric_row(i)
                    .into_iter()
                    .map(|v| v.map_or_else(|| "N/A".to_string(), |n| n.to_string())),
            );
            writer.write_record(&row)?;
        }

        let mut rates = vec!["pass_rate".to_string()];
        rates.extend(
            table
                .pass_rate_row()
                .into_iter()
                .map(|v| v.map_or_else(|| "N/A".to_string(), fmt_rate)),
        );
        writer.write_record(&rates)?;
        writer.flush()?;
    }
    Ok(())
}

/// Write raw rows (e.g. serial-search hits) with their headers.
pub fn write_table_csv(path: &Path, table: &RawTable) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    file.write_all(UTF8_BOM.as_bytes())
        .map_err(|e| AppError::runtime(format!("Failed to write export CSV: {e}")))?;

    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(&table.headers)
        .map_err(|e| AppError::runtime(format!("Failed to write export CSV header: {e}")))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| AppError::runtime(format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::runtime(format!("Failed to write export CSV: {e}")))?;
    Ok(())
}
