//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the engine stays free of presentation concerns
//! - output changes are localized (golden tests below)

use chrono::NaiveDate;

use crate::domain::{CountUnit, OutcomeBucket, PassFlag, RawTable, Stage, Timestamp, iso_date};
use crate::engine::{Analysis, TestRecord};
use crate::io::ingest::IngestedTable;
use crate::report::{METRIC_LABELS, ReportTable, date_label};

/// Format the run header (source, row diagnostics, grouping and filters).
pub fn format_run_summary(ingest: &IngestedTable, analysis: &Analysis, stage: Stage) -> String {
    let mut out = String::new();
    let stats = analysis.stats();

    out.push_str(&format!("=== fy - Fixture Yield ({}) ===\n", stage.display_name()));
    out.push_str(&format!("Source: {}", ingest.source));
    if ingest.preamble_rows > 0 {
        out.push_str(&format!(
            " (header at line {}, {} preamble rows skipped)",
            ingest.header_line, ingest.preamble_rows
        ));
    }
    out.push('\n');
    if !ingest.row_errors.is_empty() {
        out.push_str(&format!("Unreadable rows: {}\n", ingest.row_errors.len()));
    }

    out.push_str(&format!(
        "Rows: {} read | {} kept | invalid timestamps={} unknown flags={} blank serials={} blank fixture={} filtered={}\n",
        stats.rows,
        analysis.table.records.len(),
        stats.invalid_timestamps,
        stats.unknown_flags,
        stats.blank_serials,
        stats.blank_fixture_rows,
        stats.filtered_out,
    ));

    if analysis.summary.synthetic_fixture {
        out.push_str(&format!(
            "Grouped by: all rows (`{}` missing or blank)\n",
            analysis.stage_config.fixture_col
        ));
    } else {
        out.push_str(&format!("Grouped by: {}\n", analysis.summary.fixture_column));
    }

    let unit = match analysis.policy.count_unit {
        CountUnit::Serial => "serial numbers",
        CountUnit::Attempt => "attempts",
    };
    let unknown = if analysis.policy.include_unknown_in_total {
        "included in"
    } else {
        "excluded from"
    };
    out.push_str(&format!("Counting: {unit} (unknown flags {unknown} total)\n"));

    let f = &analysis.filter;
    if f.has_date_bounds() || f.fixture.is_some() {
        let start = f.start.map(iso_date).unwrap_or_else(|| "..".to_string());
        let end = f.end.map(iso_date).unwrap_or_else(|| "..".to_string());
        out.push_str(&format!(
            "Filter: dates=[{start}, {end}] fixture={}\n",
            f.fixture.as_deref().unwrap_or("*")
        ));
    }

    let dates = &analysis.summary.dates;
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => out.push_str(&format!(
            "Days: n={} [{}, {}] | fixtures={}\n",
            dates.len(),
            iso_date(*first),
            iso_date(*last),
            analysis.summary.fixtures.len()
        )),
        _ => out.push_str("Days: none (no rows with a valid timestamp)\n"),
    }

    out
}

/// Format one fixture's table: metric rows × date columns plus a total column.
pub fn format_report_table(table: &ReportTable) -> String {
    let mut out = String::new();
    out.push_str(&format!("Fixture: {}\n", table.fixture));

    let mut header = format!("{:<13}", "metric");
    for d in &table.dates {
        header.push_str(&format!(" {:>7}", date_label(*d)));
    }
    header.push_str(&format!(" {:>7}", "total"));
    out.push_str(header.trim_end());
    out.push('\n');

    let totals = table.totals().metrics();
    for (i, label) in METRIC_LABELS.iter().enumerate() {
        let mut line = format!("{label:<13}");
        for v in table.metric_row(i) {
            line.push_str(&format!(" {:>7}", fmt_count(v)));
        }
        line.push_str(&format!(" {:>7}", totals[i]));
        out.push_str(line.trim_end());
        out.push('\n');
    }

    let mut line = format!("{:<13}", "pass_rate");
    for v in table.pass_rate_row() {
        line.push_str(&format!(" {:>7}", v.map(fmt_rate).unwrap_or_else(|| "N/A".to_string())));
    }
    line.push_str(&format!(" {:>7}", fmt_rate(table.totals().pass_rate())));
    out.push_str(line.trim_end());
    out.push('\n');

    out
}

/// Format every table, separated by blank lines.
pub fn format_report_tables(tables: &[ReportTable]) -> String {
    if tables.is_empty() {
        return "No results (empty input or nothing left after filtering).\n".to_string();
    }
    tables
        .iter()
        .map(format_report_table)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One drill-down line.
pub fn detail_line(record: &TestRecord) -> String {
    let at = match record.timestamp {
        Timestamp::Valid(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Timestamp::Invalid => "?".to_string(),
    };
    let flag = match record.flag {
        PassFlag::Unknown => "-",
        other => other.token(),
    };
    format!("S/N: {}, PC: {} @ {at} [{flag}]", record.serial, record.fixture)
}

/// Drill-down lists for one fixture (whole range, or one day).
pub fn format_drill_down(analysis: &Analysis, fixture: &str, date: Option<NaiveDate>) -> String {
    let mut out = String::new();
    let scope = date.map(iso_date).unwrap_or_else(|| "all days".to_string());
    out.push_str(&format!("Details: {fixture} ({scope})\n"));

    for bucket in OutcomeBucket::ALL {
        let rows = analysis.bucket_rows(fixture, bucket, date);
        out.push_str(&format!("{} ({}):\n", bucket.label(), rows.len()));
        for r in rows {
            out.push_str("  ");
            out.push_str(&detail_line(r));
            out.push('\n');
        }
    }

    out
}

/// Format serial-search hits as an aligned table.
///
/// `columns` restricts the output (missing names are ignored); an empty slice
/// shows every column.
pub fn format_search_results(table: &RawTable, columns: &[&str]) -> String {
    let idx: Vec<usize> = if columns.is_empty() {
        (0..table.headers.len()).collect()
    } else {
        columns.iter().filter_map(|c| table.column_index(c)).collect()
    };

    let mut out = format!("{} matching row(s)\n", table.rows.len());
    if table.rows.is_empty() || idx.is_empty() {
        return out;
    }

    let widths: Vec<usize> = idx
        .iter()
        .map(|&i| {
            let content = table
                .rows
                .iter()
                .map(|r| r.get(i).map_or(0, |c| c.chars().count()))
                .max()
                .unwrap_or(0);
            content.max(table.headers[i].chars().count()).min(24)
        })
        .collect();

    let render = |cells: Vec<&str>| -> String {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", truncate(c, *w), w = *w))
            .collect::<Vec<_>>()
            .join(" | ");
        line.trim_end().to_string()
    };

    out.push_str(&render(idx.iter().map(|&i| table.headers[i].as_str()).collect()));
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    out.push('\n');
    for row in &table.rows {
        out.push_str(&render(idx.iter().map(|&i| row.get(i).map_or("", String::as_str)).collect()));
        out.push('\n');
    }

    out
}

fn fmt_count(v: Option<usize>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// `NN.N%`.
pub fn fmt_rate(rate: f64) -> String {
    format!("{rate:.1}%")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClassifyPolicy, FilterParams};
    use crate::engine::analyze;
    use crate::report::report_tables;

    #[test]
    fn report_table_golden() {
        let tables = report_tables(&crate::report::tests::summary(), None);
        let expected = "\
Fixture: PC2
metric         240115  240116   total
total_test        N/A       1       1
pass              N/A       1       1
false_defect      N/A       0       0
true_defect       N/A       0       0
fail              N/A       0       0
pass_rate         N/A  100.0%  100.0%
";
        assert_eq!(format_report_table(&tables[1]), expected);
    }

    #[test]
    fn rates_have_one_decimal() {
        assert_eq!(fmt_rate(200.0 / 3.0), "66.7%");
        assert_eq!(fmt_rate(0.0), "0.0%");
    }

    fn fw_analysis() -> Analysis {
        let raw = RawTable {
            headers: vec!["SNumber".into(), "FwStamp".into(), "FwPC".into(), "FwPass".into()],
            rows: vec![
                vec!["S1".into(), "2024-01-15 08:00:00".into(), "PC1".into(), "X".into()],
                vec!["S1".into(), "2024-01-15 09:00:00".into(), "PC1".into(), "O".into()],
                vec!["S2".into(), "2024-01-15 10:00:00".into(), "PC1".into(), "X".into()],
            ],
        };
        analyze(&raw, &Stage::Fw.default_config(), ClassifyPolicy::default(), &FilterParams::default()).unwrap()
    }

    #[test]
    fn drill_down_golden() {
        let expected = "\
Details: PC1 (all days)
PASS (1):
  S/N: S1, PC: PC1 @ 2024-01-15 09:00:00 [O]
FALSE DEFECT (1):
  S/N: S1, PC: PC1 @ 2024-01-15 08:00:00 [X]
TRUE DEFECT (1):
  S/N: S2, PC: PC1 @ 2024-01-15 10:00:00 [X]
FAIL (1):
  S/N: S2, PC: PC1 @ 2024-01-15 10:00:00 [X]
";
        assert_eq!(format_drill_down(&fw_analysis(), "PC1", None), expected);
    }

    #[test]
    fn run_summary_mentions_grouping_and_days() {
        let analysis = fw_analysis();
        let ingest = IngestedTable::from_table("history.csv", RawTable::default());
        let text = format_run_summary(&ingest, &analysis, Stage::Fw);
        assert!(text.starts_with("=== fy - Fixture Yield (FW) ===\nSource: history.csv\n"));
        assert!(text.contains("Grouped by: FwPC\n"));
        assert!(text.contains("Counting: serial numbers (unknown flags excluded from total)\n"));
        assert!(text.contains("Days: n=1 [2024-01-15, 2024-01-15] | fixtures=1\n"));
        assert!(!text.contains("Filter:"));
    }

    #[test]
    fn search_results_golden() {
        let table = RawTable {
            headers: vec!["SNumber".into(), "FwPC".into(), "Note".into()],
            rows: vec![
                vec!["AB-1".into(), "PC1".into(), "x".into()],
                vec!["AB-22".into(), "PC10".into(), "".into()],
            ],
        };
        let expected = "\
2 matching row(s)
SNumber | FwPC
--------+-----
AB-1    | PC1
AB-22   | PC10
";
        assert_eq!(format_search_results(&table, &["SNumber", "FwPC", "Missing"]), expected);
        assert_eq!(format_search_results(&RawTable::default(), &[]), "0 matching row(s)\n");
    }
}
