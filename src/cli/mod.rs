//! Command-line parsing for the fixture yield analyzer.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the classification engine.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{CountUnit, Stage};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "fy",
    version,
    about = "Fixture yield: daily pass / false-defect / true-defect counts per test fixture"
)]
pub struct Cli {
    /// Write logs as JSON lines (stderr).
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify a test-history CSV and print per-fixture daily tables.
    Analyze(AnalyzeArgs),
    /// Re-render a summary JSON written by `fy analyze --export-json`.
    Show(ShowArgs),
    /// Find rows by (partial) serial number.
    Search(SearchArgs),
    /// Generate a synthetic test history (write it, or analyze it directly).
    Demo(DemoArgs),
    /// Launch the interactive TUI.
    ///
    /// Uses the same pipeline as `fy analyze`, with one tab per stage.
    Tui(TuiArgs),
}

/// Input file plus the stage's column layout.
#[derive(Debug, Args, Clone)]
pub struct StageArgs {
    /// Test-history CSV (prompted for when omitted on a terminal).
    #[arg(short = 'f', long, env = "FY_FILE")]
    pub file: Option<PathBuf>,

    /// Test stage whose columns are analyzed.
    #[arg(short = 's', long, value_enum, env = "FY_STAGE", default_value_t = Stage::Fw)]
    pub stage: Stage,

    /// JSON file with a full column layout (overrides the stage defaults).
    #[arg(long, value_name = "JSON")]
    pub stage_config: Option<PathBuf>,

    /// Serial number column.
    #[arg(long)]
    pub serial_col: Option<String>,

    /// Timestamp column.
    #[arg(long)]
    pub timestamp_col: Option<String>,

    /// Fixture/PC column.
    #[arg(long)]
    pub fixture_col: Option<String>,

    /// Pass-flag column (`O` / `X`).
    #[arg(long)]
    pub pass_col: Option<String>,

    /// Preferred timestamp format (chrono `strftime` syntax).
    #[arg(long)]
    pub timestamp_format: Option<String>,
}

/// Counting policy.
#[derive(Debug, Args, Clone)]
pub struct PolicyArgs {
    /// Count distinct serial numbers or individual attempts.
    #[arg(long, value_enum, env = "FY_COUNT_UNIT", default_value_t = CountUnit::Serial)]
    pub count_unit: CountUnit,

    /// Count serials/rows with blank or unknown flags in `total_test`.
    #[arg(long, env = "FY_INCLUDE_UNKNOWN")]
    pub include_unknown: bool,
}

/// Pre-analysis filter.
#[derive(Debug, Args, Clone)]
pub struct FilterArgs {
    /// First day to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Only this fixture.
    #[arg(long)]
    pub fixture: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Print drill-down serial lists per fixture.
    #[arg(long)]
    pub details: bool,

    /// Skip the ASCII chart of daily totals.
    #[arg(long)]
    pub no_plot: bool,

    /// Chart width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Chart height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,

    /// Export the report tables to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the summary to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Summary JSON produced by `fy analyze --export-json`.
    #[arg(value_name = "JSON")]
    pub summary: PathBuf,

    /// Only this fixture.
    #[arg(long)]
    pub fixture: Option<String>,

    /// Disable the terminal chart.
    #[arg(long)]
    pub no_plot: bool,

    /// Chart width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Chart height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// Serial number or part of one (case-insensitive).
    pub query: String,

    /// Export matching rows to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Stage layout to generate.
    #[arg(short = 's', long, value_enum, default_value_t = Stage::Fw)]
    pub stage: Stage,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First day (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub start: Option<NaiveDate>,

    /// Number of days.
    #[arg(long, default_value_t = 7)]
    pub days: u32,

    /// Number of fixtures.
    #[arg(long, default_value_t = 4)]
    pub fixtures: usize,

    /// Units tested per day.
    #[arg(long, default_value_t = 40)]
    pub units: usize,

    /// Probability that a unit never passes.
    #[arg(long, default_value_t = 0.03)]
    pub defect_rate: f64,

    /// Probability that an attempt of a good unit fails anyway.
    #[arg(long, default_value_t = 0.08)]
    pub transient_rate: f64,

    /// Probability that a flag cell is blank.
    #[arg(long, default_value_t = 0.0)]
    pub blank_rate: f64,

    /// Add spreadsheet quoting artifacts (`="..."`).
    #[arg(long)]
    pub quoted: bool,

    /// Leave out the fixture column.
    #[arg(long)]
    pub no_fixture: bool,

    /// Write the generated history to this CSV instead of analyzing it.
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}
