//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - initializes logging
//! - resolves the input file and the stage's column layout
//! - runs the analysis pipeline
//! - prints reports/plots and writes optional exports

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeArgs, Command, DemoArgs, FilterArgs, PolicyArgs, SearchArgs, ShowArgs, StageArgs, TuiArgs};
use crate::domain::{AnalysisConfig, ClassifyPolicy, FilterParams, StageConfig};
use crate::error::AppError;

pub mod cache;
pub mod pipeline;

const SUBCOMMANDS: [&str; 5] = ["analyze", "show", "search", "demo", "tui"];

/// Entry point for the `fy` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // `fy` and `fy -f history.csv` behave like `fy tui ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let interactive = matches!(cli.command, Command::Tui(_));
    init_tracing(cli.log_json, interactive);

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Show(args) => handle_show(args),
        Command::Search(args) => handle_search(args),
        Command::Demo(args) => handle_demo(args),
        Command::Tui(args) => handle_tui(args),
    }
}

/// Install the global `tracing` subscriber.
///
/// Filter: `FY_LOG`, then `RUST_LOG`, then `warn`. The TUI owns the terminal,
/// so its logs are discarded.
fn init_tracing(json: bool, interactive: bool) {
    let filter = EnvFilter::try_from_env("FY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    // A subscriber may already be installed (tests); keep the existing one.
    let _ = match (interactive, json) {
        (true, _) => builder.with_writer(std::io::sink).try_init(),
        (false, true) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, false) => builder.with_writer(std::io::stderr).try_init(),
    };
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let csv_path = resolve_csv_path(args.stage.file.as_deref())?;
    let config = analysis_config_from_args(&args, csv_path)?;
    let run = pipeline::run_analysis(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, &run.analysis, config.stage)
    );

    let tables = crate::report::report_tables(&run.analysis.summary, config.filter.fixture.as_deref());
    println!("{}", crate::report::format_report_tables(&tables));

    if config.details {
        for name in run.analysis.summary.fixture_names() {
            println!("{}", crate::report::format_drill_down(&run.analysis, name, None));
        }
    }

    if config.plot {
        let series = crate::report::daily_series(&run.analysis.summary, config.filter.fixture.as_deref());
        println!(
            "{}",
            crate::plot::render_daily_chart(&series, config.plot_width, config.plot_height)
        );
    }

    // Optional exports.
    if let Some(path) = &config.export_csv {
        crate::io::export::write_report_csv(path, &tables)?;
        info!(path = %path.display(), "wrote report CSV");
    }
    if let Some(path) = &config.export_json {
        crate::io::summary_file::write_summary_json(path, config.stage, &run.analysis)?;
        info!(path = %path.display(), "wrote summary JSON");
    }

    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let file = crate::io::summary_file::read_summary_json(&args.summary)?;
    let fixture = args.fixture.as_deref();

    println!(
        "=== fy - Fixture Yield ({}) ===\nGrouped by: {} | generated {}\n",
        file.stage.display_name(),
        file.summary.fixture_column,
        file.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let tables = crate::report::report_tables(&file.summary, fixture);
    println!("{}", crate::report::format_report_tables(&tables));

    if !args.no_plot {
        let series = crate::report::daily_series(&file.summary, fixture);
        println!("{}", crate::plot::render_daily_chart(&series, args.width, args.height));
    }
    Ok(())
}

fn handle_search(args: SearchArgs) -> Result<(), AppError> {
    let csv_path = resolve_csv_path(args.stage.file.as_deref())?;
    let columns = stage_config_from_args(&args.stage)?;

    let source = crate::io::ingest::CsvSource::new(csv_path, &[columns.serial_col.as_str()]);
    let ingest = crate::io::ingest::RowSource::load(&source)?;
    let hits = crate::engine::search_serial(&ingest.table, &columns.serial_col, &args.query)?;

    let shown = [
        columns.serial_col.as_str(),
        columns.timestamp_col.as_str(),
        columns.fixture_col.as_str(),
        columns.pass_flag_col.as_str(),
    ];
    println!("{}", crate::report::format_search_results(&hits, &shown));

    if let Some(path) = &args.export {
        crate::io::export::write_table_csv(path, &hits)?;
        info!(path = %path.display(), rows = hits.rows.len(), "wrote search results");
    }
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let defaults = crate::data::SampleConfig::default();
    let sample = crate::data::SampleConfig {
        stage: args.stage,
        seed: args.seed,
        start: args.start.unwrap_or(defaults.start),
        days: args.days,
        fixtures: args.fixtures,
        units_per_day: args.units,
        defect_rate: args.defect_rate,
        transient_rate: args.transient_rate,
        max_retests: defaults.max_retests,
        blank_flag_rate: args.blank_rate,
        quote_artifacts: args.quoted,
        omit_fixture: args.no_fixture,
    };
    let table = crate::data::generate_history(&sample)?;

    if let Some(path) = &args.out {
        crate::io::export::write_table_csv(path, &table)?;
        println!("Wrote {} rows to {}", table.rows.len(), path.display());
        return Ok(());
    }

    let config = AnalysisConfig {
        csv_path: PathBuf::from("demo"),
        stage: args.stage,
        columns: args.stage.default_config(),
        policy: policy_from_args(&args.policy),
        filter: FilterParams::default(),
        details: false,
        plot: true,
        plot_width: 80,
        plot_height: 16,
        export_csv: None,
        export_json: None,
    };
    let ingest = crate::io::ingest::IngestedTable::from_table(format!("demo (seed {})", args.seed), table);
    let run = pipeline::run_analysis_with_table(&config, ingest)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, &run.analysis, config.stage)
    );
    let tables = crate::report::report_tables(&run.analysis.summary, None);
    println!("{}", crate::report::format_report_tables(&tables));
    let series = crate::report::daily_series(&run.analysis.summary, None);
    println!("{}", crate::plot::render_daily_chart(&series, config.plot_width, config.plot_height));
    Ok(())
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    let csv_path = resolve_csv_path(args.stage.file.as_deref())?;
    crate::tui::run(&args, csv_path)
}

/// Resolve the input CSV: explicit path, or the interactive picker on a terminal.
fn resolve_csv_path(file: Option<&Path>) -> Result<PathBuf, AppError> {
    match file {
        Some(path) => crate::cli::picker::validate_csv_path(path),
        None if std::io::stdin().is_terminal() => crate::cli::picker::prompt_for_csv_path(),
        None => Err(AppError::input("No input file. Pass `--file <history.csv>` or set FY_FILE.")),
    }
}

/// Column layout for the selected stage with file and flag overrides applied.
pub fn stage_config_from_args(args: &StageArgs) -> Result<StageConfig, AppError> {
    let mut config = match &args.stage_config {
        Some(path) => crate::io::summary_file::read_stage_config(path)?,
        None => args.stage.default_config(),
    };

    if let Some(v) = &args.serial_col {
        config.serial_col = v.clone();
    }
    if let Some(v) = &args.timestamp_col {
        config.timestamp_col = v.clone();
    }
    if let Some(v) = &args.fixture_col {
        config.fixture_col = v.clone();
        config.fixture_fallbacks.clear();
    }
    if let Some(v) = &args.pass_col {
        config.pass_flag_col = v.clone();
    }
    if let Some(v) = &args.timestamp_format {
        config.timestamp_format = Some(v.clone());
    }

    if config.required_columns().iter().any(|c| c.trim().is_empty()) || config.fixture_col.trim().is_empty() {
        return Err(AppError::input("Column names must not be empty."));
    }
    Ok(config)
}

pub fn policy_from_args(args: &PolicyArgs) -> ClassifyPolicy {
    ClassifyPolicy {
        count_unit: args.count_unit,
        include_unknown_in_total: args.include_unknown,
    }
}

pub fn filter_from_args(args: &FilterArgs) -> Result<FilterParams, AppError> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        if from > to {
            return Err(AppError::input(format!("--from {from} is after --to {to}.")));
        }
    }
    Ok(FilterParams {
        start: args.from,
        end: args.to,
        fixture: args.fixture.as_deref().map(str::trim).filter(|f| !f.is_empty()).map(str::to_string),
    })
}

pub fn analysis_config_from_args(args: &AnalyzeArgs, csv_path: PathBuf) -> Result<AnalysisConfig, AppError> {
    Ok(AnalysisConfig {
        csv_path,
        stage: args.stage.stage,
        columns: stage_config_from_args(&args.stage)?,
        policy: policy_from_args(&args.policy),
        filter: filter_from_args(&args.filter)?,
        details: args.details,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_csv: args.export.clone(),
        export_json: args.export_json.clone(),
    })
}

/// Rewrite argv so `fy` defaults to `fy tui`.
///
/// Rules:
/// - `fy`                       -> `fy tui`
/// - `fy -f history.csv ...`    -> `fy tui -f history.csv ...`
/// - `fy --help/--version/-h`   -> unchanged (show top-level help/version)
/// - any argv naming a subcommand is left alone (`fy --log-json analyze ...`)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    if matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help") {
        return argv;
    }

    if argv.iter().skip(1).any(|a| SUBCOMMANDS.contains(&a.as_str())) {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
    }
    argv
}
