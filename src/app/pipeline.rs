//! Shared "analysis pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load rows -> normalize -> resolve fixture -> classify -> assemble
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use tracing::{info, warn};

use crate::domain::AnalysisConfig;
use crate::engine::{Analysis, analyze};
use crate::error::AppError;
use crate::io::ingest::{CsvSource, IngestedTable, RowSource};

/// All computed outputs of a single `fy analyze` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedTable,
    pub analysis: Analysis,
}

/// Load `config.csv_path` and run the engine over it.
pub fn run_analysis(config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let source = CsvSource::new(config.csv_path.clone(), &config.columns.required_columns());
    run_analysis_from(&source, config)
}

/// Run the pipeline over any row source.
pub fn run_analysis_from(source: &dyn RowSource, config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let ingest = source.load()?;
    info!(
        source = %ingest.source,
        rows = ingest.table.rows.len(),
        preamble = ingest.preamble_rows,
        "loaded rows"
    );
    for e in ingest.row_errors.iter().take(5) {
        warn!(line = e.line, "{}", e.message);
    }

    run_analysis_with_table(config, ingest)
}

/// Run the engine over an already loaded table.
///
/// This is useful for the TUI where the file is read once and re-analyzed per
/// stage and filter.
pub fn run_analysis_with_table(config: &AnalysisConfig, ingest: IngestedTable) -> Result<RunOutput, AppError> {
    let analysis = analyze(&ingest.table, &config.columns, config.policy, &config.filter)?;
    Ok(RunOutput { ingest, analysis })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::data::{SampleConfig, generate_history};
    use crate::domain::{ClassifyPolicy, FilterParams, Stage};

    fn config(stage: Stage) -> AnalysisConfig {
        AnalysisConfig {
            csv_path: PathBuf::from("unused.csv"),
            stage,
            columns: stage.default_config(),
            policy: ClassifyPolicy::default(),
            filter: FilterParams::default(),
            details: false,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_csv: None,
            export_json: None,
        }
    }

    #[test]
    fn in_memory_source_runs_end_to_end() {
        let table = generate_history(&SampleConfig {
            stage: Stage::Rftx,
            ..SampleConfig::default()
        })
        .unwrap();
        let run = run_analysis_from(&table, &config(Stage::Rftx)).unwrap();
        assert_eq!(run.ingest.preamble_rows, 0);
        assert_eq!(run.analysis.summary.fixture_column, "RfTxPC");
        assert!(!run.analysis.summary.is_empty());
    }

    #[test]
    fn wrong_stage_reports_missing_columns() {
        let table = generate_history(&SampleConfig::default()).unwrap();
        let err = run_analysis_from(&table, &config(Stage::Pcb)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("`PcbStartTime`"));
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let mut cfg = config(Stage::Fw);
        cfg.csv_path = PathBuf::from("/definitely/not/here.csv");
        assert_eq!(run_analysis(&cfg).unwrap_err().exit_code(), 2);
    }
}
