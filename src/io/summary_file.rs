//! Read/write summary JSON files.
//!
//! A summary file is the portable representation of one run:
//! - stage, column layout and counting policy
//! - filter and row diagnostics
//! - the nested fixture → date → counts summary
//!
//! `fy show` re-renders report tables and the chart from it without the
//! source data.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{ClassifyPolicy, FilterParams, Stage, StageConfig, Summary};
use crate::engine::{Analysis, NormalizeStats};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFile {
    pub tool: String,
    pub stage: Stage,
    pub generated_at: NaiveDateTime,
    pub columns: StageConfig,
    pub policy: ClassifyPolicy,
    pub filter: FilterParams,
    pub stats: NormalizeStats,
    pub summary: Summary,
}

impl SummaryFile {
    pub fn from_analysis(stage: Stage, analysis: &Analysis) -> Self {
        Self {
            tool: "fy".to_string(),
            stage,
            generated_at: chrono::Local::now().naive_local(),
            columns: analysis.stage_config.clone(),
            policy: analysis.policy,
            filter: analysis.filter.clone(),
            stats: *analysis.stats(),
            summary: analysis.summary.clone(),
        }
    }
}

/// Write a summary JSON file.
pub fn write_summary_json(path: &Path, stage: Stage, analysis: &Analysis) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create summary JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &SummaryFile::from_analysis(stage, analysis))
        .map_err(|e| AppError::runtime(format!("Failed to write summary JSON: {e}")))?;

    Ok(())
}

/// Read a summary JSON file.
pub fn read_summary_json(path: &Path) -> Result<SummaryFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    let summary: SummaryFile =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid summary JSON: {e}")))?;
    Ok(summary)
}

/// Load a `StageConfig` override (`--stage-config`).
pub fn read_stage_config(path: &Path) -> Result<StageConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open stage config '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid stage config JSON: {e}")))
}
