//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - stage/column configuration (`Stage`, `StageConfig`)
//! - normalized cell values (`PassFlag`, `Timestamp`)
//! - classification policy and outputs (`ClassifyPolicy`, `ClassificationResult`, `Summary`)

pub mod types;

pub use types::*;
