//! `fixture-yield` library crate.
//!
//! The binary (`fy`) is a thin wrapper around this library so that:
//!
//! - the classification engine is testable without spawning processes
//! - the CLI and the TUI share one analysis pipeline
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod io;
pub mod plot;
pub mod report;
pub mod tui;
