//! Input/output helpers.
//!
//! - CSV ingest with header detection (`ingest`)
//! - report/row exports to CSV (`export`)
//! - summary JSON read/write (`summary_file`)

pub mod export;
pub mod ingest;
pub mod summary_file;

pub use export::*;
pub use ingest::*;
pub use summary_file::*;
