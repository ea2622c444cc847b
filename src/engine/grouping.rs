//! Grouping Key Resolver.
//!
//! Picks the column that identifies the test fixture for a stage. Candidates are
//! tried in priority order; the first one that exists and is not blank on every
//! working row wins. When none qualifies, a constant column is appended to the
//! working copy so the classifier always has exactly one non-degenerate key.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::StageConfig;
use crate::engine::normalize::NormalizedTable;

/// Name of the column synthesized when no fixture column is usable.
pub const SYNTHETIC_FIXTURE_COLUMN: &str = "__total_group__";
/// Group label carried by every row of the synthetic column.
pub const SYNTHETIC_FIXTURE_LABEL: &str = "all";

/// The grouping column actually used for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureColumn {
    pub name: String,
    pub index: usize,
    pub synthetic: bool,
}

/// Resolve (and if needed synthesize) the fixture column, then stamp every
/// record with its fixture value.
///
/// Only the rows still referenced by `table.records` are considered, so a
/// column that is blank inside the filtered range falls back too.
pub fn resolve_fixture_column(table: &mut NormalizedTable, config: &StageConfig) -> FixtureColumn {
    let found = config.fixture_candidates().find_map(|name| {
        let idx = table.column_index(name)?;
        let populated = table
            .records
            .iter()
            .any(|r| !table.cell(r.row, idx).trim().is_empty());
        populated.then(|| (table.headers[idx].clone(), idx))
    });

    let column = match found {
        Some((name, index)) => {
            if name != config.fixture_col {
                debug!(preferred = %config.fixture_col, used = %name, "using fallback fixture column");
            }
            FixtureColumn {
                name,
                index,
                synthetic: false,
            }
        }
        None => {
            warn!(
                column = %config.fixture_col,
                "fixture column missing or blank; grouping all rows as `{SYNTHETIC_FIXTURE_LABEL}`"
            );
            let index = table.push_constant_column(SYNTHETIC_FIXTURE_COLUMN, SYNTHETIC_FIXTURE_LABEL);
            FixtureColumn {
                name: SYNTHETIC_FIXTURE_COLUMN.to_string(),
                index,
                synthetic: true,
            }
        }
    };

    let mut blank = 0usize;
    for i in 0..table.records.len() {
        let row = table.records[i].row;
        let value = table.cell(row, column.index).trim().to_string();
        if value.is_empty() {
            blank += 1;
        }
        table.records[i].fixture = value;
    }
    table.stats.blank_fixture_rows = blank;

    column
}
