//! Synthetic inspection-history generation.
//!
//! Produces a raw table in the same shape as a real export for one stage:
//! several fixtures, several days, units that pass first time, units that
//! fail transiently and pass on retest, and units that never pass.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::debug;

use crate::domain::{RawTable, Stage};
use crate::error::AppError;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub stage: Stage,
    pub seed: u64,
    pub start: NaiveDate,
    pub days: u32,
    pub fixtures: usize,
    pub units_per_day: usize,
    /// Probability that a unit is genuinely defective (never passes).
    pub defect_rate: f64,
    /// Probability that any single attempt of a good unit fails anyway.
    pub transient_rate: f64,
    pub max_retests: usize,
    /// Probability that a flag cell is left blank.
    pub blank_flag_rate: f64,
    /// Write serials as `="..."` and flags as `"O"` like spreadsheet exports do.
    pub quote_artifacts: bool,
    /// Omit the fixture column entirely.
    pub omit_fixture: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            stage: Stage::Fw,
            seed: 42,
            start: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default(),
            days: 7,
            fixtures: 4,
            units_per_day: 40,
            defect_rate: 0.03,
            transient_rate: 0.08,
            max_retests: 2,
            blank_flag_rate: 0.0,
            quote_artifacts: false,
            omit_fixture: false,
        }
    }
}

/// Generate a test history for `config.stage`.
pub fn generate_history(config: &SampleConfig) -> Result<RawTable, AppError> {
    if config.days == 0 || config.fixtures == 0 || config.units_per_day == 0 {
        return Err(AppError::input("Days, fixtures and units per day must be > 0."));
    }
    for (name, p) in [
        ("defect rate", config.defect_rate),
        ("transient rate", config.transient_rate),
        ("blank flag rate", config.blank_flag_rate),
    ] {
        if !(0.0..=1.0).contains(&p) {
            return Err(AppError::input(format!("Invalid {name} {p} (must be within [0, 1]).")));
        }
    }

    let columns = config.stage.default_config();
    let format = columns.timestamp_format.as_deref().unwrap_or(DEFAULT_TIMESTAMP_FORMAT);

    let mut headers = vec![columns.serial_col.clone(), columns.timestamp_col.clone()];
    if !config.omit_fixture {
        headers.push(columns.fixture_col.clone());
    }
    headers.push(columns.pass_flag_col.clone());

    let mut rng = StdRng::seed_from_u64(config.seed);
    // Shifts cluster around early afternoon.
    let time_of_day = Normal::<f64>::new(13.0 * 3600.0, 2.5 * 3600.0)
        .map_err(|e| AppError::runtime(format!("Time-of-day distribution error: {e}")))?;

    let mut attempts: Vec<(NaiveDateTime, Vec<String>)> = Vec::new();
    let mut serial_no = 0usize;

    for day_offset in 0..config.days {
        let day = config.start + Duration::days(i64::from(day_offset));
        let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();

        for _ in 0..config.units_per_day {
            serial_no += 1;
            let serial = format!("SN{serial_no:06}");
            let fixture = format!("PC{:02}", rng.gen_range(1..=config.fixtures));

            let mut flags: Vec<&str> = Vec::new();
            if rng.gen_bool(config.defect_rate) {
                let tries = rng.gen_range(1..=config.max_retests + 1);
                flags.extend(std::iter::repeat_n("X", tries));
            } else {
                while flags.len() < config.max_retests && rng.gen_bool(config.transient_rate) {
                    flags.push("X");
                }
                flags.push("O");
            }

            let mut secs = time_of_day.sample(&mut rng).clamp(0.0, SECONDS_PER_DAY - 1.0);
            for flag in flags {
                let at = midnight + Duration::seconds(secs as i64);
                let flag = if rng.gen_bool(config.blank_flag_rate) { "" } else { flag };

                let mut row = vec![quote_serial(&serial, config.quote_artifacts), at.format(format).to_string()];
                if !config.omit_fixture {
                    row.push(fixture.clone());
                }
                row.push(quote_flag(flag, config.quote_artifacts));
                attempts.push((at, row));

                // Retests stay on the same fixture and the same day.
                secs = (secs + rng.gen_range(60.0..900.0)).min(SECONDS_PER_DAY - 1.0);
            }
        }
    }

    attempts.sort_by_key(|(at, _)| *at);
    debug!(stage = config.stage.key(), units = serial_no, rows = attempts.len(), "generated history");

    Ok(RawTable {
        headers,
        rows: attempts.into_iter().map(|(_, row)| row).collect(),
    })
}

fn quote_serial(serial: &str, quoted: bool) -> String {
    if quoted {
        format!("=\"{serial}\"")
    } else {
        serial.to_string()
    }
}

fn quote_flag(flag: &str, quoted: bool) -> String {
    if quoted && !flag.is_empty() {
        format!("\"{flag}\"")
    } else {
        flag.to_string()
    }
}
