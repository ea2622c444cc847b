//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! One column position per day of the date axis. Markers:
//! - `T` total tested
//! - `P` pass
//! - `F` fail
//! - `*` two or more markers on the same cell

use chrono::NaiveDate;

use crate::domain::{ClassificationResult, iso_date};

/// Render daily total/pass/fail counts.
pub fn render_daily_chart(series: &[(NaiveDate, ClassificationResult)], width: usize, height: usize) -> String {
    let (Some((first, _)), Some((last, _))) = (series.first(), series.last()) else {
        return "Plot: no data\n".to_string();
    };

    let width = width.max(10);
    let height = height.max(5);
    let y_max = series.iter().map(|(_, c)| c.total_test.max(c.pass).max(c.fail)).max().unwrap_or(0).max(1);

    let mut grid = vec![vec![' '; width]; height];
    for (i, (_, c)) in series.iter().enumerate() {
        let x = map_x(i, series.len(), width);
        for (value, marker) in [(c.total_test, 'T'), (c.pass, 'P'), (c.fail, 'F')] {
            let y = map_y(value, y_max, height);
            let cell = &mut grid[y][x];
            *cell = if *cell == ' ' { marker } else { '*' };
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: days=[{}, {}] | y=[0, {y_max}]\n",
        iso_date(*first),
        iso_date(*last)
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out.push_str("T=total P=pass F=fail *=overlap\n");

    out
}

fn map_x(i: usize, n: usize, width: usize) -> usize {
    if n < 2 {
        return 0;
    }
    let u = i as f64 / (n as f64 - 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(value: usize, y_max: usize, height: usize) -> usize {
    let u = (value as f64 / y_max as f64).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: usize, pass: usize, fail: usize) -> ClassificationResult {
        ClassificationResult {
            total_test: total,
            pass,
            false_defect: 0,
            true_defect: fail,
            fail,
        }
    }

    #[test]
    fn chart_golden_snapshot_small() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let series = vec![(d(15), counts(2, 2, 0)), (d(16), counts(4, 3, 1))];
        let txt = render_daily_chart(&series, 10, 5);
        let expected = concat!(
            "Plot: days=[2024-01-15, 2024-01-16] | y=[0, 4]\n",
            "         T\n",
            "         P\n",
            "*         \n",
            "         F\n",
            "F         \n",
            "T=total P=pass F=fail *=overlap\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_series_has_no_grid() {
        assert_eq!(render_daily_chart(&[], 80, 20), "Plot: no data\n");
    }

    #[test]
    fn all_zero_day_stays_on_the_bottom_row() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let txt = render_daily_chart(&[(d, ClassificationResult::default())], 10, 5);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[5], "*         ");
        assert!(lines[1..5].iter().all(|l| l.trim().is_empty()));
    }
}
