//! Plotters-powered daily yield chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use chrono::NaiveDate;
use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::domain::ClassificationResult;

/// Render-only chart description; series are built by [`daily_lines`].
pub struct DailyChart<'a> {
    pub lines: &'a DailyLines,
    /// Date axis (index `i` on x is `dates[i]`).
    pub dates: &'a [NaiveDate],
}

/// Total / pass / fail series with x = day index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyLines {
    pub total: Vec<(f64, f64)>,
    pub pass: Vec<(f64, f64)>,
    pub fail: Vec<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

/// Build chart series from a per-day series.
pub fn daily_lines(series: &[(NaiveDate, ClassificationResult)]) -> DailyLines {
    let mut lines = DailyLines::default();
    let mut y_max = 0usize;

    for (i, (_, c)) in series.iter().enumerate() {
        let x = i as f64;
        lines.total.push((x, c.total_test as f64));
        lines.pass.push((x, c.pass as f64));
        lines.fail.push((x, c.fail as f64));
        y_max = y_max.max(c.total_test).max(c.pass).max(c.fail);
    }

    lines.x_bounds = if series.len() < 2 {
        [-0.5, 0.5]
    } else {
        [0.0, (series.len() - 1) as f64]
    };
    // ~10% headroom above the tallest day.
    let y_max = y_max.max(1);
    lines.y_bounds = [0.0, (y_max + y_max.div_ceil(10)) as f64];
    lines
}

fn date_tick(dates: &[NaiveDate], v: f64) -> String {
    let i = v.round();
    if i < 0.0 || (v - i).abs() > 0.25 {
        return String::new();
    }
    dates
        .get(i as usize)
        .map(|d| d.format("%m-%d").to_string())
        .unwrap_or_default()
}

impl<'a> Widget for DailyChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.lines.x_bounds;
        let [y0, y1] = self.lines.y_bounds;
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let dates = self.dates;
        let lines = self.lines;
        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("day")
                .y_desc("count")
                .x_labels(dates.len().clamp(2, 7))
                .y_labels(5)
                .x_label_formatter(&|v| date_tick(dates, *v))
                .y_label_formatter(&|v| format!("{v:.0}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let total_color = RGBColor(0, 255, 255); // cyan
            let pass_color = RGBColor(0, 255, 0); // green
            let fail_color = RGBColor(255, 0, 0); // red

            chart.draw_series(LineSeries::new(lines.total.iter().copied(), &total_color))?;
            chart.draw_series(LineSeries::new(lines.pass.iter().copied(), &pass_color))?;
            chart.draw_series(LineSeries::new(lines.fail.iter().copied(), &fail_color))?;

            // Mark each day so single-day ranges still show something.
            for (series, color) in [(&lines.total, total_color), (&lines.pass, pass_color), (&lines.fail, fail_color)] {
                chart.draw_series(series.iter().map(|&(x, y)| Pixel::new((x, y), color)))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
