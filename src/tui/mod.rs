//! Ratatui-based terminal UI.
//!
//! The TUI loads the history file once, then lets the user flip between
//! stages, fixtures, date ranges and counting policies. Each combination is
//! analyzed once and kept in an [`AnalysisCache`].

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table},
};
use tracing::{debug, info};

use crate::app::cache::{AnalysisCache, CacheKey};
use crate::cli::TuiArgs;
use crate::domain::{ClassifyPolicy, CountUnit, FilterParams, OutcomeBucket, Stage, StageConfig};
use crate::engine::Analysis;
use crate::error::{AppError, EXIT_RUNTIME};
use crate::io::ingest::{CsvSource, IngestedTable, RowSource};

mod daily_chart;

use daily_chart::{DailyChart, daily_lines};

/// Start the TUI on `csv_path`.
pub fn run(args: &TuiArgs, csv_path: PathBuf) -> Result<(), AppError> {
    let base_config = crate::app::stage_config_from_args(&args.stage)?;
    let source = CsvSource::new(csv_path, &[base_config.serial_col.as_str()]);
    let ingest = source.load()?;

    let mut app = App::new(
        ingest,
        args.stage.stage,
        base_config,
        crate::app::policy_from_args(&args.policy),
        crate::app::filter_from_args(&args.filter)?,
    );

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::new(EXIT_RUNTIME, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(EXIT_RUNTIME, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(EXIT_RUNTIME, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateField {
    Start,
    End,
}

struct App {
    ingest: IngestedTable,
    /// Stage whose columns may carry command-line overrides.
    base_stage: Stage,
    base_config: StageConfig,
    stage: Stage,
    policy: ClassifyPolicy,
    filter: FilterParams,
    cache: AnalysisCache,
    selected_fixture: usize,
    bucket: OutcomeBucket,
    show_details: bool,
    editing: Option<DateField>,
    date_input: String,
    status: String,
    /// Error of the current combination (e.g. missing columns for this stage).
    error: Option<String>,
}

impl App {
    fn new(
        ingest: IngestedTable,
        stage: Stage,
        base_config: StageConfig,
        policy: ClassifyPolicy,
        filter: FilterParams,
    ) -> Self {
        let mut app = Self {
            ingest,
            base_stage: stage,
            base_config,
            stage,
            policy,
            filter,
            cache: AnalysisCache::new(),
            selected_fixture: 0,
            bucket: OutcomeBucket::Pass,
            show_details: false,
            editing: None,
            date_input: String::new(),
            status: String::new(),
            error: None,
        };
        app.refresh();
        app
    }

    fn key(&self) -> CacheKey {
        CacheKey {
            stage: self.stage,
            filter: self.filter.clone(),
            policy: self.policy,
        }
    }

    fn stage_config(&self) -> StageConfig {
        if self.stage == self.base_stage {
            self.base_config.clone()
        } else {
            self.stage.default_config()
        }
    }

    /// Analyze the current combination (cached) and update the status line.
    fn refresh(&mut self) {
        let key = self.key();
        let config = self.stage_config();
        let table = &self.ingest.table;
        let (policy, filter) = (self.policy, self.filter.clone());

        match self
            .cache
            .get_or_compute(key, || crate::engine::analyze(table, &config, policy, &filter))
        {
            Ok(analysis) => {
                let fixtures = analysis.summary.fixtures.len();
                let days = analysis.summary.dates.len();
                debug!(entries = self.cache.len(), hits = self.cache.hits(), "analysis cache");
                self.error = None;
                self.status = format!("{}: {fixtures} fixture(s), {days} day(s)", self.stage.display_name());
                if self.selected_fixture >= fixtures {
                    self.selected_fixture = fixtures.saturating_sub(1);
                }
            }
            Err(err) => {
                self.status = err.message().to_string();
                self.error = Some(err.message().to_string());
            }
        }
    }

    fn analysis(&self) -> Option<&Analysis> {
        self.cache.get(&self.key())
    }

    fn selected_fixture_name(&self) -> Option<String> {
        self.analysis()?
            .summary
            .fixture_names()
            .nth(self.selected_fixture)
            .map(str::to_string)
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(EXIT_RUNTIME, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(EXIT_RUNTIME, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        if self.editing.is_some() {
            self.handle_date_edit(code);
            return false;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => {
                self.stage = self.stage.next();
                self.refresh();
            }
            KeyCode::BackTab => {
                self.stage = self.stage.prev();
                self.refresh();
            }
            KeyCode::Up => {
                self.selected_fixture = self.selected_fixture.saturating_sub(1);
            }
            KeyCode::Down => {
                let n = self.analysis().map_or(0, |a| a.summary.fixtures.len());
                if self.selected_fixture + 1 < n {
                    self.selected_fixture += 1;
                }
            }
            KeyCode::Char('b') => {
                self.bucket = self.bucket.next();
                self.show_details = true;
            }
            KeyCode::Char('d') => self.show_details = !self.show_details,
            KeyCode::Char('s') => self.start_edit(DateField::Start),
            KeyCode::Char('e') => self.start_edit(DateField::End),
            KeyCode::Char('c') => {
                self.filter = FilterParams::default();
                self.refresh();
            }
            KeyCode::Char('u') => {
                self.policy.count_unit = match self.policy.count_unit {
                    CountUnit::Serial => CountUnit::Attempt,
                    CountUnit::Attempt => CountUnit::Serial,
                };
                self.refresh();
            }
            KeyCode::Char('i') => {
                self.policy.include_unknown_in_total = !self.policy.include_unknown_in_total;
                self.refresh();
            }
            KeyCode::Char('x') => self.export(),
            _ => {}
        }
        false
    }

    fn start_edit(&mut self, field: DateField) {
        let current = match field {
            DateField::Start => self.filter.start,
            DateField::End => self.filter.end,
        };
        self.date_input = current.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        self.editing = Some(field);
        self.status = "Editing date (YYYY-MM-DD, empty clears). Enter to apply, Esc to cancel.".to_string();
    }

    fn handle_date_edit(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.editing = None;
                self.status = "Date edit canceled.".to_string();
            }
            KeyCode::Enter => self.apply_date_input(),
            KeyCode::Backspace => {
                self.date_input.pop();
            }
            KeyCode::Char(c) => {
                if c.is_ascii_digit() || c == '-' {
                    self.date_input.push(c);
                }
            }
            _ => {}
        }
    }

    fn apply_date_input(&mut self) {
        let Some(field) = self.editing.take() else {
            return;
        };
        let trimmed = self.date_input.trim();
        let value = if trimmed.is_empty() {
            None
        } else {
            match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(e) => {
                    self.status = format!("Invalid date '{trimmed}': {e}");
                    return;
                }
            }
        };

        let mut next = self.filter.clone();
        match field {
            DateField::Start => next.start = value,
            DateField::End => next.end = value,
        }
        if let (Some(s), Some(e)) = (next.start, next.end) {
            if s > e {
                self.status = format!("Start {s} is after end {e}.");
                return;
            }
        }
        self.filter = next;
        self.refresh();
    }

    fn export(&mut self) {
        let Some(analysis) = self.analysis() else {
            self.status = "Nothing to export.".to_string();
            return;
        };
        let tables = crate::report::report_tables(&analysis.summary, None);
        let path = export_path(self.stage);
        self.status = match crate::io::export::write_report_csv(&path, &tables) {
            Ok(()) => {
                info!(path = %path.display(), "wrote report CSV");
                format!("Wrote {}", path.display())
            }
            Err(err) => format!("Export failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let tabs: Vec<Span> = Stage::ALL
            .iter()
            .flat_map(|s| {
                let style = if *s == self.stage {
                    Style::default().fg(Color::Black).bg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Gray)
                };
                [Span::styled(format!(" {} ", s.display_name()), style), Span::raw(" ")]
            })
            .collect();

        let range = match (self.filter.start, self.filter.end) {
            (None, None) => "all days".to_string(),
            (s, e) => format!(
                "{} .. {}",
                s.map(|d| d.to_string()).unwrap_or_default(),
                e.map(|d| d.to_string()).unwrap_or_default()
            ),
        };
        let unit = match self.policy.count_unit {
            CountUnit::Serial => "serial",
            CountUnit::Attempt => "attempt",
        };
        let grouped = self
            .analysis()
            .map(|a| a.summary.fixture_column.clone())
            .unwrap_or_else(|| "-".to_string());

        let lines = vec![
            Line::from(tabs),
            Line::from(Span::styled(
                format!(
                    "{} | range: {range} | unit: {unit} | unknown in total: {} | grouped by: {grouped}",
                    self.ingest.source,
                    if self.policy.include_unknown_in_total { "yes" } else { "no" },
                ),
                Style::default().fg(Color::Gray),
            )),
        ];
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(analysis) = self.analysis() else {
            let msg = self.error.clone().unwrap_or_else(|| "No analysis.".to_string());
            let p = Paragraph::new(msg)
                .style(Style::default().fg(Color::Red))
                .block(Block::default().title("Error").borders(Borders::ALL));
            frame.render_widget(p, area);
            return;
        };

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(20), Constraint::Min(0)])
            .split(area);
        self.draw_fixtures(frame, columns[0], analysis);

        let Some(fixture) = self.selected_fixture_name() else {
            let p = Paragraph::new("No rows in range.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(p, columns[1]);
            return;
        };

        let mut constraints = vec![Constraint::Length(9), Constraint::Min(8)];
        if self.show_details {
            constraints.push(Constraint::Length(10));
        }
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(columns[1]);

        self.draw_table(frame, right[0], analysis, &fixture);
        self.draw_chart(frame, right[1], analysis, &fixture);
        if self.show_details {
            self.draw_details(frame, right[2], analysis, &fixture);
        }
    }

    fn draw_fixtures(&self, frame: &mut ratatui::Frame<'_>, area: Rect, analysis: &Analysis) {
        let items: Vec<ListItem> = analysis.summary.fixture_names().map(ListItem::new).collect();
        let list = List::new(items)
            .block(Block::default().title("Fixtures").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected_fixture));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_table(&self, frame: &mut ratatui::Frame<'_>, area: Rect, analysis: &Analysis, fixture: &str) {
        let Some(report) = crate::report::report_tables(&analysis.summary, Some(fixture)).into_iter().next() else {
            return;
        };

        let mut header = vec![Cell::from("metric")];
        header.extend(report.dates.iter().map(|d| Cell::from(crate::report::date_label(*d))));
        header.push(Cell::from("total"));

        let totals = report.totals().metrics();
        let mut rows: Vec<Row> = crate::report::METRIC_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let mut cells = vec![Cell::from(*label)];
                cells.extend(
                    report
                        .metric_row(i)
                        .into_iter()
                        .map(|v| Cell::from(v.map_or_else(|| "N/A".to_string(), |n| n.to_string()))),
                );
                cells.push(Cell::from(totals.get(i).map_or_else(String::new, |n| n.to_string())));
                Row::new(cells)
            })
            .collect();

        let mut rate = vec![Cell::from("pass_rate")];
        rate.extend(
            report
                .pass_rate_row()
                .into_iter()
                .map(|v| Cell::from(v.map_or_else(|| "N/A".to_string(), crate::report::fmt_rate))),
        );
        rate.push(Cell::from(crate::report::fmt_rate(report.totals().pass_rate())));
        rows.push(Row::new(rate).style(Style::default().add_modifier(Modifier::BOLD)));

        let mut widths = vec![Constraint::Length(13)];
        widths.extend(std::iter::repeat_n(Constraint::Length(7), report.dates.len() + 1));

        let table = Table::new(rows, widths)
            .header(Row::new(header).style(Style::default().fg(Color::Cyan)))
            .block(Block::default().title(format!("Daily yield: {fixture}")).borders(Borders::ALL));
        frame.render_widget(table, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, analysis: &Analysis, fixture: &str) {
        let block = Block::default()
            .title("Total (cyan) / Pass (green) / Fail (red)")
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let series = crate::report::daily_series(&analysis.summary, Some(fixture));
        let dates: Vec<NaiveDate> = series.iter().map(|(d, _)| *d).collect();
        let lines = daily_lines(&series);
        frame.render_widget(DailyChart { lines: &lines, dates: &dates }, inner);
    }

    fn draw_details(&self, frame: &mut ratatui::Frame<'_>, area: Rect, analysis: &Analysis, fixture: &str) {
        let rows = analysis.bucket_rows(fixture, self.bucket, None);
        let items: Vec<ListItem> = rows
            .iter()
            .map(|r| ListItem::new(crate::report::detail_line(r)))
            .collect();
        let title = format!("{} ({}) - b: next bucket", self.bucket.label(), rows.len());
        let list = List::new(items).block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(list, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = match self.editing {
            Some(DateField::Start) => format!("start: {}_", self.date_input),
            Some(DateField::End) => format!("end: {}_", self.date_input),
            None => "Tab stage  ↑/↓ fixture  s/e dates  c clear  u unit  i unknown  d/b details  x export  q quit"
                .to_string(),
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn export_path(stage: Stage) -> PathBuf {
    Path::new(".").join(format!("fy_{}_report.csv", stage.key()))
}
