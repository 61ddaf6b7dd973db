//! Ratatui-based terminal UI.
//!
//! Runs the same study pipeline as `halts run` and renders the marginal-effect
//! and calibration views side by side. `r` reseeds the generator, `←/→` change
//! the sample size; every change re-runs the pipeline synchronously.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};
use tracing::warn;

use crate::app::pipeline::{RunOutput, run_study};
use crate::cli::StudyArgs;
use crate::domain::StudyConfig;
use crate::error::AppError;

mod plotters_chart;

use plotters_chart::{ChartLine, CountChart};

/// Sample-size change per `←/→` press.
const SAMPLE_STEP: usize = 100;

/// Smallest sample size reachable from the keyboard.
const MIN_SAMPLE: usize = 50;

/// Start the TUI.
pub fn run(args: StudyArgs) -> Result<(), AppError> {
    let mut app = App::new(args.to_config());

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
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

struct App {
    config: StudyConfig,
    status: String,
    run: Option<RunOutput>,
}

impl App {
    fn new(config: StudyConfig) -> Self {
        let mut app = Self {
            config,
            status: String::new(),
            run: None,
        };
        app.rerun();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100)).map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
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

    /// Apply a key press; returns `true` when the UI should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('r') => {
                self.config.seed = self.config.seed.wrapping_add(1);
                self.rerun();
            }
            KeyCode::Left => {
                self.config.sample_count = self.config.sample_count.saturating_sub(SAMPLE_STEP).max(MIN_SAMPLE);
                self.rerun();
            }
            KeyCode::Right => {
                self.config.sample_count = self.config.sample_count.saturating_add(SAMPLE_STEP);
                self.rerun();
            }
            _ => {}
        }
        false
    }

    /// Re-run the pipeline; failures are shown in the status line, not fatal.
    fn rerun(&mut self) {
        match run_study(&self.config) {
            Ok(run) => {
                self.status = format!(
                    "n={} seed={} -> {}",
                    self.config.sample_count,
                    self.config.seed,
                    run.selection.kind()
                );
                self.run = Some(run);
            }
            Err(err) => {
                warn!(error = %err, "study run failed");
                self.status = format!("Run failed: {err}");
                self.run = None;
            }
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("halts", Style::default().fg(Color::Cyan)),
            Span::raw(" | Poisson vs Negative Binomial count GLMs"),
        ]));

        if let Some(run) = &self.run {
            let r = &run.report;
            let theta = run
                .fits
                .negative_binomial
                .theta()
                .map_or_else(|| "-".to_string(), |t| format!("{t:.2}"));
            lines.push(Line::from(Span::styled(
                format!(
                    "n={} seed={} | dispersion={:.2} | AIC P={:.2} NB={:.2} delta={:.2} | theta={theta}",
                    r.sample_count, r.seed, r.dispersion.ratio, r.aic_poisson, r.aic_negbin, r.aic_delta,
                ),
                Style::default().fg(Color::Gray),
            )));
            lines.push(Line::from(Span::styled(
                format!(
                    "selected: {} | stress (vol {:.2}, volume {:.2}) -> {:.2} [{:.2}, {:.2}]",
                    r.selected.display_name(),
                    r.stress.covariates.volatility,
                    r.stress.covariates.volume,
                    r.stress.predicted,
                    r.stress.lower,
                    r.stress.upper,
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let Some(run) = &self.run else {
            let msg = Paragraph::new("No results (see status line).")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(msg, area);
            return;
        };

        let effect = effect_series(run);
        draw_chart(
            frame,
            chunks[0],
            "Marginal effect of volatility",
            &effect,
            vec![
                ChartLine {
                    data: &effect.lines[0],
                    color: RGBColor(0, 255, 255),
                },
                ChartLine {
                    data: &effect.lines[1],
                    color: RGBColor(128, 128, 128),
                },
                ChartLine {
                    data: &effect.lines[2],
                    color: RGBColor(128, 128, 128),
                },
            ],
            ("volatility", "halts"),
        );

        let cal = calibration_series(run);
        draw_chart(
            frame,
            chunks[1],
            "Calibration (observed vs predicted)",
            &cal,
            vec![ChartLine {
                data: &cal.lines[0],
                color: RGBColor(255, 0, 0),
            }],
            ("predicted", "observed"),
        );
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "r reseed  ←/→ sample size  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Series and bounds for one chart.
#[derive(Debug, Clone, PartialEq)]
struct ChartData {
    lines: Vec<Vec<(f64, f64)>>,
    points: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

/// Curve, lower and upper band over the observations.
fn effect_series(run: &RunOutput) -> ChartData {
    let view = &run.marginal_effect;
    let curve: Vec<(f64, f64)> = view.points.iter().map(|p| (p.volatility, p.predicted)).collect();
    let lower: Vec<(f64, f64)> = view.points.iter().map(|p| (p.volatility, p.lower)).collect();
    let upper: Vec<(f64, f64)> = view.points.iter().map(|p| (p.volatility, p.upper)).collect();
    let points: Vec<(f64, f64)> = run
        .dataset
        .rows()
        .iter()
        .map(|r| (r.volatility, r.trading_halts as f64))
        .collect();

    let x_bounds = bounds(curve.iter().chain(&points).map(|&(x, _)| x), [0.0, 1.0]);
    let y_max = bounds(upper.iter().chain(&points).map(|&(_, y)| y), [0.0, 1.0])[1];
    let y_bounds = padded([0.0, y_max]);

    ChartData {
        lines: vec![curve, lower, upper],
        points,
        x_bounds,
        y_bounds,
    }
}

/// Identity line under the `(predicted, observed)` pairs, equal axes.
fn calibration_series(run: &RunOutput) -> ChartData {
    let points: Vec<(f64, f64)> = run.calibration.iter().map(|c| (c.predicted, c.observed)).collect();
    let [lo, hi] = padded(bounds(points.iter().flat_map(|&(x, y)| [x, y]), [0.0, 1.0]));
    ChartData {
        lines: vec![vec![(lo, lo), (hi, hi)]],
        points,
        x_bounds: [lo, hi],
        y_bounds: [lo, hi],
    }
}

/// `[min, max]` of the finite values, or `fallback` when the range is empty.
fn bounds(values: impl Iterator<Item = f64>, fallback: [f64; 2]) -> [f64; 2] {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() && hi.is_finite() && hi > lo {
        [lo, hi]
    } else {
        fallback
    }
}

fn padded([lo, hi]: [f64; 2]) -> [f64; 2] {
    let pad = ((hi - lo).abs() * 0.05).max(1e-12);
    [lo - pad, hi + pad]
}

fn draw_chart(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    data: &ChartData,
    lines: Vec<ChartLine<'_>>,
    (x_label, y_label): (&str, &str),
) {
    let block = Block::default().title(title.to_string()).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Clear, inner);

    let (chart_rect, insets) = chart_layout(inner);
    let widget = CountChart {
        lines,
        points: &data.points,
        x_bounds: data.x_bounds,
        y_bounds: data.y_bounds,
        x_label,
        y_label,
        fmt_x: fmt_axis,
        fmt_y: fmt_axis,
    };
    frame.render_widget(widget, chart_rect);
    if let Some(insets) = insets {
        draw_axis_ticks(frame, inner, chart_rect, insets, data, (x_label, y_label));
    }
}

fn fmt_axis(v: f64) -> String {
    format!("{v:.1}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    data: &ChartData,
    (x_label, y_label): (&str, &str),
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = data.x_bounds;
    let [y0, y1] = data.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = format!("{:.1}", x0 + u * (x1 - x0));
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        let width = label.len() as u16;
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = format!("{:.1}", y0 + u * (y1 - y0));
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        let width = label.len() as u16;
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width,
                height: 1,
            },
        );
    }

    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(
            Paragraph::new(x_label.to_string())
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Gray)),
            x_rect,
        );
    }

    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(y_label.to_string()).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        y_rect,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_app() -> App {
        App::new(StudyConfig {
            sample_count: 400,
            seed: 2025,
            plot: false,
            ..StudyConfig::default()
        })
    }

    #[test]
    fn keys_change_seed_and_sample_size() {
        let mut app = small_app();
        assert!(!app.handle_key(KeyCode::Char('r')));
        assert_eq!(app.config.seed, 2026);

        assert!(!app.handle_key(KeyCode::Right));
        assert_eq!(app.config.sample_count, 500);

        for _ in 0..10 {
            app.handle_key(KeyCode::Left);
        }
        assert_eq!(app.config.sample_count, MIN_SAMPLE);

        assert!(app.handle_key(KeyCode::Char('q')));
    }

    #[test]
    fn chart_series_cover_the_views() {
        let app = small_app();
        let run = app.run.as_ref().unwrap();

        let effect = effect_series(run);
        assert_eq!(effect.lines.len(), 3);
        assert_eq!(effect.lines[0].len(), run.marginal_effect.points.len());
        assert_eq!(effect.points.len(), 400);
        assert!(effect.y_bounds[0] < 0.0 && effect.y_bounds[1] > 0.0);

        let cal = calibration_series(run);
        assert_eq!(cal.points.len(), 400);
        assert_eq!(cal.x_bounds, cal.y_bounds);
        assert_eq!(cal.lines[0], vec![(cal.x_bounds[0], cal.x_bounds[0]), (cal.x_bounds[1], cal.x_bounds[1])]);
    }

    #[test]
    fn bounds_fall_back_on_degenerate_input() {
        assert_eq!(bounds(std::iter::empty(), [0.0, 1.0]), [0.0, 1.0]);
        assert_eq!(bounds([2.0, 2.0].into_iter(), [0.0, 1.0]), [0.0, 1.0]);
        assert_eq!(bounds([3.0, f64::NAN, 1.0].into_iter(), [0.0, 1.0]), [1.0, 3.0]);
    }
}
