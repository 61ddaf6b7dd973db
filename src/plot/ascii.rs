//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Two panels are rendered side by side:
//! - A (marginal effect): observed rows `o`, fitted curve `-`, 95% band `.`
//! - B (calibration): `(predicted, observed)` points `o` over the identity `/`

use crate::domain::Dataset;
use crate::plot::series::{CalibrationPoint, MarginalEffectView};

const PANEL_GAP: &str = " | ";

/// A rendered panel: one title line plus `height` rows of `width` chars.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub rows: Vec<String>,
}

/// Render both study panels side by side.
///
/// `width` and `height` are per panel.
pub fn render_study_panels(
    dataset: &Dataset,
    view: &MarginalEffectView,
    calibration: &[CalibrationPoint],
    width: usize,
    height: usize,
) -> String {
    let a = marginal_effect_panel(dataset, view, width, height);
    let b = calibration_panel(calibration, width, height);
    let mut out = join_side_by_side(&a, &b);
    out.push_str(&format!(
        "A: o observed  - fitted  . 95% CI (volume = {:.2}){PANEL_GAP}B: o rows  / predicted = observed\n",
        view.volume_held
    ));
    out
}

/// Panel A: observed halts and the fitted mean across volatility.
pub fn marginal_effect_panel(dataset: &Dataset, view: &MarginalEffectView, width: usize, height: usize) -> Panel {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = view
        .points
        .first()
        .zip(view.points.last())
        .map(|(a, b)| (a.volatility, b.volatility))
        .filter(|(a, b)| b > a)
        .unwrap_or((0.0, 1.0));

    let y_max = dataset
        .rows()
        .iter()
        .map(|r| r.trading_halts as f64)
        .chain(view.points.iter().map(|p| p.upper))
        .fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = if y_max.is_finite() && y_max > 0.0 {
        pad_range(0.0, y_max, 0.05)
    } else {
        (0.0, 1.0)
    };

    let mut grid = vec![vec![' '; width]; height];
    let canvas = Canvas {
        x_min,
        x_max,
        y_min,
        y_max,
    };

    // Fitted curve first, then the band into remaining blanks; points overlay.
    let curve: Vec<(f64, f64)> = view.points.iter().map(|p| (p.volatility, p.predicted)).collect();
    let lower: Vec<(f64, f64)> = view.points.iter().map(|p| (p.volatility, p.lower)).collect();
    let upper: Vec<(f64, f64)> = view.points.iter().map(|p| (p.volatility, p.upper)).collect();
    canvas.draw_curve(&mut grid, &curve, '-');
    canvas.draw_curve(&mut grid, &lower, '.');
    canvas.draw_curve(&mut grid, &upper, '.');

    for r in dataset.rows() {
        if r.volatility < x_min || r.volatility > x_max {
            continue;
        }
        let (x, y) = canvas.map(r.volatility, r.trading_halts as f64, width, height);
        grid[y][x] = 'o';
    }

    Panel {
        title: format!("A: volatility=[{x_min:.2}, {x_max:.2}] | halts=[0, {:.2}]", y_max),
        rows: grid.into_iter().map(|row| row.into_iter().collect()).collect(),
    }
}

/// Panel B: observed counts against fitted means, same scale on both axes.
pub fn calibration_panel(points: &[CalibrationPoint], width: usize, height: usize) -> Panel {
    let width = width.max(10);
    let height = height.max(5);

    let (lo, hi) = points
        .iter()
        .flat_map(|p| [p.predicted, p.observed])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let (lo, hi) = if lo.is_finite() && hi.is_finite() && hi > lo {
        (lo, hi)
    } else {
        (0.0, 1.0)
    };
    let (v_min, v_max) = pad_range(lo, hi, 0.05);
    let canvas = Canvas {
        x_min: v_min,
        x_max: v_max,
        y_min: v_min,
        y_max: v_max,
    };

    let mut grid = vec![vec![' '; width]; height];
    canvas.draw_curve(&mut grid, &[(v_min, v_min), (v_max, v_max)], '/');
    for p in points {
        let (x, y) = canvas.map(p.predicted, p.observed, width, height);
        grid[y][x] = 'o';
    }

    Panel {
        title: format!("B: predicted vs observed [{lo:.2}, {hi:.2}]"),
        rows: grid.into_iter().map(|row| row.into_iter().collect()).collect(),
    }
}

/// Lay two panels next to each other, padding or clipping titles to the panel width.
pub fn join_side_by_side(a: &Panel, b: &Panel) -> String {
    let wa = a.rows.first().map_or(0, |r| r.chars().count());
    let wb = b.rows.first().map_or(0, |r| r.chars().count());

    let mut out = String::new();
    out.push_str(&fit_to_width(&a.title, wa));
    out.push_str(PANEL_GAP);
    out.push_str(&fit_to_width(&b.title, wb));
    out.push('\n');

    let n = a.rows.len().max(b.rows.len());
    for i in 0..n {
        let left = a.rows.get(i).map_or_else(|| " ".repeat(wa), Clone::clone);
        let right = b.rows.get(i).map_or_else(|| " ".repeat(wb), Clone::clone);
        out.push_str(&left);
        out.push_str(PANEL_GAP);
        out.push_str(&right);
        out.push('\n');
    }
    out
}

fn fit_to_width(s: &str, width: usize) -> String {
    let clipped: String = s.chars().take(width).collect();
    format!("{clipped:<width$}")
}

/// Data-to-cell mapping for one panel.
struct Canvas {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Canvas {
    fn map(&self, x: f64, y: f64, width: usize, height: usize) -> (usize, usize) {
        (
            map_x(x, self.x_min, self.x_max, width),
            map_y(y, self.y_min, self.y_max, height),
        )
    }

    fn draw_curve(&self, grid: &mut [Vec<char>], curve: &[(f64, f64)], ch: char) {
        if curve.len() < 2 {
            return;
        }
        let height = grid.len();
        let width = grid[0].len();

        let mut prev = None;
        for &(x, y) in curve {
            let (cx, cy) = self.map(x, y, width, height);
            if let Some((x0, y0)) = prev {
                draw_line(grid, x0, y0, cx, cy, ch);
            } else if grid[cy][cx] == ' ' {
                grid[cy][cx] = ch;
            }
            prev = Some((cx, cy));
        }
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish). Only blank cells are written.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use crate::plot::series::MarginalEffectPoint;

    #[test]
    fn calibration_golden_snapshot_small() {
        let points = [
            CalibrationPoint {
                predicted: 0.0,
                observed: 0.0,
            },
            CalibrationPoint {
                predicted: 4.0,
                observed: 4.0,
            },
        ];
        let panel = calibration_panel(&points, 10, 5);
        let expected = [
            "        /o",
            "      //  ",
            "    //    ",
            "  //      ",
            "o/        ",
        ];
        assert_eq!(panel.rows, expected);
        assert_eq!(panel.title, "B: predicted vs observed [0.00, 4.00]");
    }

    #[test]
    fn panels_have_requested_size() {
        let dataset = Dataset::new(
            (0..20)
                .map(|i| Observation {
                    trading_halts: (i % 5) as u64,
                    volatility: 10.0 + i as f64,
                    volume: 100.0,
                })
                .collect(),
        );
        let view = MarginalEffectView {
            volume_held: 100.0,
            points: (0..=19)
                .map(|i| {
                    let v = 10.0 + i as f64;
                    let mu = 0.5 + 0.1 * i as f64;
                    MarginalEffectPoint {
                        volatility: v,
                        predicted: mu,
                        lower: mu * 0.8,
                        upper: mu * 1.25,
                    }
                })
                .collect(),
        };
        let calibration: Vec<CalibrationPoint> = dataset
            .rows()
            .iter()
            .zip(&view.points)
            .map(|(r, p)| CalibrationPoint {
                predicted: p.predicted,
                observed: r.trading_halts as f64,
            })
            .collect();

        let out = render_study_panels(&dataset, &view, &calibration, 30, 8);
        let lines: Vec<&str> = out.lines().collect();
        // title + grid rows + legend
        assert_eq!(lines.len(), 1 + 8 + 1);
        for line in &lines[..9] {
            assert_eq!(line.chars().count(), 30 + PANEL_GAP.len() + 30, "{line:?}");
        }
        assert!(out.contains('o'));
        assert!(out.contains('-'));
        assert!(out.contains('/'));
    }

    #[test]
    fn degenerate_inputs_do_not_panic() {
        let panel = calibration_panel(&[], 3, 2);
        assert_eq!(panel.rows.len(), 5);
        assert_eq!(panel.rows[0].chars().count(), 10);
    }
}
