//! Canvas rendering for each display mode

use super::{Canvas, DisplayMode, Rotation};
use crate::sensors::Metric;
use crate::shared::XorShift;
use crate::units::TempUnit;
use crate::window::History;

const BLOCKS: [char; 7] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇'];
const FULL_BLOCK: char = '█';
const SPARKLES: [char; 4] = ['*', '+', '.', '\''];
const PROGRESS: char = '=';

/// Turns sample history into LCD canvases
#[derive(Debug, Clone)]
pub struct Renderer {
    width: usize,
    height: usize,
    rotation: Rotation,
    progress: bool,
    temp_unit: TempUnit,
    rng: XorShift,
}

impl Renderer {
    /// `width` and `height` are the panel size before rotation
    pub fn new(width: usize, height: usize, rotation: Rotation, progress: bool, temp_unit: TempUnit) -> Self {
        Self {
            width,
            height,
            rotation,
            progress,
            temp_unit,
            rng: XorShift::new(0x5eed),
        }
    }

    /// Size of the canvas as the viewer sees it
    pub fn logical_size(&self) -> (usize, usize) {
        if self.rotation.is_sideways() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Draw one frame. `progress` is the elapsed fraction of the upload interval.
    pub fn render(&mut self, mode: DisplayMode, history: &History, progress: f64) -> Canvas {
        let (w, h) = self.logical_size();
        let mut canvas = Canvas::new(w, h);
        let area = if self.progress && h > 1 { h - 1 } else { h };

        match mode.metric() {
            Some(metric) => self.draw_graph(&mut canvas, area, metric, history),
            None if mode == DisplayMode::All => self.draw_all(&mut canvas, area, history),
            None => self.draw_sparkles(&mut canvas, area),
        }

        if self.progress && h > 1 {
            draw_progress(&mut canvas, h - 1, progress);
        }

        canvas.rotated(self.rotation)
    }

    fn draw_graph(&self, canvas: &mut Canvas, area: usize, metric: Metric, history: &History) {
        let unit = metric.unit(self.temp_unit);
        let label = match history.latest(metric) {
            Some(r) => format!("{}: {:.1} {}", metric.label(), r.value, unit.symbol()),
            None => format!("{}: --", metric.label()),
        };
        canvas.put_str(0, 0, &label);

        if area < 2 {
            return;
        }
        let rows = area - 1;
        let values = history.values(metric);
        let shown = &values[values.len().saturating_sub(canvas.width())..];
        let offset = canvas.width() - shown.len();

        let (min, max) = shown
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

        for (i, v) in shown.iter().enumerate() {
            let norm = if max > min { (v - min) / (max - min) } else { 0.5 };
            let eighths = (norm * (rows * 8 - 1) as f64).round() as usize + 1;
            let (full, partial) = (eighths / 8, eighths % 8);
            let x = offset + i;

            for k in 0..full {
                canvas.set(x, area - 1 - k, FULL_BLOCK);
            }
            if partial > 0 && full < rows {
                canvas.set(x, area - 1 - full, BLOCKS[partial - 1]);
            }
        }
    }

    fn draw_all(&self, canvas: &mut Canvas, area: usize, history: &History) {
        let cols = 2;
        let per_col = Metric::ALL.len().div_ceil(cols);
        let col_width = canvas.width() / cols;
        let row_step = (area / per_col).max(1);

        for (i, metric) in Metric::ALL.iter().enumerate() {
            let x = (i / per_col) * col_width;
            let y = (i % per_col) * row_step;
            let unit = metric.unit(self.temp_unit);
            let text = match history.latest(*metric) {
                Some(r) => {
                    let level = metric.limits(self.temp_unit).classify(r.value);
                    format!("{}: {:.1} {}{}", metric.label(), r.value, unit.symbol(), level.marker())
                }
                None => format!("{}: --", metric.label()),
            };
            let clipped: String = text.chars().take(col_width.saturating_sub(1)).collect();
            canvas.put_str(x, y, &clipped);
        }
    }

    fn draw_sparkles(&mut self, canvas: &mut Canvas, area: usize) {
        let count = (canvas.width() * area) / 8;
        for _ in 0..count {
            let x = self.rng.below(canvas.width());
            let y = self.rng.below(area);
            let c = SPARKLES[self.rng.below(SPARKLES.len())];
            canvas.set(x, y, c);
        }
    }
}

fn draw_progress(canvas: &mut Canvas, row: usize, fraction: f64) {
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    let filled = (fraction * canvas.width() as f64).round() as usize;
    for x in 0..filled {
        canvas.set(x, row, PROGRESS);
    }
}
