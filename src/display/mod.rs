//! Display - what ends up on the LCD
//!
//! The loop renders into a character `Canvas`, rotates it and hands it to
//! a `DisplaySink`. `lcd` draws the canvas on the Enviro's ST7735 panel and
//! `terminal` draws it in the terminal for `--simulate` or headless runs.

pub mod console;
pub mod lcd;
pub mod render;
pub mod terminal;

use serde::Deserialize;
use std::fmt;
use std::io;
use std::str::FromStr;

use crate::sensors::Metric;

/// LCD size in character cells (0.96" 160x80 panel at 4x8 px per cell)
pub const LCD_COLS: usize = 40;
pub const LCD_ROWS: usize = 10;

// === Display Modes ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum DisplayMode {
    /// All metrics as text, two columns
    All,
    Temperature,
    Pressure,
    Humidity,
    /// Idle animation
    Sparkles,
}

impl DisplayMode {
    /// Proximity cycling order
    pub const CYCLE: [DisplayMode; 5] = [
        DisplayMode::All,
        DisplayMode::Temperature,
        DisplayMode::Pressure,
        DisplayMode::Humidity,
        DisplayMode::Sparkles,
    ];

    /// Next mode in the cycle, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::CYCLE.iter().position(|m| *m == self).unwrap_or(0);
        Self::CYCLE[(idx + 1) % Self::CYCLE.len()]
    }

    /// Metric graphed by this mode, if it is a single-metric mode
    pub fn metric(self) -> Option<Metric> {
        match self {
            DisplayMode::Temperature => Some(Metric::Temperature),
            DisplayMode::Pressure => Some(Metric::Pressure),
            DisplayMode::Humidity => Some(Metric::Humidity),
            DisplayMode::All | DisplayMode::Sparkles => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DisplayMode::All => "all",
            DisplayMode::Temperature => "temperature",
            DisplayMode::Pressure => "pressure",
            DisplayMode::Humidity => "humidity",
            DisplayMode::Sparkles => "sparkles",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown display mode '{0}' (expected all, temperature, pressure, humidity or sparkles)")]
pub struct UnknownMode(String);

impl FromStr for DisplayMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(DisplayMode::All),
            "temperature" | "temp" | "temps" => Ok(DisplayMode::Temperature),
            "pressure" | "press" => Ok(DisplayMode::Pressure),
            "humidity" | "humid" => Ok(DisplayMode::Humidity),
            "sparkles" | "sparkle" => Ok(DisplayMode::Sparkles),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for DisplayMode {
    type Error = UnknownMode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// === Rotation ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "i64")]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    /// Whether width and height trade places
    pub fn is_sideways(self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }
}

impl TryFrom<i64> for Rotation {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::R0),
            90 => Ok(Rotation::R90),
            180 => Ok(Rotation::R180),
            270 => Ok(Rotation::R270),
            other => Err(format!("invalid rotation {} (expected 0, 90, 180 or 270)", other)),
        }
    }
}

// === Canvas ===

/// Character grid, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    cells: Vec<char>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![' '; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Set a cell; out-of-bounds writes are dropped
    pub fn set(&mut self, x: usize, y: usize, c: char) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = c;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.cells[y * self.width + x])
    }

    /// Write text starting at (x, y), clipped at the right edge
    pub fn put_str(&mut self, x: usize, y: usize, text: &str) {
        for (i, c) in text.chars().enumerate() {
            self.set(x + i, y, c);
        }
    }

    pub fn rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.width.max(1))
            .take(self.height)
            .map(|row| row.iter().collect())
            .collect()
    }

    /// Clockwise rotation
    pub fn rotated(&self, rotation: Rotation) -> Canvas {
        let (w, h) = (self.width, self.height);
        match rotation {
            Rotation::R0 => self.clone(),
            Rotation::R180 => {
                let mut cells = self.cells.clone();
                cells.reverse();
                Canvas { width: w, height: h, cells }
            }
            Rotation::R90 => {
                let mut out = Canvas::new(h, w);
                for y in 0..h {
                    for x in 0..w {
                        if let Some(c) = self.get(x, y) {
                            out.set(h - 1 - y, x, c);
                        }
                    }
                }
                out
            }
            Rotation::R270 => {
                let mut out = Canvas::new(h, w);
                for y in 0..h {
                    for x in 0..w {
                        if let Some(c) = self.get(x, y) {
                            out.set(y, w - 1 - x, c);
                        }
                    }
                }
                out
            }
        }
    }
}

// === Capability ===

/// Something that can show a canvas: the LCD or a stand-in for it
pub trait DisplaySink {
    fn show(&mut self, canvas: &Canvas) -> io::Result<()>;

    /// Turn the screen dark until the next `show`
    fn blank(&mut self) -> io::Result<()>;
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn show(&mut self, canvas: &Canvas) -> io::Result<()> {
        (**self).show(canvas)
    }

    fn blank(&mut self) -> io::Result<()> {
        (**self).blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_cycle_wraps() {
        for start in DisplayMode::CYCLE {
            let mut mode = start;
            let mut seen = vec![mode];
            for _ in 0..DisplayMode::CYCLE.len() {
                mode = mode.next();
                seen.push(mode);
            }
            assert_eq!(mode, start);
            // every mode visited exactly once per lap
            for m in DisplayMode::CYCLE {
                assert_eq!(seen[..DisplayMode::CYCLE.len()].iter().filter(|s| **s == m).count(), 1);
            }
        }
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("ALL".parse::<DisplayMode>().unwrap(), DisplayMode::All);
        assert_eq!("temp".parse::<DisplayMode>().unwrap(), DisplayMode::Temperature);
        assert_eq!("sparkles".parse::<DisplayMode>().unwrap(), DisplayMode::Sparkles);
        assert!("disco".parse::<DisplayMode>().is_err());
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::try_from(270).unwrap(), Rotation::R270);
        assert!(Rotation::try_from(45).is_err());
        assert_eq!(Rotation::R90.degrees(), 90);
    }

    fn sample_canvas() -> Canvas {
        let mut canvas = Canvas::new(3, 2);
        canvas.put_str(0, 0, "abc");
        canvas.put_str(0, 1, "def");
        canvas
    }

    #[test]
    fn test_rotate_90() {
        let rotated = sample_canvas().rotated(Rotation::R90);
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        assert_eq!(rotated.rows(), vec!["da", "eb", "fc"]);
    }

    #[test]
    fn test_rotate_180_and_270() {
        assert_eq!(sample_canvas().rotated(Rotation::R180).rows(), vec!["fed", "cba"]);
        assert_eq!(sample_canvas().rotated(Rotation::R270).rows(), vec!["cf", "be", "ad"]);
    }

    #[test]
    fn test_four_quarter_turns_is_identity() {
        let canvas = sample_canvas();
        let mut turned = canvas.clone();
        for _ in 0..4 {
            turned = turned.rotated(Rotation::R90);
        }
        assert_eq!(turned, canvas);
    }

    #[test]
    fn test_put_str_clips() {
        let mut canvas = Canvas::new(4, 1);
        canvas.put_str(2, 0, "hello");
        assert_eq!(canvas.rows(), vec!["  he"]);
        assert_eq!(canvas.get(9, 9), None);
    }
}
