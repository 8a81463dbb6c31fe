//! LCD emulation in the terminal

use std::io::{self, Write};

use super::{Canvas, DisplaySink};

const HOME: &str = "\x1b[H";
const CLEAR: &str = "\x1b[2J";

/// Draws the canvas in a box at the top of the terminal
pub struct TerminalDisplay<W: Write = io::Stdout> {
    out: W,
    last: Option<Vec<String>>,
    cleared: bool,
}

impl TerminalDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last: None,
            cleared: false,
        }
    }

    fn draw(&mut self, rows: &[String], width: usize) -> io::Result<()> {
        if !self.cleared {
            write!(self.out, "{}", CLEAR)?;
            self.cleared = true;
        }
        write!(self.out, "{}", HOME)?;
        writeln!(self.out, "+{}+", "-".repeat(width))?;
        for row in rows {
            writeln!(self.out, "|{}|", row)?;
        }
        writeln!(self.out, "+{}+", "-".repeat(width))?;
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for TerminalDisplay<W> {
    fn show(&mut self, canvas: &Canvas) -> io::Result<()> {
        let rows = canvas.rows();
        if self.last.as_ref() == Some(&rows) {
            return Ok(());
        }
        self.draw(&rows, canvas.width())?;
        self.last = Some(rows);
        Ok(())
    }

    fn blank(&mut self) -> io::Result<()> {
        let Some(previous) = self.last.take() else {
            return Ok(());
        };
        let width = previous.first().map(|r| r.chars().count()).unwrap_or(0);
        let empty = vec![" ".repeat(width); previous.len()];
        self.draw(&empty, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(text: &str) -> Canvas {
        let mut canvas = Canvas::new(4, 1);
        canvas.put_str(0, 0, text);
        canvas
    }

    #[test]
    fn test_draws_boxed_canvas() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.show(&canvas("ab")).unwrap();
        let out = String::from_utf8(display.out.clone()).unwrap();
        assert!(out.starts_with(CLEAR));
        assert!(out.contains("+----+\n|ab  |\n+----+\n"));
    }

    #[test]
    fn test_skips_identical_frames() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.show(&canvas("ab")).unwrap();
        let len = display.out.len();
        display.show(&canvas("ab")).unwrap();
        assert_eq!(display.out.len(), len);
        display.show(&canvas("cd")).unwrap();
        assert!(display.out.len() > len);
    }

    #[test]
    fn test_blank_then_redraw() {
        let mut display = TerminalDisplay::new(Vec::new());
        display.show(&canvas("ab")).unwrap();
        display.blank().unwrap();
        let out = String::from_utf8(display.out.clone()).unwrap();
        assert!(out.ends_with("|    |\n+----+\n"));

        // same canvas is drawn again after waking up
        let len = display.out.len();
        display.show(&canvas("ab")).unwrap();
        assert!(display.out.len() > len);
    }
}
