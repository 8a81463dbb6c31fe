//! Single-line status output for the terminal (disabled with --noCLI)

use chrono::Local;
use std::io::{self, Write};

use super::DisplayMode;
use crate::sensors::{Metric, Reading};
use crate::shared::format_duration;

/// Snapshot of loop state for the status line
#[derive(Debug, Clone)]
pub struct Status {
    pub readings: Vec<Reading>,
    pub mode: DisplayMode,
    pub asleep: bool,
    pub uploads: u32,
    pub max_uploads: Option<u32>,
    /// Seconds until the next upload, `None` when uploads are off
    pub next_upload: Option<u64>,
}

impl Status {
    pub fn line(&self) -> String {
        let mut parts: Vec<String> = Metric::ALL
            .iter()
            .map(|metric| match self.readings.iter().find(|r| r.metric == *metric) {
                Some(r) => format!("{} {:.1}{}", metric.label(), r.value, r.unit.symbol()),
                None => format!("{} --", metric.label()),
            })
            .collect();

        if let Some(taken_at) = self.readings.iter().map(|r| r.taken_at).max() {
            parts.push(format!("at {}", taken_at.with_timezone(&Local).format("%H:%M:%S")));
        }

        parts.push(format!(
            "mode: {}{}",
            self.mode,
            if self.asleep { " (sleeping)" } else { "" }
        ));

        match self.next_upload {
            Some(secs) => {
                let uploads = match self.max_uploads {
                    Some(max) => format!("{}/{}", self.uploads, max),
                    None => self.uploads.to_string(),
                };
                parts.push(format!("uploads: {}", uploads));
                parts.push(format!("next in {}", format_duration(secs)));
            }
            None => parts.push("uploads off".to_string()),
        }

        parts.join(" | ")
    }
}

/// Terminal status line, rewritten in place every cycle
pub struct Console {
    out: Box<dyn Write>,
}

impl Console {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    pub fn status(&mut self, status: &Status) -> io::Result<()> {
        write!(self.out, "\r\x1b[K{}", status.line())?;
        self.out.flush()
    }
}
