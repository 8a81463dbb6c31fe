//! Shared utilities for enviromon

use std::fs;
use std::path::Path;

/// Format a duration in seconds to human readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let mins = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    } else {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Raspberry Pi serial number from /proc/cpuinfo
pub fn rpi_serial() -> Option<String> {
    rpi_serial_from(Path::new("/proc/cpuinfo"))
}

fn rpi_serial_from(cpuinfo: &Path) -> Option<String> {
    let contents = fs::read_to_string(cpuinfo).ok()?;
    contents
        .lines()
        .find(|line| line.starts_with("Serial"))
        .and_then(|line| line.split(':').nth(1))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Device ID in the form `raspi-<serial>`, or "n/a" off a Pi
pub fn device_id() -> String {
    rpi_serial()
        .map(|serial| format!("raspi-{}", serial))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Small xorshift generator for sparkles and simulated noise.
///
/// Not suitable for anything but decoration.
#[derive(Debug, Clone)]
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        // zero is a fixed point
        Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform-ish value in `0..bound`
    pub fn below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            0
        } else {
            (self.next_u64() % bound as u64) as usize
        }
    }

    /// Value in `[-1.0, 1.0)`
    pub fn signed_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    }
}
