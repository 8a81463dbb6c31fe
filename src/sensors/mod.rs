//! Sensors - the environment readings behind the monitor loop
//!
//! `SensorSource` is the narrow capability the loop depends on. The board
//! is read over I2C (`enviro`), or through the kernel IIO interface (`iio`)
//! when the in-tree drivers own the chips. `simulated` stands in when no
//! board is attached.

pub mod cpu;
pub mod enviro;
pub mod iio;
pub mod simulated;

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

use crate::units::{TempUnit, Unit};

// === Metrics ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Pressure,
    Humidity,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Pressure, Metric::Humidity];

    /// Key used in logs and uploads
    pub fn name(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Pressure => "pressure",
            Metric::Humidity => "humidity",
        }
    }

    /// Short label for the LCD top bar
    pub fn label(self) -> &'static str {
        match self {
            Metric::Temperature => "Temp",
            Metric::Pressure => "Press",
            Metric::Humidity => "Humid",
        }
    }

    /// Unit a value of this metric is stored in once converted
    pub fn unit(self, temp_unit: TempUnit) -> Unit {
        match self {
            Metric::Temperature => Unit::Temperature(temp_unit),
            Metric::Pressure => Unit::HectoPascal,
            Metric::Humidity => Unit::Percent,
        }
    }

    /// Warning thresholds, expressed in the display unit
    pub fn limits(self, temp_unit: TempUnit) -> Limits {
        match self {
            Metric::Temperature => {
                Limits([4.0, 18.0, 25.0, 35.0].map(|c| temp_unit.from_celsius(c)))
            }
            Metric::Pressure => Limits([250.0, 650.0, 1013.25, 1015.0]),
            Metric::Humidity => Limits([20.0, 30.0, 60.0, 70.0]),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// === Readings ===

/// A single captured value. Never modified after capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub metric: Metric,
    pub value: f64,
    pub unit: Unit,
    pub taken_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(metric: Metric, value: f64, unit: Unit) -> Self {
        Self {
            metric,
            value,
            unit,
            taken_at: Utc::now(),
        }
    }
}

// === Limits ===

/// Four ascending thresholds splitting a range into five levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits(pub [f64; 4]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    DangerLow,
    Low,
    Normal,
    High,
    DangerHigh,
}

impl Limits {
    pub fn classify(&self, value: f64) -> Level {
        let [danger_low, low, high, danger_high] = self.0;
        if value < danger_low {
            Level::DangerLow
        } else if value < low {
            Level::Low
        } else if value <= high {
            Level::Normal
        } else if value <= danger_high {
            Level::High
        } else {
            Level::DangerHigh
        }
    }
}

impl Level {
    /// Marker drawn next to a value on the text screen
    pub fn marker(self) -> &'static str {
        match self {
            Level::DangerLow => "!v",
            Level::Low => "v",
            Level::Normal => "",
            Level::High => "^",
            Level::DangerHigh => "!^",
        }
    }
}

// === Errors ===

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("no IIO device providing {0} found under {dir}", dir = .1.display())]
    NotFound(&'static str, PathBuf),

    #[error("channel {0} is not available")]
    Unavailable(&'static str),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected value '{raw}' in {}", path.display())]
    Parse { path: PathBuf, raw: String },

    #[error("{0}: {1}")]
    Device(&'static str, String),
}

// === Capability ===

/// Source of environment readings.
///
/// Temperature is in Celsius, pressure in hPa, humidity in %RH. Proximity
/// is the raw sensor count; larger means closer.
pub trait SensorSource {
    fn temperature(&mut self) -> Result<f64, SensorError>;

    fn pressure(&mut self) -> Result<f64, SensorError>;

    fn humidity(&mut self) -> Result<f64, SensorError>;

    fn proximity(&mut self) -> Result<u32, SensorError>;

    /// SoC temperature used to compensate the board sensor, if known
    fn cpu_temperature(&mut self) -> Option<f64> {
        None
    }

    fn read(&mut self, metric: Metric) -> Result<f64, SensorError> {
        match metric {
            Metric::Temperature => self.temperature(),
            Metric::Pressure => self.pressure(),
            Metric::Humidity => self.humidity(),
        }
    }
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn temperature(&mut self) -> Result<f64, SensorError> {
        (**self).temperature()
    }

    fn pressure(&mut self) -> Result<f64, SensorError> {
        (**self).pressure()
    }

    fn humidity(&mut self) -> Result<f64, SensorError> {
        (**self).humidity()
    }

    fn proximity(&mut self) -> Result<u32, SensorError> {
        (**self).proximity()
    }

    fn cpu_temperature(&mut self) -> Option<f64> {
        (**self).cpu_temperature()
    }
}
