//! Temperature units and value rounding

use serde::Deserialize;
use std::fmt;

const KELVIN_OFFSET: f64 = 273.15;

/// Unit used when displaying and uploading temperatures.
///
/// Sensors always report Celsius; everything else is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TempUnit {
    #[default]
    #[serde(rename = "C", alias = "c")]
    Celsius,
    #[serde(rename = "F", alias = "f")]
    Fahrenheit,
    #[serde(rename = "K", alias = "k")]
    Kelvin,
}

impl TempUnit {
    /// Convert a Celsius value into this unit
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            TempUnit::Celsius => celsius,
            TempUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            TempUnit::Kelvin => celsius + KELVIN_OFFSET,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TempUnit::Celsius => "C",
            TempUnit::Fahrenheit => "F",
            TempUnit::Kelvin => "K",
        }
    }
}

impl fmt::Display for TempUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unit of a reading as stored in a sample window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Temperature(TempUnit),
    HectoPascal,
    Percent,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Temperature(t) => t.symbol(),
            Unit::HectoPascal => "hPa",
            Unit::Percent => "%",
        }
    }
}

/// Round to a fixed number of decimals, the way values are sent upstream
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(15) as i32);
    (value * factor).round() / factor
}
