//! Linux IIO sysfs sensor source
//!
//! The Enviro board's BME280 and LTR559 are handled by the in-tree
//! `bmp280` and `ltr501` drivers, which publish their channels under
//! `/sys/bus/iio/devices/iio:deviceN/`.

use std::fs;
use std::path::{Path, PathBuf};

use super::cpu::CpuThermometer;
use super::{SensorError, SensorSource};

pub const IIO_ROOT: &str = "/sys/bus/iio/devices";

const CLIMATE_DEVICES: &[&str] = &["bme280", "bmp280"];
const PROXIMITY_DEVICES: &[&str] = &["ltr559", "ltr501"];

/// Board sensors found through IIO
#[derive(Debug)]
pub struct IioSensor {
    climate: PathBuf,
    proximity: Option<PathBuf>,
    cpu: CpuThermometer,
}

impl IioSensor {
    /// Locate the sensors under the standard sysfs root
    pub fn discover() -> Result<Self, SensorError> {
        Self::discover_in(Path::new(IIO_ROOT))
    }

    pub fn discover_in(root: &Path) -> Result<Self, SensorError> {
        let climate = find_device(root, CLIMATE_DEVICES)
            .ok_or_else(|| SensorError::NotFound("temperature/pressure/humidity", root.to_path_buf()))?;
        let proximity = find_device(root, PROXIMITY_DEVICES);

        tracing::info!("Using climate sensor at {:?}", climate);
        match &proximity {
            Some(dir) => tracing::info!("Using proximity sensor at {:?}", dir),
            None => tracing::warn!("No proximity sensor found, display mode switching disabled"),
        }

        Ok(Self {
            climate,
            proximity,
            cpu: CpuThermometer::new(),
        })
    }
}

impl SensorSource for IioSensor {
    fn temperature(&mut self) -> Result<f64, SensorError> {
        // millidegrees Celsius
        read_channel(&self.climate, "in_temp").map(|v| v / 1000.0)
    }

    fn pressure(&mut self) -> Result<f64, SensorError> {
        // kPa
        read_channel(&self.climate, "in_pressure").map(|v| v * 10.0)
    }

    fn humidity(&mut self) -> Result<f64, SensorError> {
        // milli percent
        read_channel(&self.climate, "in_humidityrelative").map(|v| v / 1000.0)
    }

    fn proximity(&mut self) -> Result<u32, SensorError> {
        let dir = self
            .proximity
            .as_ref()
            .ok_or(SensorError::Unavailable("proximity"))?;
        read_channel(dir, "in_proximity").map(|v| v.max(0.0) as u32)
    }

    fn cpu_temperature(&mut self) -> Option<f64> {
        self.cpu.read()
    }
}

// === Helper Functions ===

fn find_device(root: &Path, names: &[&str]) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    let mut devices: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            fs::read_to_string(p.join("name"))
                .map(|n| names.contains(&n.trim()))
                .unwrap_or(false)
        })
        .collect();
    devices.sort();
    devices.into_iter().next()
}

/// Read a processed channel value.
///
/// Prefers `<chan>_input`; falls back to `<chan>_raw` times `<chan>_scale`.
fn read_channel(dir: &Path, channel: &str) -> Result<f64, SensorError> {
    let input = dir.join(format!("{}_input", channel));
    if input.exists() {
        return read_number(&input);
    }

    let raw = read_number(&dir.join(format!("{}_raw", channel)))?;
    let scale_path = dir.join(format!("{}_scale", channel));
    let scale = if scale_path.exists() {
        read_number(&scale_path)?
    } else {
        1.0
    };
    Ok(raw * scale)
}

fn read_number(path: &Path) -> Result<f64, SensorError> {
    let raw = fs::read_to_string(path).map_err(|source| SensorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    raw.trim().parse::<f64>().map_err(|_| SensorError::Parse {
        path: path.to_path_buf(),
        raw: raw.trim().to_string(),
    })
}
