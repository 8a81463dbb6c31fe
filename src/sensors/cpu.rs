//! CPU temperature and board sensor compensation
//!
//! The BME280 sits right above the SoC, so its readings drift with CPU
//! heat. A rolling average of CPU temperatures pulls them back.

use sysinfo::Components;

use crate::window::SampleWindow;

/// Reads the SoC temperature from hwmon via sysinfo
#[derive(Debug, Default)]
pub struct CpuThermometer;

impl CpuThermometer {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self) -> Option<f64> {
        let components = Components::new_with_refreshed_list();

        let mut fallback = None;
        for component in components.iter() {
            let Some(temp) = component.temperature() else {
                continue;
            };
            let label = component.label().to_lowercase();
            if label.contains("cpu") || label.contains("soc") {
                return Some(f64::from(temp));
            }
            if fallback.is_none() {
                fallback = Some(f64::from(temp));
            }
        }
        fallback
    }
}

/// Rolling CPU-temperature compensation
#[derive(Debug, Clone)]
pub struct Compensation {
    factor: f64,
    cpu_temps: SampleWindow<f64>,
}

impl Compensation {
    /// A factor of zero (or less) disables compensation
    pub fn new(factor: f64, window: usize) -> Self {
        Self {
            factor,
            cpu_temps: SampleWindow::new(window),
        }
    }

    pub fn enabled(&self) -> bool {
        self.factor > 0.0
    }

    /// Compensate a raw Celsius reading given the latest CPU temperature
    pub fn apply(&mut self, raw: f64, cpu: Option<f64>) -> f64 {
        if !self.enabled() {
            return raw;
        }
        if let Some(cpu) = cpu {
            self.cpu_temps.push(cpu);
        }
        match self.cpu_temps.average() {
            Some(avg) => raw - (avg - raw) / self.factor,
            None => raw,
        }
    }
}
