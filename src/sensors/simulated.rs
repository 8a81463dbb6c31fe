//! Simulated readings for running without the board attached

use super::{SensorError, SensorSource};
use crate::shared::XorShift;

/// Slowly drifting values inside the BME280's usual indoor range.
///
/// Proximity never triggers, so the display stays in its configured mode.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    tick: u64,
    rng: XorShift,
}

impl SimulatedSensor {
    pub fn new(seed: u64) -> Self {
        Self {
            tick: 0,
            rng: XorShift::new(seed),
        }
    }

    fn wave(&mut self, base: f64, amplitude: f64, period: f64, noise: f64) -> f64 {
        let phase = self.tick as f64 / period * std::f64::consts::TAU;
        base + amplitude * phase.sin() + noise * self.rng.signed_unit()
    }
}

impl SensorSource for SimulatedSensor {
    fn temperature(&mut self) -> Result<f64, SensorError> {
        // each full read starts with temperature
        self.tick += 1;
        Ok(self.wave(21.0, 2.5, 600.0, 0.2).clamp(-40.0, 85.0))
    }

    fn pressure(&mut self) -> Result<f64, SensorError> {
        Ok(self.wave(1013.0, 4.0, 1800.0, 0.3).clamp(300.0, 1100.0))
    }

    fn humidity(&mut self) -> Result<f64, SensorError> {
        Ok(self.wave(45.0, 8.0, 900.0, 0.5).clamp(0.0, 100.0))
    }

    fn proximity(&mut self) -> Result<u32, SensorError> {
        Ok(0)
    }

    fn cpu_temperature(&mut self) -> Option<f64> {
        Some(self.wave(48.0, 3.0, 300.0, 0.5))
    }
}
