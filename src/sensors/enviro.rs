//! Enviro board sensors on the I2C bus
//!
//! The BME280 goes through the `bme280` driver. The LTR559 light and
//! proximity sensor only needs a handful of registers, so those are
//! written directly over `embedded-hal`'s `I2c` trait.

use bme280::i2c::BME280;
use embedded_hal::i2c::I2c;
use linux_embedded_hal::{Delay, I2cdev};
use std::time::{Duration, Instant};

use super::cpu::CpuThermometer;
use super::{SensorError, SensorSource};

pub const I2C_BUS: &str = "/dev/i2c-1";

/// One BME280 measurement serves all three metrics of a cycle
const MEASUREMENT_TTL: Duration = Duration::from_millis(500);

// === Climate ===

/// BME280 values in the units the loop expects
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    /// Celsius
    pub temperature: f64,
    /// hPa
    pub pressure: f64,
    /// %RH
    pub humidity: f64,
}

impl Climate {
    /// From the driver's output, which reports pressure in Pa
    pub fn from_driver(temperature: f32, pressure_pa: f32, humidity: f32) -> Self {
        Self {
            temperature: f64::from(temperature),
            pressure: f64::from(pressure_pa) / 100.0,
            humidity: f64::from(humidity),
        }
    }
}

// === LTR559 ===

pub const LTR559_ADDR: u8 = 0x23;

const REG_PS_CONTR: u8 = 0x81;
const REG_PS_N_PULSES: u8 = 0x83;
const REG_PART_ID: u8 = 0x86;
const REG_PS_DATA: u8 = 0x8D;

const PART_ID: u8 = 0x09;
const PS_ACTIVE: u8 = 0x03;
const PS_DATA_MASK: u16 = 0x07FF;

/// Proximity half of the LTR559
pub struct Ltr559<I> {
    bus: I,
}

impl<I: I2c> Ltr559<I> {
    /// Check the part id and switch the proximity sensor to active mode
    pub fn new(mut bus: I) -> Result<Self, SensorError> {
        let mut id = [0u8; 1];
        bus.write_read(LTR559_ADDR, &[REG_PART_ID], &mut id)
            .map_err(|e| bus_error("ltr559", e))?;
        if id[0] >> 4 != PART_ID {
            return Err(SensorError::Device(
                "ltr559",
                format!("unexpected part id 0x{:02x}", id[0]),
            ));
        }

        bus.write(LTR559_ADDR, &[REG_PS_N_PULSES, 1])
            .map_err(|e| bus_error("ltr559", e))?;
        bus.write(LTR559_ADDR, &[REG_PS_CONTR, PS_ACTIVE])
            .map_err(|e| bus_error("ltr559", e))?;
        Ok(Self { bus })
    }

    /// 11-bit proximity count
    pub fn proximity(&mut self) -> Result<u16, SensorError> {
        let mut data = [0u8; 2];
        self.bus
            .write_read(LTR559_ADDR, &[REG_PS_DATA], &mut data)
            .map_err(|e| bus_error("ltr559", e))?;
        Ok(u16::from_le_bytes(data) & PS_DATA_MASK)
    }
}

// === Board ===

/// BME280 and LTR559 on the Enviro board
pub struct EnviroBoard {
    bme: BME280<I2cdev>,
    proximity: Option<Ltr559<I2cdev>>,
    cpu: CpuThermometer,
    delay: Delay,
    last: Option<(Instant, Climate)>,
}

impl EnviroBoard {
    /// Open both sensors on `bus`. Only the BME280 is required.
    pub fn open(bus: &str) -> Result<Self, SensorError> {
        let i2c = I2cdev::new(bus).map_err(|e| SensorError::Device("bme280", format!("{}: {}", bus, e)))?;
        let mut delay = Delay;
        let mut bme = BME280::new_primary(i2c);
        bme.init(&mut delay).map_err(|e| bus_error("bme280", e))?;
        tracing::info!("Using BME280 on {}", bus);

        let proximity = I2cdev::new(bus)
            .map_err(|e| SensorError::Device("ltr559", format!("{}: {}", bus, e)))
            .and_then(Ltr559::new);
        let proximity = match proximity {
            Ok(ltr) => {
                tracing::info!("Using LTR559 on {}", bus);
                Some(ltr)
            }
            Err(e) => {
                tracing::warn!("No proximity sensor ({}), display mode switching disabled", e);
                None
            }
        };

        Ok(Self {
            bme,
            proximity,
            cpu: CpuThermometer::new(),
            delay,
            last: None,
        })
    }

    fn climate(&mut self) -> Result<Climate, SensorError> {
        if let Some((at, climate)) = self.last {
            if at.elapsed() < MEASUREMENT_TTL {
                return Ok(climate);
            }
        }

        let m = self
            .bme
            .measure(&mut self.delay)
            .map_err(|e| bus_error("bme280", e))?;
        let climate = Climate::from_driver(m.temperature, m.pressure, m.humidity);
        self.last = Some((Instant::now(), climate));
        Ok(climate)
    }
}

impl SensorSource for EnviroBoard {
    fn temperature(&mut self) -> Result<f64, SensorError> {
        self.climate().map(|c| c.temperature)
    }

    fn pressure(&mut self) -> Result<f64, SensorError> {
        self.climate().map(|c| c.pressure)
    }

    fn humidity(&mut self) -> Result<f64, SensorError> {
        self.climate().map(|c| c.humidity)
    }

    fn proximity(&mut self) -> Result<u32, SensorError> {
        let ltr = self
            .proximity
            .as_mut()
            .ok_or(SensorError::Unavailable("proximity"))?;
        ltr.proximity().map(u32::from)
    }

    fn cpu_temperature(&mut self) -> Option<f64> {
        self.cpu.read()
    }
}

fn bus_error(device: &'static str, e: impl std::fmt::Debug) -> SensorError {
    SensorError::Device(device, format!("{:?}", e))
}
