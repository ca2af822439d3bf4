//! Relay lines that switch the sensor's supply.
//!
//! The relay is wired normally-closed: driving the line high cuts power to
//! the sensor, driving it low restores it.

use crate::error::{ClimateError, ClimateResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayLevel {
    /// Sensor powered
    Low,
    /// Sensor power cut
    High,
}

impl fmt::Display for RelayLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayLevel::Low => write!(f, "low"),
            RelayLevel::High => write!(f, "high"),
        }
    }
}

/// A digital output controlling the relay
pub trait RelayLine: Send {
    fn write(&mut self, level: RelayLevel) -> ClimateResult<()>;

    /// Give the line back to the system. Must leave the sensor powered.
    fn release(&mut self);
}

/// Relay on a Raspberry Pi GPIO output
pub struct GpioRelay {
    pin: u8,
    #[cfg(feature = "raspberry-pi")]
    line: Option<rppal::gpio::OutputPin>,
}

impl GpioRelay {
    /// Claim `pin` as an output, starting low (sensor powered)
    #[cfg(feature = "raspberry-pi")]
    pub fn open(pin: u8) -> ClimateResult<Self> {
        use rppal::gpio::Gpio;

        let gpio = Gpio::new().map_err(|e| ClimateError::gpio(format!("cannot access GPIO: {}", e)))?;
        let line = gpio
            .get(pin)
            .map_err(|e| ClimateError::gpio(format!("relay pin {}: {}", pin, e)))?
            .into_output_low();

        tracing::debug!(pin, "Claimed relay line");
        Ok(Self {
            pin,
            line: Some(line),
        })
    }

    #[cfg(not(feature = "raspberry-pi"))]
    pub fn open(pin: u8) -> ClimateResult<Self> {
        Err(ClimateError::gpio(format!(
            "cannot claim relay pin {}: built without the `raspberry-pi` feature",
            pin
        )))
    }
}

impl RelayLine for GpioRelay {
    #[cfg(feature = "raspberry-pi")]
    fn write(&mut self, level: RelayLevel) -> ClimateResult<()> {
        let line = self
            .line
            .as_mut()
            .ok_or_else(|| ClimateError::gpio(format!("relay pin {} already released", self.pin)))?;
        match level {
            RelayLevel::Low => line.set_low(),
            RelayLevel::High => line.set_high(),
        }
        Ok(())
    }

    #[cfg(not(feature = "raspberry-pi"))]
    fn write(&mut self, _level: RelayLevel) -> ClimateResult<()> {
        Err(ClimateError::gpio(format!(
            "relay pin {} unavailable without GPIO support",
            self.pin
        )))
    }

    #[cfg(feature = "raspberry-pi")]
    fn release(&mut self) {
        if let Some(mut line) = self.line.take() {
            line.set_low();
            tracing::debug!(pin = self.pin, "Released relay line");
        }
    }

    #[cfg(not(feature = "raspberry-pi"))]
    fn release(&mut self) {}
}

impl Drop for GpioRelay {
    fn drop(&mut self) {
        self.release();
    }
}

/// Relay used in simulation mode; tracks its level and logs transitions
#[derive(Debug)]
pub struct SimulatedRelay {
    pin: u8,
    level: RelayLevel,
    released: bool,
}

impl SimulatedRelay {
    pub fn new(pin: u8) -> Self {
        Self {
            pin,
            level: RelayLevel::Low,
            released: false,
        }
    }

    pub fn level(&self) -> RelayLevel {
        self.level
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl RelayLine for SimulatedRelay {
    fn write(&mut self, level: RelayLevel) -> ClimateResult<()> {
        if self.released {
            return Err(ClimateError::gpio(format!(
                "relay pin {} already released",
                self.pin
            )));
        }
        tracing::info!(pin = self.pin, %level, "Simulated relay write");
        self.level = level;
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.level = RelayLevel::Low;
            self.released = true;
            tracing::info!(pin = self.pin, "Simulated relay released");
        }
    }
}
