//! Sensor drivers.
//!
//! Supported backends:
//! - DHT11 / DHT22 (AM2302) bit-banged over Raspberry Pi GPIO (`raspberry-pi` feature)
//! - Simulation mode returning generated values

pub mod dht;
pub mod simulated;

pub use dht::DhtSensor;
pub use simulated::{SimulatedSensor, SIMULATION_REFRESH};

use crate::error::{ClimateError, ClimateResult};
use crate::reading::Reading;
use futures::future::BoxFuture;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The two supported single-wire sensor families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// 8-bit integral readings, 1 °C / 1 % resolution
    Dht11,
    /// 16-bit readings in tenths, also sold as AM2302
    Dht22,
}

impl SensorKind {
    /// How long the host must hold the line low to request a frame
    pub fn start_signal(&self) -> Duration {
        match self {
            SensorKind::Dht11 => Duration::from_millis(18),
            SensorKind::Dht22 => Duration::from_micros(1100),
        }
    }

    /// Numeric code used in configuration (`11` or `22`)
    pub fn code(&self) -> u8 {
        match self {
            SensorKind::Dht11 => 11,
            SensorKind::Dht22 => 22,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Dht11 => write!(f, "DHT11"),
            SensorKind::Dht22 => write!(f, "DHT22"),
        }
    }
}

impl FromStr for SensorKind {
    type Err = ClimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "11" | "dht11" => Ok(SensorKind::Dht11),
            "22" | "dht22" | "am2302" => Ok(SensorKind::Dht22),
            other => Err(ClimateError::config(format!(
                "unsupported sensor type '{}', expected 11 or 22",
                other
            ))),
        }
    }
}

/// A capability that produces one [`Reading`] per call.
///
/// The returned future is `'static` so blocking drivers can move their work
/// onto the blocking pool and be abandoned when a read times out.
pub trait SensorDriver: Send + Sync {
    fn read(&self, kind: SensorKind, pin: u8) -> BoxFuture<'static, ClimateResult<Reading>>;
}
