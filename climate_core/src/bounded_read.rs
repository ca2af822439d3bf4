//! Sensor reads raced against a timeout.

use crate::clock::Clock;
use crate::error::{ClimateError, ClimateResult};
use crate::reading::Reading;
use crate::sensor::{SensorDriver, SensorKind};
use std::sync::Arc;
use std::time::Duration;

/// What to read and how long to wait for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSettings {
    pub kind: SensorKind,
    pub pin: u8,
    pub timeout: Duration,
}

pub struct BoundedReader {
    sensor: Arc<dyn SensorDriver>,
    clock: Arc<dyn Clock>,
}

impl BoundedReader {
    pub fn new(sensor: Arc<dyn SensorDriver>, clock: Arc<dyn Clock>) -> Self {
        Self { sensor, clock }
    }

    /// Read once, giving up after `timeout`.
    ///
    /// Exactly one outcome is produced. If the timer and the sensor become
    /// ready in the same poll the timer wins, so a read taking at least
    /// `timeout` always fails with [`ClimateError::ReadTimeout`]. A read that
    /// loses the race is dropped and its result discarded.
    pub async fn read(
        &self,
        kind: SensorKind,
        pin: u8,
        timeout: Duration,
    ) -> ClimateResult<Reading> {
        let timer = self.clock.sleep(timeout);
        let reading = self.sensor.read(kind, pin);

        tokio::select! {
            biased;
            _ = timer => Err(ClimateError::ReadTimeout(timeout)),
            result = reading => match result {
                Ok(reading) => Ok(reading),
                Err(e @ ClimateError::Read { .. }) => Err(e),
                Err(other) => Err(ClimateError::read(other)),
            },
        }
    }

    pub async fn read_with(&self, settings: &ReadSettings) -> ClimateResult<Reading> {
        self.read(settings.kind, settings.pin, settings.timeout).await
    }
}
