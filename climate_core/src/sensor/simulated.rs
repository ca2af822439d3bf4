use super::{SensorDriver, SensorKind};
use crate::clock::{Clock, TokioClock};
use crate::error::{ClimateError, ClimateResult};
use crate::reading::Reading;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How often simulation mode rolls new values
pub const SIMULATION_REFRESH: Duration = Duration::from_secs(5);

/// Stand-in sensor for machines without GPIO.
///
/// Returns the current simulated reading, optionally after a fixed latency
/// measured on an injected clock. A background task can re-roll the values
/// periodically; it is stopped by [`SimulatedSensor::stop`] or on drop.
pub struct SimulatedSensor {
    current: Arc<RwLock<Reading>>,
    failure: Arc<RwLock<Option<String>>>,
    latency: Option<Duration>,
    clock: Arc<dyn Clock>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedSensor {
    /// Sensor that always reports `reading`
    pub fn fixed(reading: Reading) -> Self {
        Self {
            current: Arc::new(RwLock::new(reading)),
            failure: Arc::new(RwLock::new(None)),
            latency: None,
            clock: Arc::new(TokioClock),
            refresher: Mutex::new(None),
        }
    }

    /// Sensor seeded with random values in `[0, 10)`
    pub fn randomized() -> Self {
        Self::fixed(random_reading())
    }

    /// Delay every read by `latency` on `clock`
    pub fn with_latency(mut self, latency: Duration, clock: Arc<dyn Clock>) -> Self {
        self.latency = Some(latency);
        self.clock = clock;
        self
    }

    pub fn set_reading(&self, reading: Reading) {
        *self.current.write() = reading;
    }

    /// Make subsequent reads fail with `reason` (`None` restores success)
    pub fn set_failure(&self, reason: Option<String>) {
        *self.failure.write() = reason;
    }

    pub fn current(&self) -> Reading {
        *self.current.read()
    }

    /// Start re-rolling the simulated values every `period`
    pub fn start_refreshing(&self, period: Duration) {
        let current = self.current.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let reading = random_reading();
                tracing::debug!(
                    temperature = reading.temperature,
                    humidity = reading.humidity,
                    "Updated simulated reading"
                );
                *current.write() = reading;
            }
        });

        if let Some(previous) = self.refresher.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the refresh task, if any
    pub fn stop(&self) {
        if let Some(handle) = self.refresher.lock().take() {
            handle.abort();
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.lock().is_some()
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SensorDriver for SimulatedSensor {
    fn read(&self, kind: SensorKind, pin: u8) -> BoxFuture<'static, ClimateResult<Reading>> {
        let current = self.current.clone();
        let failure = self.failure.clone();
        let delay = self.latency.map(|latency| self.clock.sleep(latency));

        Box::pin(async move {
            if let Some(delay) = delay {
                delay.await;
            }
            tracing::trace!(sensor = %kind, pin, "Simulated read");
            if let Some(reason) = failure.read().clone() {
                return Err(ClimateError::read(reason));
            }
            let reading = *current.read();
            Ok(reading)
        })
    }
}

fn random_reading() -> Reading {
    let mut rng = rand::thread_rng();
    Reading::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0))
}
