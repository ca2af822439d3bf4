//! Power-cycling the sensor after repeated failures.

use crate::clock::Clock;
use crate::relay::{RelayLevel, RelayLine};
use std::sync::Arc;
use std::time::Duration;

/// Consecutive failures that trigger a power cycle by default
pub const DEFAULT_RESET_THRESHOLD: u32 = 3;

/// Default time the sensor is kept unpowered
pub const DEFAULT_RESET_TIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub reset_time: Duration,
    pub threshold: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            reset_time: DEFAULT_RESET_TIME,
            threshold: DEFAULT_RESET_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Normal,
    Resetting,
}

/// Owns the relay line and runs the Normal → Resetting → Normal cycle
pub struct RelayReset {
    line: Box<dyn RelayLine>,
    settings: RelaySettings,
    clock: Arc<dyn Clock>,
    state: RecoveryState,
    level: RelayLevel,
    released: bool,
}

impl RelayReset {
    pub fn new(line: Box<dyn RelayLine>, settings: RelaySettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            line,
            settings,
            clock,
            state: RecoveryState::Normal,
            level: RelayLevel::Low,
            released: false,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn level(&self) -> RelayLevel {
        self.level
    }

    pub fn should_reset(&self, failures: u32) -> bool {
        !self.released && failures >= self.settings.threshold
    }

    /// Power-cycle the sensor if `failures` reached the threshold.
    ///
    /// Returns true when a reset ran; the caller then clears its failure
    /// count. If this future is dropped mid-reset, [`RelayReset::release`]
    /// still restores power.
    pub async fn maybe_reset(&mut self, failures: u32) -> bool {
        if !self.should_reset(failures) {
            return false;
        }

        self.state = RecoveryState::Resetting;
        tracing::warn!(
            failures,
            off_ms = self.settings.reset_time.as_millis() as u64,
            "Power-cycling sensor"
        );

        self.drive(RelayLevel::High);
        self.clock.sleep(self.settings.reset_time).await;
        self.drive(RelayLevel::Low);

        self.state = RecoveryState::Normal;
        tracing::info!("Sensor power restored");
        true
    }

    /// Restore power and hand the line back. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if self.level == RelayLevel::High || self.state == RecoveryState::Resetting {
            self.drive(RelayLevel::Low);
        }
        self.line.release();
        self.state = RecoveryState::Normal;
        self.released = true;
    }

    fn drive(&mut self, level: RelayLevel) {
        match self.line.write(level) {
            Ok(()) => self.level = level,
            Err(e) => tracing::error!(%level, error = %e, "Relay write failed"),
        }
    }
}

impl Drop for RelayReset {
    fn drop(&mut self) {
        self.release();
    }
}
