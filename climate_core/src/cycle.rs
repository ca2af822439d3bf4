//! The read → report → recover cycle and the state it owns.

use crate::bounded_read::{BoundedReader, ReadSettings};
use crate::dispatch::Dispatcher;
use crate::error::ClimateError;
use crate::reading::Report;
use crate::recovery::{RecoveryState, RelayReset};
use crate::scheduling::ScheduledTask;
use futures::future::BoxFuture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Reading,
    Reporting,
    Recovering,
}

/// Result of one pass through the cycle
#[derive(Debug)]
pub enum CycleOutcome {
    Reported(Report),
    Failed {
        error: ClimateError,
        /// Consecutive failures including this one
        failures: u32,
        relay_reset: bool,
    },
}

impl CycleOutcome {
    pub fn is_reported(&self) -> bool {
        matches!(self, CycleOutcome::Reported(_))
    }
}

/// Single owner of the failure counter and the relay.
///
/// One instance per process, driven by the scheduler; cycles never overlap
/// because every entry point takes `&mut self`.
pub struct CycleOrchestrator {
    reader: BoundedReader,
    dispatcher: Dispatcher,
    settings: ReadSettings,
    relay: Option<RelayReset>,
    failures: u32,
    phase: CyclePhase,
}

impl CycleOrchestrator {
    pub fn new(reader: BoundedReader, dispatcher: Dispatcher, settings: ReadSettings) -> Self {
        Self {
            reader,
            dispatcher,
            settings,
            relay: None,
            failures: 0,
            phase: CyclePhase::Idle,
        }
    }

    pub fn with_relay(mut self, relay: RelayReset) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn recovery_state(&self) -> Option<RecoveryState> {
        self.relay.as_ref().map(|r| r.state())
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.phase = CyclePhase::Reading;
        tracing::info!(sensor = %self.settings.kind, pin = self.settings.pin, "Fetching");

        let reading = match self.reader.read_with(&self.settings).await {
            Ok(reading) => reading,
            Err(e) => return self.recover(e).await,
        };
        tracing::info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            "Got data"
        );

        self.phase = CyclePhase::Reporting;
        match self.dispatcher.dispatch(&reading).await {
            Ok(report) => {
                if self.failures > 0 {
                    tracing::info!(previous_failures = self.failures, "Recovered");
                }
                self.failures = 0;
                self.phase = CyclePhase::Idle;
                CycleOutcome::Reported(report)
            }
            Err(e) => self.recover(e).await,
        }
    }

    async fn recover(&mut self, error: ClimateError) -> CycleOutcome {
        self.phase = CyclePhase::Recovering;
        self.failures = self.failures.saturating_add(1);
        let failures = self.failures;
        tracing::error!(failures, error = %error, "Cycle failed");

        let relay_reset = match self.relay.as_mut() {
            Some(relay) => relay.maybe_reset(failures).await,
            None => false,
        };
        if relay_reset {
            self.failures = 0;
        }

        self.phase = CyclePhase::Idle;
        CycleOutcome::Failed {
            error,
            failures,
            relay_reset,
        }
    }

    /// Release hardware; the relay ends up powering the sensor
    pub fn shutdown(&mut self) {
        if let Some(relay) = self.relay.as_mut() {
            relay.release();
        }
        self.phase = CyclePhase::Idle;
    }
}

impl ScheduledTask for CycleOrchestrator {
    fn name(&self) -> &'static str {
        "read-report-cycle"
    }

    fn tick(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.run_cycle().await;
        })
    }

    fn shutdown(&mut self) {
        CycleOrchestrator::shutdown(self);
    }
}
