// Shared fakes for the integration tests
#![allow(dead_code)]

use climate_core::{
    BoundedReader, ClimateError, ClimateResult, Command, CycleOrchestrator, Dispatcher, Location,
    ReadSettings, Reading, RelayLevel, RelayLine, RelayReset, RelaySettings, SensorDriver,
    SensorKind, TokioClock, Transport,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const READ_TIMEOUT: Duration = Duration::from_millis(100);
pub const RESET_TIME: Duration = Duration::from_millis(5000);

/// One scripted sensor response
#[derive(Debug, Clone)]
pub struct Step {
    pub latency: Duration,
    pub outcome: Result<Reading, String>,
}

impl Step {
    pub fn ok(latency_ms: u64, temperature: f64, humidity: f64) -> Self {
        Self {
            latency: Duration::from_millis(latency_ms),
            outcome: Ok(Reading::new(temperature, humidity)),
        }
    }

    pub fn slow(latency_ms: u64) -> Self {
        Self::ok(latency_ms, 20.0, 50.0)
    }

    pub fn fail(latency_ms: u64, reason: &str) -> Self {
        Self {
            latency: Duration::from_millis(latency_ms),
            outcome: Err(reason.to_string()),
        }
    }
}

/// Sensor that plays back a queue of steps, then repeats a default reading
#[derive(Clone, Default)]
pub struct ScriptedSensor {
    steps: Arc<Mutex<VecDeque<Step>>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSensor {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            reads: Arc::default(),
        }
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().push_back(step);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SensorDriver for ScriptedSensor {
    fn read(&self, _kind: SensorKind, _pin: u8) -> BoxFuture<'static, ClimateResult<Reading>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| Step::ok(0, 20.0, 50.0));

        Box::pin(async move {
            tokio::time::sleep(step.latency).await;
            step.outcome.map_err(ClimateError::read)
        })
    }
}

/// Transport that records every command and can be told to fail
#[derive(Clone, Default)]
pub struct RecordingTransport {
    commands: Arc<Mutex<Vec<Command>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub fn sent(&self) -> usize {
        self.commands.lock().len()
    }
}

impl Transport for RecordingTransport {
    fn post_command(&self, command: Command) -> BoxFuture<'static, ClimateResult<()>> {
        let failing = self.failing.load(Ordering::SeqCst);
        self.commands.lock().push(command);
        Box::pin(async move {
            if failing {
                Err(ClimateError::send("HTTP 503 Service Unavailable"))
            } else {
                Ok(())
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Write(RelayLevel),
    Release,
}

/// Relay line that timestamps every transition on the tokio clock
#[derive(Clone, Default)]
pub struct RecordingRelay {
    events: Arc<Mutex<Vec<(RelayEvent, Instant)>>>,
}

impl RecordingRelay {
    pub fn events(&self) -> Vec<RelayEvent> {
        self.events.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn timeline(&self) -> Vec<(RelayEvent, Instant)> {
        self.events.lock().clone()
    }
}

impl RelayLine for RecordingRelay {
    fn write(&mut self, level: RelayLevel) -> ClimateResult<()> {
        self.events
            .lock()
            .push((RelayEvent::Write(level), Instant::now()));
        Ok(())
    }

    fn release(&mut self) {
        self.events.lock().push((RelayEvent::Release, Instant::now()));
    }
}

pub struct Harness {
    pub sensor: ScriptedSensor,
    pub transport: RecordingTransport,
    pub relay: Option<RecordingRelay>,
    pub cycle: CycleOrchestrator,
}

pub fn settings() -> ReadSettings {
    ReadSettings {
        kind: SensorKind::Dht22,
        pin: 4,
        timeout: READ_TIMEOUT,
    }
}

/// Orchestrator wired to fakes; `threshold` of `None` means no relay
pub fn harness(steps: impl IntoIterator<Item = Step>, threshold: Option<u32>) -> Harness {
    let sensor = ScriptedSensor::new(steps);
    let transport = RecordingTransport::default();

    let reader = BoundedReader::new(Arc::new(sensor.clone()), Arc::new(TokioClock));
    let dispatcher = Dispatcher::new(
        Arc::new(transport.clone()),
        Location::new("greenhouse-1", Some("Greenhouse".to_string())),
    );
    let mut cycle = CycleOrchestrator::new(reader, dispatcher, settings());

    let relay = threshold.map(|_| RecordingRelay::default());
    if let (Some(line), Some(threshold)) = (&relay, threshold) {
        let reset = RelayReset::new(
            Box::new(line.clone()),
            RelaySettings {
                reset_time: RESET_TIME,
                threshold,
            },
            Arc::new(TokioClock),
        );
        cycle = cycle.with_relay(reset);
    }

    Harness {
        sensor,
        transport,
        relay,
        cycle,
    }
}
