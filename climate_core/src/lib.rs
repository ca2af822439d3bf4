//! # Climate Core
//!
//! Periodically samples a DHT temperature/humidity sensor and reports the
//! readings to a remote HTTP API.
//!
//! - **Bounded read**: every sensor read races a timeout; first resolution wins
//! - **Dispatch**: one JSON `POST {api}/command` per successful read, no retries
//! - **Recovery**: after repeated failures the sensor is power-cycled through a relay
//! - **Scheduling**: fixed interval or cron pattern, one cycle at a time
//!
//! ## Quick Start
//!
//! ```no_run
//! use climate_core::{
//!     shutdown_channel, BoundedReader, CycleOrchestrator, Dispatcher, HttpTransport,
//!     Location, ReadSettings, Schedule, Scheduler, SensorKind, SimulatedSensor, TokioClock,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> climate_core::ClimateResult<()> {
//! let reader = BoundedReader::new(Arc::new(SimulatedSensor::randomized()), Arc::new(TokioClock));
//! let transport = HttpTransport::new("http://localhost:3000", Duration::from_secs(10))?;
//! let dispatcher = Dispatcher::new(Arc::new(transport), Location::new("lab", None));
//! let settings = ReadSettings { kind: SensorKind::Dht22, pin: 4, timeout: Duration::from_secs(5) };
//!
//! let mut cycle = CycleOrchestrator::new(reader, dispatcher, settings);
//! let (_trigger, signal) = shutdown_channel();
//! Scheduler::new(Schedule::parse_cron("* * * * *")?, signal)
//!     .run(&mut cycle)
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod bounded_read;
pub mod clock;
pub mod cycle;
pub mod dispatch;
pub mod error;
pub mod reading;
pub mod recovery;
pub mod relay;
pub mod scheduling;
pub mod sensor;

pub use bounded_read::{BoundedReader, ReadSettings};
pub use clock::{Clock, ManualClock, TokioClock};
pub use cycle::{CycleOrchestrator, CycleOutcome, CyclePhase};
pub use dispatch::{Dispatcher, HttpTransport, Transport};
pub use error::{ClimateError, ClimateResult};
pub use reading::{Command, Location, Reading, Report};
pub use recovery::{RecoveryState, RelayReset, RelaySettings};
pub use relay::{GpioRelay, RelayLevel, RelayLine, SimulatedRelay};
pub use scheduling::{
    shutdown_channel, Schedule, ScheduledTask, Scheduler, SchedulerReport, ShutdownSignal,
    ShutdownTrigger,
};
pub use sensor::{DhtSensor, SensorDriver, SensorKind, SimulatedSensor};
