//! Wires hardware and the cycle together, runs the scheduler on a worker
//! task and turns signals and worker faults into a shutdown.

use crate::config::Config;
use anyhow::{bail, Context};
use climate_core::sensor::SIMULATION_REFRESH;
use climate_core::{
    shutdown_channel, BoundedReader, Clock, CycleOrchestrator, DhtSensor, Dispatcher, GpioRelay,
    HttpTransport, RelayLine, RelayReset, Schedule, Scheduler, SchedulerReport, SensorDriver,
    SimulatedRelay, SimulatedSensor, TokioClock,
};
use std::future::Future;
use std::sync::Arc;

/// Run until SIGINT/SIGTERM. An error means the process should exit with 1.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let report = run_until(config, signalled()).await?;
    tracing::info!(
        cycles = report.cycles,
        skipped = report.skipped,
        interrupted = report.interrupted,
        "Shut down cleanly"
    );
    Ok(())
}

/// Build the cycle described by `config` and run it until `shutdown` resolves
pub async fn run_until<F>(config: Config, shutdown: F) -> anyhow::Result<SchedulerReport>
where
    F: Future<Output = ()> + Send + 'static,
{
    let schedule = config.schedule()?;
    let (cycle, simulation) = build_cycle(&config)?;

    let result = supervise(schedule, cycle, shutdown).await;

    if let Some(sensor) = simulation {
        sensor.stop();
    }
    result
}

/// The cycle plus the simulated sensor whose refresher must be stopped on exit
fn build_cycle(
    config: &Config,
) -> anyhow::Result<(CycleOrchestrator, Option<Arc<SimulatedSensor>>)> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let simulation = config.simulate.then(|| {
        let sensor = Arc::new(SimulatedSensor::randomized());
        sensor.start_refreshing(SIMULATION_REFRESH);
        sensor
    });
    let sensor: Arc<dyn SensorDriver> = match &simulation {
        Some(sensor) => {
            tracing::warn!("Simulation mode, sending random data");
            sensor.clone()
        }
        None => Arc::new(DhtSensor::new().context("failed to open sensor")?),
    };

    let transport = HttpTransport::new(&config.api_url, config.http_timeout())?;
    tracing::info!(url = %transport.endpoint(), "Reporting to API");

    let mut cycle = CycleOrchestrator::new(
        BoundedReader::new(sensor, clock.clone()),
        Dispatcher::new(Arc::new(transport), config.location()),
        config.read_settings(),
    );

    if let Some(pin) = config.relay_pin {
        let line: Box<dyn RelayLine> = if config.simulate {
            Box::new(SimulatedRelay::new(pin))
        } else {
            Box::new(GpioRelay::open(pin).context("failed to open relay")?)
        };
        let settings = config.relay_settings();
        tracing::info!(
            pin,
            threshold = settings.threshold,
            reset_ms = settings.reset_time.as_millis() as u64,
            "Relay reset enabled"
        );
        cycle = cycle.with_relay(RelayReset::new(line, settings, clock));
    }

    Ok((cycle, simulation))
}

/// Run `cycle` on a worker task. A panic in the worker unwinds through the
/// cycle, whose relay restores power on drop, and comes back as an error.
async fn supervise<F>(
    schedule: Schedule,
    mut cycle: CycleOrchestrator,
    shutdown: F,
) -> anyhow::Result<SchedulerReport>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (trigger, signal) = shutdown_channel();
    let forwarder = tokio::spawn(async move {
        shutdown.await;
        trigger.trigger();
    });

    let mut scheduler = Scheduler::new(schedule, signal);
    let joined = tokio::spawn(async move { scheduler.run(&mut cycle).await }).await;
    forwarder.abort();

    match joined {
        Ok(report) => Ok(report),
        Err(e) if e.is_panic() => bail!("cycle worker panicked"),
        Err(e) => bail!("cycle worker failed: {}", e),
    }
}

async fn signalled() {
    let name = shutdown_requested().await;
    tracing::info!("Got {}, terminating", name);
}

async fn shutdown_requested() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                ctrl_c().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        "SIGINT"
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}
