use super::schedule::{interval_catch_up, Schedule};
use super::shutdown::ShutdownSignal;
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::time::Instant;

/// Unit of work fired by the [`Scheduler`]
pub trait ScheduledTask: Send {
    fn name(&self) -> &'static str;

    /// One firing; awaited to completion before the next trigger is considered
    fn tick(&mut self) -> BoxFuture<'_, ()>;

    /// Called once when the scheduler stops, including after an interrupted tick
    fn shutdown(&mut self) {}
}

/// Summary returned when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub cycles: u64,
    pub skipped: u64,
    /// Shutdown arrived while a tick was running
    pub interrupted: bool,
}

#[derive(Debug, Clone)]
struct Trigger {
    instant: Instant,
    wall: DateTime<Local>,
}

/// Single-worker scheduler.
///
/// Ticks never overlap: a trigger that comes due while a tick is still running
/// is skipped and reported in one warning once the tick finishes.
pub struct Scheduler {
    schedule: Schedule,
    shutdown: ShutdownSignal,
}

impl Scheduler {
    pub fn new(schedule: Schedule, shutdown: ShutdownSignal) -> Self {
        Self { schedule, shutdown }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Drive `task` until shutdown is requested
    pub async fn run(&mut self, task: &mut dyn ScheduledTask) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        tracing::info!(task = task.name(), schedule = %self.schedule, "Scheduler started");

        let mut next = match self.first_trigger() {
            Some(trigger) => trigger,
            None => {
                tracing::warn!(schedule = %self.schedule, "Schedule never fires");
                task.shutdown();
                return report;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                _ = tokio::time::sleep_until(next.instant) => {}
            }

            report.cycles += 1;
            tracing::debug!(task = task.name(), cycle = report.cycles, "Trigger fired");

            let completed = tokio::select! {
                biased;
                _ = self.shutdown.wait() => false,
                _ = task.tick() => true,
            };
            if !completed {
                tracing::warn!(task = task.name(), "Shutdown requested mid-cycle");
                report.interrupted = true;
                break;
            }

            match self.following(&next) {
                Some((upcoming, skipped)) => {
                    if skipped > 0 {
                        tracing::warn!(
                            task = task.name(),
                            skipped,
                            "Cycle overran its schedule, skipping triggers"
                        );
                        report.skipped += skipped;
                    }
                    next = upcoming;
                }
                None => {
                    tracing::warn!(schedule = %self.schedule, "Schedule has no further triggers");
                    break;
                }
            }
        }

        task.shutdown();
        tracing::info!(
            task = task.name(),
            cycles = report.cycles,
            skipped = report.skipped,
            "Scheduler stopped"
        );
        report
    }

    fn first_trigger(&self) -> Option<Trigger> {
        let instant = Instant::now();
        let wall = Local::now();

        match &self.schedule {
            Schedule::Interval(period) => Some(Trigger {
                instant: instant + *period,
                wall: wall + to_chrono(*period),
            }),
            Schedule::Cron { .. } => {
                let at = self.schedule.next_cron_after(&wall)?;
                Some(Trigger {
                    instant: instant + until(&wall, &at),
                    wall: at,
                })
            }
        }
    }

    fn following(&self, last: &Trigger) -> Option<(Trigger, u64)> {
        let instant = Instant::now();

        match &self.schedule {
            Schedule::Interval(period) => {
                let since_last = instant.saturating_duration_since(last.instant);
                let (offset, skipped) = interval_catch_up(since_last, *period);
                Some((
                    Trigger {
                        instant: last.instant + offset,
                        wall: last.wall + to_chrono(offset),
                    },
                    skipped,
                ))
            }
            Schedule::Cron { .. } => {
                let wall = Local::now();
                let (at, skipped) = self.schedule.cron_catch_up(&last.wall, &wall)?;
                Some((
                    Trigger {
                        instant: instant + until(&wall, &at),
                        wall: at,
                    },
                    skipped,
                ))
            }
        }
    }
}

fn until(now: &DateTime<Local>, at: &DateTime<Local>) -> Duration {
    (at.clone() - now.clone()).to_std().unwrap_or(Duration::ZERO)
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}
