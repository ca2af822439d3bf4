pub mod schedule;
pub mod scheduler;
pub mod shutdown;

pub use schedule::Schedule;
pub use scheduler::{ScheduledTask, Scheduler, SchedulerReport};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
