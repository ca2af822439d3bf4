//! Cadences the scheduler can follow

use crate::error::{ClimateError, ClimateResult};
use chrono::{DateTime, TimeZone};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on missed cron triggers counted after an overrun
const MAX_CATCH_UP: u64 = 10_000;

#[derive(Clone)]
pub enum Schedule {
    /// Fire every `period`, first one period after start
    Interval(Duration),
    /// Fire whenever the cron pattern matches
    Cron {
        pattern: String,
        schedule: Box<cron::Schedule>,
    },
}

impl Schedule {
    pub fn interval(period: Duration) -> ClimateResult<Self> {
        if period.is_zero() {
            return Err(ClimateError::config("schedule interval must be greater than zero"));
        }
        Ok(Schedule::Interval(period))
    }

    /// Parse a 5-field (minute granularity) or 6/7-field (leading seconds)
    /// cron pattern
    pub fn parse_cron(pattern: &str) -> ClimateResult<Self> {
        let fields = pattern.split_whitespace().count();
        let normalized = match fields {
            5 => format!("0 {}", pattern.trim()),
            6 | 7 => pattern.trim().to_string(),
            n => {
                return Err(ClimateError::config(format!(
                    "cron pattern '{}' has {} fields, expected 5 or 6",
                    pattern, n
                )))
            }
        };

        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| {
            ClimateError::config(format!("invalid cron pattern '{}': {}", pattern, e))
        })?;

        Ok(Schedule::Cron {
            pattern: pattern.trim().to_string(),
            schedule: Box::new(schedule),
        })
    }

    /// First cron firing strictly after `after`; `None` for interval schedules
    /// or patterns that never match again
    pub fn next_cron_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Schedule::Interval(_) => None,
            Schedule::Cron { schedule, .. } => schedule.after(after).next(),
        }
    }

    /// Next cron firing at or after `now`, starting from the trigger that
    /// last fired, plus how many firings in between were missed
    pub fn cron_catch_up<Tz: TimeZone>(
        &self,
        last: &DateTime<Tz>,
        now: &DateTime<Tz>,
    ) -> Option<(DateTime<Tz>, u64)> {
        let Schedule::Cron { schedule, .. } = self else {
            return None;
        };

        let mut skipped = 0;
        for next in schedule.after(last) {
            if next >= *now {
                return Some((next, skipped));
            }
            skipped += 1;
            if skipped >= MAX_CATCH_UP {
                return schedule.after(now).next().map(|next| (next, skipped));
            }
        }
        None
    }
}

/// Offset of the next interval trigger from the one that last fired, given
/// how long ago that was, plus the number of triggers missed in between
pub fn interval_catch_up(since_last: Duration, period: Duration) -> (Duration, u64) {
    if since_last <= period {
        return (period, 0);
    }

    let behind = (since_last - period).as_nanos();
    let period_ns = period.as_nanos().max(1);
    let skipped = behind.div_ceil(period_ns);
    let offset_ns = period_ns * (skipped + 1);

    (
        Duration::from_nanos(offset_ns.min(u64::MAX as u128) as u64),
        skipped.min(u64::MAX as u128) as u64,
    )
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Interval(period) => f.debug_tuple("Interval").field(period).finish(),
            Schedule::Cron { pattern, .. } => f.debug_tuple("Cron").field(pattern).finish(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Interval(period) => write!(f, "every {}ms", period.as_millis()),
            Schedule::Cron { pattern, .. } => write!(f, "cron '{}'", pattern),
        }
    }
}
