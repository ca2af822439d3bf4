//! Time source injected into every timed wait of a cycle.
//!
//! Production code uses [`TokioClock`]. Tests drive [`ManualClock`] by hand so
//! that races between the sensor and the timeout resolve deterministically.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Future that completes once `duration` has elapsed on this clock
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    wakers: Vec<Waker>,
}

/// Clock that only moves when [`ManualClock::advance`] is called.
///
/// Deadlines are fixed when `sleep` is called, not when the future is first
/// polled.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the clock was created
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Move time forward and wake every pending sleeper
    pub fn advance(&self, by: Duration) {
        let wakers = {
            let mut state = self.state.lock();
            state.now += by;
            std::mem::take(&mut state.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let deadline = self.now() + duration;
        Box::pin(ManualSleep {
            state: self.state.clone(),
            deadline,
        })
    }
}

struct ManualSleep {
    state: Arc<Mutex<ManualState>>,
    deadline: Duration,
}

impl Future for ManualSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.state.lock();
        if state.now >= self.deadline {
            Poll::Ready(())
        } else {
            state.wakers.push(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_manual_sleep_waits_for_advance() {
        let clock = ManualClock::new();
        let mut sleep = clock.sleep(Duration::from_millis(100));

        assert!((&mut sleep).now_or_never().is_none());
        clock.advance(Duration::from_millis(99));
        assert!((&mut sleep).now_or_never().is_none());
        clock.advance(Duration::from_millis(1));
        assert!(sleep.now_or_never().is_some());
        assert_eq!(clock.now(), Duration::from_millis(100));
    }

    #[test]
    fn test_deadline_fixed_at_creation() {
        let clock = ManualClock::new();
        let early = clock.sleep(Duration::from_millis(50));
        clock.advance(Duration::from_millis(40));
        let late = clock.sleep(Duration::from_millis(50));
        clock.advance(Duration::from_millis(10));

        assert!(early.now_or_never().is_some());
        assert!(late.now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps() {
        let start = tokio::time::Instant::now();
        TokioClock.sleep(Duration::from_secs(3)).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
