// End-to-end behaviour of the read -> report -> recover cycle
mod common;

use climate_core::{ClimateError, CycleOutcome, CyclePhase, RecoveryState, RelayLevel};
use common::{harness, RelayEvent, Step, RESET_TIME};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_read_within_timeout_is_reported() {
    let mut h = harness([Step::ok(50, 21.45, 48.04)], None);

    let outcome = h.cycle.run_cycle().await;

    let CycleOutcome::Reported(report) = outcome else {
        panic!("expected a report, got {:?}", outcome);
    };
    assert_eq!(report.temperature, "21.5");
    assert_eq!(report.humidity, "48.0");

    let commands = h.transport.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].name, "ClimateData.updateData");
    assert_eq!(commands[0].payload.location_id, "greenhouse-1");
    assert_eq!(commands[0].payload.location_name, "Greenhouse");
    assert_eq!(h.cycle.failures(), 0);
    assert_eq!(h.cycle.phase(), CyclePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_slow_read_times_out_without_reporting() {
    let mut h = harness([Step::slow(200)], None);
    let start = tokio::time::Instant::now();

    let outcome = h.cycle.run_cycle().await;

    match outcome {
        CycleOutcome::Failed {
            error: ClimateError::ReadTimeout(timeout),
            failures: 1,
            relay_reset: false,
        } => assert_eq!(timeout, Duration::from_millis(100)),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(start.elapsed(), Duration::from_millis(100));
    assert_eq!(h.transport.sent(), 0);
    assert_eq!(h.cycle.failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sensor_fault_counts_as_failure() {
    let mut h = harness([Step::fail(10, "checksum mismatch")], None);

    let outcome = h.cycle.run_cycle().await;

    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            error: ClimateError::Read { .. },
            failures: 1,
            ..
        }
    ));
    assert_eq!(h.transport.sent(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_three_timeouts_power_cycle_the_sensor() {
    let mut h = harness(
        [Step::slow(200), Step::slow(200), Step::slow(200)],
        Some(3),
    );
    let relay = h.relay.clone().unwrap();

    for expected in 1..=2 {
        let outcome = h.cycle.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::Failed { failures, relay_reset: false, .. } if failures == expected
        ));
        assert!(relay.events().is_empty());
    }

    let outcome = h.cycle.run_cycle().await;
    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            failures: 3,
            relay_reset: true,
            ..
        }
    ));

    let timeline = relay.timeline();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].0, RelayEvent::Write(RelayLevel::High));
    assert_eq!(timeline[1].0, RelayEvent::Write(RelayLevel::Low));
    assert_eq!(timeline[1].1 - timeline[0].1, RESET_TIME);

    assert_eq!(h.cycle.failures(), 0);
    assert_eq!(h.cycle.recovery_state(), Some(RecoveryState::Normal));
    assert_eq!(h.transport.sent(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_success_clears_failure_count() {
    let mut h = harness(
        [Step::slow(200), Step::slow(200), Step::ok(10, 19.0, 40.0)],
        Some(3),
    );

    h.cycle.run_cycle().await;
    h.cycle.run_cycle().await;
    assert_eq!(h.cycle.failures(), 2);

    assert!(h.cycle.run_cycle().await.is_reported());
    assert_eq!(h.cycle.failures(), 0);

    // Two more failures stay under the threshold again
    h.sensor.push(Step::slow(200));
    h.sensor.push(Step::slow(200));
    h.cycle.run_cycle().await;
    h.cycle.run_cycle().await;
    assert_eq!(h.cycle.failures(), 2);
    assert!(h.relay.as_ref().unwrap().events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_failure_counts_as_failure() {
    let mut h = harness([], None);
    h.transport.set_failing(true);

    let outcome = h.cycle.run_cycle().await;

    assert!(matches!(
        outcome,
        CycleOutcome::Failed {
            error: ClimateError::Send { .. },
            failures: 1,
            ..
        }
    ));
    // One attempt, no retry
    assert_eq!(h.transport.sent(), 1);

    h.transport.set_failing(false);
    assert!(h.cycle.run_cycle().await.is_reported());
    assert_eq!(h.cycle.failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_without_relay_failures_keep_counting() {
    let mut h = harness((0..5).map(|_| Step::slow(200)), None);

    for _ in 0..5 {
        h.cycle.run_cycle().await;
    }

    assert_eq!(h.cycle.failures(), 5);
    assert_eq!(h.cycle.recovery_state(), None);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_reset_restores_power() {
    let mut h = harness([Step::slow(200)], Some(1));
    let relay = h.relay.clone().unwrap();

    // Read times out at 100ms, the relay goes high, then the cycle is abandoned
    let abandoned = tokio::time::timeout(Duration::from_millis(150), h.cycle.run_cycle()).await;
    assert!(abandoned.is_err());
    assert_eq!(h.cycle.recovery_state(), Some(RecoveryState::Resetting));

    h.cycle.shutdown();
    assert_eq!(
        relay.events(),
        vec![
            RelayEvent::Write(RelayLevel::High),
            RelayEvent::Write(RelayLevel::Low),
            RelayEvent::Release,
        ]
    );

    // Releasing again is a no-op
    h.cycle.shutdown();
    assert_eq!(relay.events().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_when_idle_only_releases() {
    let mut h = harness([], Some(3));
    let relay = h.relay.clone().unwrap();

    h.cycle.run_cycle().await;
    h.cycle.shutdown();

    assert_eq!(relay.events(), vec![RelayEvent::Release]);
}
