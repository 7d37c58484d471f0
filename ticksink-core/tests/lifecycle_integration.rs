// Lifecycle integration tests
//
// Drive the controller through a mock session with millisecond backoff and
// check the attempt budget, the spacing between attempts and recovery.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use ticksink_core::feed::ItemUpdate;
use ticksink_core::lifecycle::{BackoffConfig, LifecyclePhase, ShutdownSignal, SubscriptionController};
use ticksink_core::monitoring::MetricsRegistry;
use ticksink_core::testing::{MockSession, RecordingSink};
use ticksink_core::{Instrument, InstrumentRegistry, LifecycleError, UpdateDispatcher};

struct Harness {
    controller: Arc<SubscriptionController>,
    session: Arc<MockSession>,
    sink: Arc<RecordingSink>,
    metrics: MetricsRegistry,
}

fn harness(config: BackoffConfig) -> Result<Harness> {
    let registry = Arc::new(InstrumentRegistry::build(vec![
        Instrument::new("CS.D.EURUSD.CFD.IP"),
        Instrument::new("CS.D.GBPUSD.CFD.IP"),
    ])?);
    let sink = Arc::new(RecordingSink::new());
    let metrics = MetricsRegistry::new()?;
    let dispatcher = Arc::new(UpdateDispatcher::new(registry, sink.clone(), metrics.clone()));
    let controller = SubscriptionController::new(dispatcher, config, ShutdownSignal::new(), metrics.clone());

    Ok(Harness {
        controller,
        session: Arc::new(MockSession::new()),
        sink,
        metrics,
    })
}

fn eurusd(timestamp_ms: u64) -> ItemUpdate {
    ItemUpdate::new("CHART:CS.D.EURUSD.CFD.IP:TICK")
        .with_field("UTM", timestamp_ms.to_string().as_str())
        .with_field("BID", "1.0950")
        .with_field("OFR", "1.0952")
}

fn ms_config(max_attempts: u32) -> BackoffConfig {
    BackoffConfig {
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        multiplier: 2.0,
        max_attempts,
        jitter_factor: 0.0,
    }
}

#[test]
fn test_attempt_budget_is_exact() -> Result<()> {
    let h = harness(ms_config(4))?;
    h.controller.start(h.session.clone())?;
    h.session.fail_next(u32::MAX);

    h.session.drop_subscription();

    assert_eq!(h.controller.phase(), LifecyclePhase::Exhausted);
    // Initial subscribe plus exactly four retries
    assert_eq!(h.session.subscribe_count(), 5);
    assert_eq!(h.metrics.lifecycle().subscribe_attempts.get(), 4);
    assert_eq!(h.metrics.lifecycle().subscribe_failures.get(), 4);
    assert_eq!(h.controller.resubscribe_state().attempt_count(), 4);

    // Nothing further happens on its own
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(h.session.subscribe_count(), 5);
    Ok(())
}

#[test]
fn test_attempts_are_spaced_by_growing_capped_delays() -> Result<()> {
    let h = harness(ms_config(4))?;
    h.controller.start(h.session.clone())?;
    h.session.fail_next(u32::MAX);

    let dropped_at = Instant::now();
    h.session.drop_subscription();

    let times = h.session.subscribe_times();
    assert_eq!(times.len(), 5);

    let mut previous = dropped_at;
    let expected = [5u64, 10, 20, 20];
    for (attempt, (at, min_ms)) in times[1..].iter().zip(expected).enumerate() {
        let gap = at.duration_since(previous);
        assert!(
            gap >= Duration::from_millis(min_ms),
            "attempt {} came after {:?}, expected at least {}ms",
            attempt + 1,
            gap,
            min_ms
        );
        previous = *at;
    }
    Ok(())
}

#[test]
fn test_recovery_resets_budget() -> Result<()> {
    let h = harness(ms_config(3))?;
    h.controller.start(h.session.clone())?;

    // Two failures, then success
    h.session.fail_next(2);
    h.session.drop_subscription();

    assert_eq!(h.controller.phase(), LifecyclePhase::Subscribed);
    assert_eq!(h.controller.resubscribe_state().attempt_count(), 0);
    assert_eq!(h.controller.resubscribe_state().current_delay(), Duration::from_millis(5));
    assert_eq!(h.session.subscribe_count(), 4);

    // A second loss gets the full budget again
    h.session.fail_next(2);
    h.session.drop_subscription();
    assert_eq!(h.controller.phase(), LifecyclePhase::Subscribed);
    assert_eq!(h.session.subscribe_count(), 7);

    let state = h.controller.state();
    assert_eq!(state.data().unsubscribe_count, 2);

    assert!(h.session.deliver(&eurusd(1_700_000_000_000)));
    assert_eq!(h.sink.points().len(), 1);
    Ok(())
}

#[test]
fn test_updates_survive_resubscription() -> Result<()> {
    let h = harness(ms_config(5))?;
    h.controller.start(h.session.clone())?;
    let first = h.session.active().expect("subscribed");

    h.session.deliver(&eurusd(1));
    h.session.drop_subscription();
    h.session.deliver(&eurusd(2));

    // Late callback from the first subscription
    first.listener().on_item_update(&eurusd(3));

    let timestamps: Vec<u64> = h.sink.points().iter().map(|p| p.timestamp_ms).collect();
    assert_eq!(timestamps, vec![1, 2]);
    assert_eq!(h.metrics.lifecycle().stale_callbacks.get(), 1);
    Ok(())
}

#[test]
fn test_manual_reset_after_exhaustion() -> Result<()> {
    let h = harness(ms_config(2))?;
    h.controller.start(h.session.clone())?;
    h.session.fail_next(2);
    h.session.drop_subscription();
    assert_eq!(h.controller.phase(), LifecyclePhase::Exhausted);

    h.controller.reset()?;

    assert_eq!(h.controller.phase(), LifecyclePhase::Subscribed);
    assert_eq!(h.session.subscribe_count(), 4);
    assert!(h.session.deliver(&eurusd(10)));
    assert_eq!(h.sink.points().len(), 1);
    Ok(())
}

#[test]
fn test_shutdown_during_backoff_from_another_thread() -> Result<()> {
    let h = harness(BackoffConfig {
        base_delay: Duration::from_secs(20),
        max_delay: Duration::from_secs(60),
        ..BackoffConfig::default()
    })?;
    h.controller.start(h.session.clone())?;

    let session = h.session.clone();
    let feed_thread = std::thread::spawn(move || session.drop_subscription());

    let deadline = Instant::now() + Duration::from_secs(5);
    while h.controller.phase() != LifecyclePhase::Reconnecting && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(h.controller.phase(), LifecyclePhase::Reconnecting);

    let started = Instant::now();
    h.controller.shutdown();
    assert!(feed_thread.join().is_ok());

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(h.controller.phase(), LifecyclePhase::Stopped);
    assert_eq!(h.session.subscribe_count(), 1);
    assert_eq!(h.controller.reset(), Err(LifecycleError::ShuttingDown));
    Ok(())
}
