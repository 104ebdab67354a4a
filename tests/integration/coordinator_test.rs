use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use perfmon::core::perf_monitor::{Metric, MonitorState, RatePhase};
use perfmon::core::scheduler::Scheduler;
use perfmon::MonitorError;

use super::support::Harness;

const TICK: Duration = Duration::from_millis(50);

#[test]
fn test_start_registers_heartbeat_and_sampling() {
    let h = Harness::new(|_| {});
    assert_eq!(h.monitor.state(), MonitorState::Disabled);
    assert_eq!(h.scheduler.active_tasks(), 0);

    h.monitor.start().unwrap();

    assert_eq!(h.monitor.state(), MonitorState::Active);
    assert_eq!(h.scheduler.active_tasks(), 2);

    let snapshot = h.monitor.queries().rate_snapshot();
    assert_eq!(snapshot.phase, RatePhase::Warmup);
    assert_eq!(snapshot.rate, 20.0);
}

#[test]
fn test_heartbeats_produce_measured_rate() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();

    // One tick opens the window, one hundred more fill five seconds.
    assert_eq!(h.heartbeats(TICK, 101), 101);

    let snapshot = h.monitor.queries().rate_snapshot();
    assert_eq!(snapshot.phase, RatePhase::Measured);
    assert!((snapshot.rate - 20.0).abs() < 1e-9);
}

#[test]
fn test_disabling_tps_cancels_heartbeat() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    h.heartbeats(TICK, 101);
    let measured = h.monitor.queries().current_rate();

    let mut config = h.config();
    config.show_tps = false;
    h.monitor.reload(config).unwrap();

    assert_eq!(h.monitor.state(), MonitorState::Active);
    assert_eq!(h.scheduler.active_tasks(), 1);
    assert_eq!(h.scheduler.fire_with_interval(TICK), 0);

    // Nothing left to drive the meter: the rate stays frozen.
    h.clock.advance(Duration::from_secs(30));
    h.scheduler.fire();
    let snapshot = h.monitor.queries().rate_snapshot();
    assert_eq!(snapshot.phase, RatePhase::Paused);
    assert_eq!(snapshot.rate, measured);

    let summary = h.monitor.report_now();
    assert!(!summary.includes(Metric::Tps));
}

#[test]
fn test_reenabling_tps_starts_fresh_window() {
    let h = Harness::new(|c| c.show_tps = false);
    h.monitor.start().unwrap();
    assert_eq!(h.scheduler.active_tasks(), 1);

    let mut config = h.config();
    config.show_tps = true;
    h.monitor.reload(config).unwrap();

    assert_eq!(h.scheduler.active_tasks(), 2);
    assert_eq!(h.monitor.queries().rate_snapshot().phase, RatePhase::Warmup);
}

#[test]
fn test_throttled_heartbeats_lower_the_rate() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();

    h.heartbeats(Duration::from_millis(100), 51);

    assert!((h.monitor.queries().current_rate() - 10.0).abs() < 1e-9);
}

#[test]
fn test_rate_threshold_alerts_once_per_crossing() {
    let h = Harness::new(|c| c.tps_warning_below = Some(15.0));
    h.monitor.start().unwrap();

    h.heartbeats(Duration::from_millis(100), 51);
    let alerts = h.sink.take();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("Tick rate dropped"));

    // Still slow: no repeat.
    h.heartbeats(Duration::from_millis(100), 50);
    assert!(h.sink.take().is_empty());

    h.heartbeats(TICK, 100);
    let alerts = h.sink.take();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("recovered"));
}

#[test]
fn test_memory_threshold_alert_on_sample() {
    let h = Harness::new(|c| c.memory_warning_percent = Some(90.0));
    h.monitor.start().unwrap();

    h.sample();
    assert!(h.sink.take().is_empty());

    h.probe.set_memory_used(950);
    h.sample();
    let alerts = h.sink.take();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].starts_with("Memory usage at 95.0%"));

    h.sample();
    assert!(h.sink.take().is_empty());
}

#[test]
fn test_failed_disk_sample_is_omitted_then_recovers() {
    let h = Harness::new(|c| {
        c.show_tps = false;
        c.show_memory = false;
        c.sample_interval_secs = 1;
        c.report_interval_secs = 1;
    });
    h.monitor.start().unwrap();

    h.probe.fail_disk(1);
    assert_eq!(h.sample(), 1);

    let summary = h.monitor.last_summary().unwrap();
    assert!(!summary.includes(Metric::Disk));
    assert_eq!(summary.unavailable, vec![Metric::Disk]);
    let messages = h.sink.take();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Uptime: "));
    assert!(!messages[0].contains("Disk"));

    h.sample();

    let summary = h.monitor.last_summary().unwrap();
    assert!(summary.includes(Metric::Disk));
    assert!(summary.unavailable.is_empty());
    let messages = h.sink.take();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Disk ("));
}

#[test]
fn test_failed_memory_sample_does_not_fail_report() {
    let h = Harness::new(|c| c.show_tps = false);
    h.monitor.start().unwrap();

    h.probe.fail_memory(1);
    let summary = h.monitor.report_now();

    assert_eq!(summary.unavailable, vec![Metric::Memory]);
    assert!(summary.includes(Metric::Disk));
    assert_eq!(h.sink.messages().len(), 1);
}

#[test]
fn test_scheduled_report_waits_for_interval() {
    let h = Harness::new(|c| {
        c.show_tps = false;
        c.report_interval_secs = 30;
    });
    h.monitor.start().unwrap();

    h.sample();
    h.sample();
    assert!(h.sink.messages().is_empty());

    h.sample();
    assert_eq!(h.sink.take().len(), 1);

    h.sample();
    assert!(h.sink.messages().is_empty());
}

#[test]
fn test_pause_keeps_values_and_resume_restarts_window() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    h.heartbeats(Duration::from_millis(100), 51);

    h.monitor.pause();
    assert_eq!(h.monitor.state(), MonitorState::Paused);
    assert_eq!(h.scheduler.active_tasks(), 0);

    let snapshot = h.monitor.queries().rate_snapshot();
    assert_eq!(snapshot.phase, RatePhase::Paused);
    assert!((snapshot.rate - 10.0).abs() < 1e-9);

    h.monitor.resume().unwrap();
    assert_eq!(h.monitor.state(), MonitorState::Active);
    assert_eq!(h.scheduler.active_tasks(), 2);

    let snapshot = h.monitor.queries().rate_snapshot();
    assert_eq!(snapshot.phase, RatePhase::Warmup);
    assert_eq!(snapshot.rate, 20.0);
}

#[test]
fn test_reload_while_paused_applies_on_resume() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    h.monitor.pause();

    let mut config = h.config();
    config.show_tps = false;
    h.monitor.reload(config).unwrap();
    assert_eq!(h.monitor.state(), MonitorState::Paused);
    assert_eq!(h.scheduler.active_tasks(), 0);

    h.monitor.resume().unwrap();
    assert_eq!(h.scheduler.active_tasks(), 1);
}

#[test]
fn test_invalid_reload_keeps_current_config() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    let before = h.config();

    let mut config = h.config();
    config.tick_interval_ms = 0;
    config.show_memory = false;
    let result = h.monitor.reload(config);

    assert!(matches!(result, Err(MonitorError::Config(_))));
    assert_eq!(h.config(), before);
    assert_eq!(h.monitor.state(), MonitorState::Active);
    assert_eq!(h.scheduler.active_tasks(), 2);
}

#[test]
fn test_nothing_enabled_stays_disabled_until_reload() {
    let h = Harness::new(|c| {
        c.show_tps = false;
        c.show_memory = false;
        c.show_disk = false;
        c.show_last_restart = false;
    });

    h.monitor.start().unwrap();
    assert_eq!(h.monitor.state(), MonitorState::Disabled);
    assert_eq!(h.scheduler.active_tasks(), 0);

    let mut config = h.config();
    config.show_memory = true;
    h.monitor.reload(config).unwrap();

    assert_eq!(h.monitor.state(), MonitorState::Active);
    assert_eq!(h.scheduler.active_tasks(), 1);

    let mut config = h.config();
    config.show_memory = false;
    h.monitor.reload(config).unwrap();
    assert_eq!(h.monitor.state(), MonitorState::Disabled);
    assert_eq!(h.scheduler.active_tasks(), 0);
}

#[test]
fn test_shutdown_is_final_until_started() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    h.monitor.shutdown();

    assert_eq!(h.monitor.state(), MonitorState::Disabled);
    assert_eq!(h.scheduler.active_tasks(), 0);

    h.monitor.reload(h.config()).unwrap();
    assert_eq!(h.monitor.state(), MonitorState::Disabled);

    h.monitor.start().unwrap();
    assert_eq!(h.monitor.state(), MonitorState::Active);
}

#[test]
fn test_login_status_and_unique_logins() {
    let h = Harness::new(|c| c.show_unique_logins = true);
    h.monitor.start().unwrap();

    h.monitor.on_login("alice");
    h.monitor.on_login("alice");
    let lines = h.monitor.on_login("bob");

    assert_eq!(h.monitor.queries().unique_logins(), 2);
    assert!(lines[0].starts_with("Server state (perfmon "));
    assert!(lines.iter().any(|l| l.starts_with("TPS: 20.00 (warming up)")));
    assert!(lines.iter().any(|l| l.starts_with("Last restart: ")));
    assert!(lines.iter().any(|l| l == "Unique logins: 2"));
    // Login lines go to the observer, not to everyone.
    assert!(h.sink.messages().is_empty());
}

#[test]
fn test_login_without_status_message() {
    let h = Harness::new(|c| c.status_message_upon_login = false);
    h.monitor.start().unwrap();

    assert!(h.monitor.on_login("alice").is_empty());
    assert_eq!(h.monitor.queries().unique_logins(), 0);
}

#[test]
fn test_disabling_unique_logins_resets_counter() {
    let h = Harness::new(|c| c.show_unique_logins = true);
    h.monitor.start().unwrap();
    h.monitor.on_login("alice");
    assert_eq!(h.monitor.queries().unique_logins(), 1);

    let mut config = h.config();
    config.show_unique_logins = false;
    h.monitor.reload(config).unwrap();

    assert_eq!(h.monitor.queries().unique_logins(), 0);
}

#[test]
fn test_uptime_survives_reload() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    h.clock.advance(Duration::from_secs(90));

    h.monitor.reload(h.config()).unwrap();
    h.clock.advance(Duration::from_secs(30));

    let queries = h.monitor.queries();
    assert_eq!(queries.uptime(), Duration::from_secs(120));
    assert!(queries.is_fresh_restart());
}

#[test]
fn test_dropping_monitor_cancels_callbacks() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    let scheduler = h.scheduler.clone();
    assert_eq!(scheduler.active_tasks(), 2);

    drop(h);
    assert_eq!(scheduler.active_tasks(), 0);
}

#[test]
fn test_slow_sampler_does_not_block_heartbeat() {
    let h = Harness::new(|_| {});
    h.monitor.start().unwrap();
    let sample_interval = h.config().sample_interval();
    let held = h.probe.hold_next_memory_read();

    let scheduler = Arc::clone(&h.scheduler);
    let sampling = thread::spawn(move || scheduler.fire_with_interval(sample_interval));
    held.entered.recv_timeout(Duration::from_secs(5)).unwrap();

    // The sampling callback is stuck reading memory; heartbeats must still get through.
    let (done_tx, done_rx) = mpsc::channel();
    let clock = Arc::clone(&h.clock);
    let scheduler = Arc::clone(&h.scheduler);
    let ticking = thread::spawn(move || {
        let mut delivered = 0;
        for _ in 0..101 {
            clock.advance(TICK);
            delivered += scheduler.fire_with_interval(TICK);
        }
        let _ = done_tx.send(delivered);
    });

    let delivered = done_rx.recv_timeout(Duration::from_secs(5));
    held.release.send(()).unwrap();
    ticking.join().unwrap();
    assert_eq!(sampling.join().unwrap(), 1);

    assert_eq!(delivered, Ok(101));
    let snapshot = h.monitor.queries().rate_snapshot();
    assert_eq!(snapshot.phase, RatePhase::Measured);
    assert!((snapshot.rate - 20.0).abs() < 1e-9);
    assert!(h.monitor.last_summary().is_some());
}

#[test]
fn test_callback_racing_pause_is_discarded() {
    let h = Harness::new(|c| c.memory_warning_percent = Some(90.0));
    h.monitor.start().unwrap();
    h.probe.set_memory_used(950);
    let sample_interval = h.config().sample_interval();
    let held = h.probe.hold_next_memory_read();

    let scheduler = Arc::clone(&h.scheduler);
    let stale = thread::spawn(move || scheduler.fire_with_interval(sample_interval));
    held.entered.recv_timeout(Duration::from_secs(5)).unwrap();

    // Re-registration while the old sampling callback is still in flight.
    h.monitor.pause();
    h.monitor.resume().unwrap();
    assert_eq!(h.scheduler.active_tasks(), 2);

    held.release.send(()).unwrap();
    assert_eq!(stale.join().unwrap(), 1);

    assert!(h.monitor.last_summary().is_none());
    assert!(h.sink.messages().is_empty());

    // The new registration still works.
    h.sample();
    assert!(h.monitor.last_summary().is_some());
    assert_eq!(h.sink.take().len(), 1);
}
