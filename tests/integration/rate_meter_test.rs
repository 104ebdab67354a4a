use std::sync::Arc;
use std::thread;
use std::time::Duration;

use perfmon::core::config::{MonitorConfig, RateSettings};
use perfmon::core::perf_monitor::{
    Clock, Collaborators, ManualClock, PerformanceMonitor, RateMeter, RatePhase, ResourceSampler,
    SystemClock,
};
use perfmon::core::scheduler::{Scheduler, TokioScheduler};
use perfmon::core::LogSink;

fn meter(tick_ms: u64, window_secs: u64) -> (RateMeter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let settings = RateSettings {
        tick_interval: Duration::from_millis(tick_ms),
        window: Duration::from_secs(window_secs),
    };
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    (RateMeter::new(settings, clock_dyn), clock)
}

fn drive(meter: &mut RateMeter, clock: &ManualClock, spacing: Duration, count: usize) {
    for _ in 0..count {
        clock.advance(spacing);
        meter.on_tick();
    }
}

#[test]
fn test_rate_converges_to_tick_frequency() {
    for spacing_ms in [10u64, 20, 40, 50, 100, 250] {
        let (mut meter, clock) = meter(50, 5);
        meter.start();

        let spacing = Duration::from_millis(spacing_ms);
        // Three full windows plus the opening tick.
        let per_window = (5_000 / spacing_ms) as usize;
        drive(&mut meter, &clock, spacing, 1 + per_window * 3);

        let expected = 1_000.0 / spacing_ms as f64;
        let snapshot = meter.reader().snapshot();
        assert_eq!(snapshot.phase, RatePhase::Measured);
        assert!(
            (snapshot.rate - expected).abs() < 1e-6,
            "spacing {}ms: got {}, expected {}",
            spacing_ms,
            snapshot.rate,
            expected
        );
    }
}

#[test]
fn test_uneven_window_uses_actual_elapsed_time() {
    let (mut meter, clock) = meter(50, 5);
    meter.start();

    // Opening tick at 3s, then two ticks; the window closes 6s after it opened.
    drive(&mut meter, &clock, Duration::from_secs(3), 3);

    assert!((meter.current_rate() - 2.0 / 6.0).abs() < 1e-9);
}

#[test]
fn test_rate_is_never_nan_or_negative() {
    let (mut meter, clock) = meter(50, 1);
    let reader = meter.reader();

    assert!(reader.current_rate().is_finite());
    meter.start();

    for step in 0..200u64 {
        if step % 17 == 0 {
            clock.rewind(Duration::from_millis(300));
        } else {
            clock.advance(Duration::from_millis(step % 7 * 20));
        }
        meter.on_tick();

        let rate = reader.current_rate();
        assert!(rate.is_finite() && rate >= 0.0, "step {}: {}", step, rate);
    }
}

#[test]
fn test_reader_sees_published_values_from_other_thread() {
    let (mut meter, clock) = meter(50, 5);
    let reader = meter.reader();
    meter.start();
    drive(&mut meter, &clock, Duration::from_millis(100), 51);

    let handle = thread::spawn(move || reader.snapshot());
    let snapshot = handle.join().unwrap();

    assert_eq!(snapshot.phase, RatePhase::Measured);
    assert!((snapshot.rate - 10.0).abs() < 1e-9);
}

#[test]
fn test_reconfigure_restarts_running_meter() {
    let (mut meter, clock) = meter(50, 5);
    meter.start();
    drive(&mut meter, &clock, Duration::from_millis(100), 51);

    meter.reconfigure(RateSettings {
        tick_interval: Duration::from_millis(100),
        window: Duration::from_secs(2),
    });

    let snapshot = meter.reader().snapshot();
    assert_eq!(snapshot.phase, RatePhase::Warmup);
    assert_eq!(snapshot.rate, 10.0);
    assert!(meter.is_running());
}

#[test]
fn test_tokio_scheduler_drives_monitor() {
    let config = MonitorConfig {
        show_memory: false,
        show_disk: false,
        show_last_restart: false,
        tick_interval_ms: 10,
        rate_window_secs: 1,
        report_interval_secs: 0,
        ..Default::default()
    };

    let scheduler = Arc::new(TokioScheduler::new().unwrap());
    let scheduler_dyn: Arc<dyn Scheduler> = scheduler.clone();
    let monitor = PerformanceMonitor::new(
        config,
        Collaborators {
            clock: Arc::new(SystemClock),
            scheduler: scheduler_dyn,
            sink: Arc::new(LogSink),
            sampler: ResourceSampler::new(),
        },
    )
    .unwrap();

    monitor.start().unwrap();
    assert_eq!(scheduler.active_tasks(), 2);

    let queries = monitor.queries();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while queries.rate_snapshot().phase != RatePhase::Measured
        && std::time::Instant::now() < deadline
    {
        thread::sleep(Duration::from_millis(50));
    }

    let snapshot = queries.rate_snapshot();
    assert_eq!(snapshot.phase, RatePhase::Measured);
    assert!(snapshot.rate > 0.0 && snapshot.rate <= 110.0, "rate {}", snapshot.rate);

    monitor.shutdown();
    assert_eq!(scheduler.active_tasks(), 0);
}
