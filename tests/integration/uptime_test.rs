use std::sync::Arc;
use std::thread;
use std::time::Duration;

use perfmon::core::perf_monitor::{Clock, ManualClock, SystemClock, UptimeTracker};

#[test]
fn test_uptime_zero_before_start() {
    let tracker = UptimeTracker::new(Arc::new(SystemClock));

    assert!(!tracker.is_started());
    assert_eq!(tracker.elapsed(), Duration::ZERO);
    assert!(tracker.started_at_local().is_none());
    assert!(!tracker.is_fresh_restart());
}

#[test]
fn test_uptime_is_monotonic_on_system_clock() {
    let tracker = UptimeTracker::new(Arc::new(SystemClock));
    tracker.start();

    let mut previous = tracker.elapsed();
    for _ in 0..5 {
        thread::sleep(Duration::from_millis(5));
        let current = tracker.elapsed();
        assert!(current >= previous);
        previous = current;
    }
    assert!(previous >= Duration::from_millis(25));
}

#[test]
fn test_second_activation_is_not_fresh_restart() {
    let clock = Arc::new(ManualClock::new());
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let tracker = UptimeTracker::new(clock_dyn);

    tracker.start();
    assert!(tracker.is_fresh_restart());
    clock.advance(Duration::from_secs(60));

    tracker.start();
    assert!(!tracker.is_fresh_restart());
    // The original instant is kept.
    assert_eq!(tracker.elapsed(), Duration::from_secs(60));
}

#[test]
fn test_uptime_shared_across_threads() {
    let tracker = Arc::new(UptimeTracker::new(Arc::new(SystemClock)));
    tracker.start();
    let started = tracker.started_at();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                tracker.start();
                tracker.started_at()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), started);
    }
}
