//! Tests for tick sources

use prometheus_task_loop::util::{Clock, ManualClock, MonotonicClock};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_monotonic_clock_never_goes_backwards() {
    let clock = MonotonicClock::new();
    let mut last = clock.now_ms();
    for _ in 0..1_000 {
        let now = clock.now_ms();
        assert!(now >= last);
        last = now;
    }
}

#[test]
fn test_monotonic_clock_tracks_sleep() {
    let clock = MonotonicClock::new();
    let before = clock.now_ms();
    thread::sleep(Duration::from_millis(20));
    assert!(clock.now_ms() - before >= 19);
}

#[test]
fn test_manual_clock_is_shared_through_trait_object() {
    let manual = Arc::new(ManualClock::new(500));
    let clock: Arc<dyn Clock> = manual.clone();

    manual.advance(250);
    assert_eq!(clock.now_ms(), 750);

    manual.set(100);
    assert_eq!(clock.now_ms(), 750);

    manual.set(1_000);
    assert_eq!(clock.now_ms(), 1_000);
}
