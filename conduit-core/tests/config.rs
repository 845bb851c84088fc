//! Process-wide configuration.
//!
//! Kept in its own test binary, and in a single test, because it mutates
//! global state that the other tests rely on being at its defaults.

use std::thread;
use std::time::Duration;

use conduit_core::config::{self, Config};
use conduit_core::reactive::{CellOptions, Listenable, ValueCell};

#[test]
fn configuration_is_injected_at_construction() {
    config::reset();
    assert_eq!(config::current(), Config::default());
    assert!(config::slow_call_report().is_none());

    // Built before any tracker exists: never measured.
    let untracked = ValueCell::new(1);

    config::configure(Config::from_json(r#"{ "slow_call_threshold_ms": 1 }"#).unwrap());
    assert_eq!(config::current().slow_call_threshold_ms, Some(1));

    let tracked = ValueCell::new(1);
    let slow = |v: &i32| {
        thread::sleep(Duration::from_millis(3));
        Some(*v)
    };

    let _a = untracked.pipe(slow).listen(|_| {});
    assert!(config::slow_call_report().unwrap().is_empty());

    let _b = tracked.pipe(slow).listen(|_| {});
    let reports = config::slow_call_report().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].details, "pipe transform");
    assert!(reports[0].origin.contains("config.rs"));

    // With a zero threshold every measured call is reported, so anything
    // built from detached options must stay out of the report entirely.
    config::configure(Config {
        slow_call_threshold_ms: Some(0),
        ..Config::default()
    });
    let detached = ValueCell::with_options(Some(0), CellOptions::detached());
    let _c = detached.distinct().listen(|_| {});
    let _d = detached.map(|v| v + 1).listen(|_| {});
    for v in 1..50 {
        detached.set(v);
    }
    assert!(config::slow_call_report().unwrap().is_empty());

    config::reset();
    assert!(config::slow_call_report().is_none());
}
