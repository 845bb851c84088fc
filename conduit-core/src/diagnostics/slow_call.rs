//! Slow-call tracking.

use std::panic::Location;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

/// A single call that exceeded the tracker's threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlowCall {
    /// What was being computed.
    pub details: String,
    /// Source location that constructed the measured computation.
    pub origin: String,
    /// Wall-clock time the call took.
    pub elapsed_micros: u64,
    /// Type name of the value the call produced.
    pub value_type: &'static str,
}

/// Records calls that take longer than a threshold.
#[derive(Debug)]
pub struct SlowCallTracker {
    threshold: Duration,
    reports: Mutex<Vec<SlowCall>>,
}

impl SlowCallTracker {
    /// Create a tracker reporting calls slower than `threshold`.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            reports: Mutex::new(Vec::new()),
        }
    }

    /// The reporting threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Run `call`, recording a report if it exceeds the threshold.
    pub fn measure<R>(
        &self,
        details: &str,
        origin: &'static Location<'static>,
        call: impl FnOnce() -> R,
    ) -> R {
        let start = Instant::now();
        let ret = call();
        let elapsed = start.elapsed();

        if elapsed > self.threshold {
            let report = SlowCall {
                details: details.to_string(),
                origin: origin.to_string(),
                elapsed_micros: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                value_type: std::any::type_name::<R>(),
            };
            warn!(
                details = %report.details,
                origin = %report.origin,
                elapsed_micros = report.elapsed_micros,
                "slow operation detected"
            );
            self.reports.lock().push(report);
        }

        ret
    }

    /// Snapshot of every report recorded so far.
    pub fn reports(&self) -> Vec<SlowCall> {
        self.reports.lock().clone()
    }

    /// Drop all recorded reports.
    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

/// Time `call` if a tracker is installed, otherwise just run it.
pub(crate) fn measure<R>(
    tracker: Option<&SlowCallTracker>,
    details: &str,
    origin: &'static Location<'static>,
    call: impl FnOnce() -> R,
) -> R {
    match tracker {
        Some(tracker) => tracker.measure(details, origin, call),
        None => call(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fast_calls_are_not_reported() {
        let tracker = SlowCallTracker::new(Duration::from_secs(10));
        let value = tracker.measure("quick", Location::caller(), || 1 + 1);

        assert_eq!(value, 2);
        assert!(tracker.reports().is_empty());
    }

    #[test]
    fn slow_calls_are_reported() {
        let tracker = SlowCallTracker::new(Duration::from_millis(1));
        let value = tracker.measure("sleepy", Location::caller(), || {
            thread::sleep(Duration::from_millis(5));
            "done"
        });

        assert_eq!(value, "done");
        let reports = tracker.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].details, "sleepy");
        assert_eq!(reports[0].value_type, "&str");
        assert!(reports[0].elapsed_micros >= 5_000);
        assert!(reports[0].origin.contains("slow_call.rs"));

        tracker.clear();
        assert!(tracker.reports().is_empty());
    }

    #[test]
    fn measure_without_tracker_is_a_plain_call() {
        let value = measure(None, "untracked", Location::caller(), || 42);
        assert_eq!(value, 42);
    }
}
