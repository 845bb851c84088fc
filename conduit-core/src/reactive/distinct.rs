//! Distinctness filtering.
//!
//! [`IgnoreRepeats`] is a stateful pipe transform that drops a value when it
//! matches the last value it let through. What "matches" means is a
//! [`Distinction`]: a comparator plus a copy function used to snapshot the
//! accepted value, so later in-place changes to the emitted value cannot leak
//! into the cache.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::cell::CellValue;
use crate::config;
use crate::diagnostics::{measure, SlowCallTracker};

/// A comparison strategy for [`IgnoreRepeats`].
pub struct Distinction<T> {
    comparator: Arc<dyn Fn(&T, &T) -> bool + Send + Sync>,
    copy: Arc<dyn Fn(&T) -> T + Send + Sync>,
}

impl<T> Distinction<T> {
    /// Build a strategy from a comparator and a copy function.
    ///
    /// `comparator(cached, input)` returns `true` when `input` should be
    /// dropped as a repeat of `cached`.
    pub fn new<C, P>(comparator: C, copy: P) -> Self
    where
        C: Fn(&T, &T) -> bool + Send + Sync + 'static,
        P: Fn(&T) -> T + Send + Sync + 'static,
    {
        Self {
            comparator: Arc::new(comparator),
            copy: Arc::new(copy),
        }
    }

    /// Whether `input` repeats `cached`.
    pub fn same(&self, cached: &T, input: &T) -> bool {
        (self.comparator)(cached, input)
    }

    /// Snapshot `value` for caching.
    pub fn copy(&self, value: &T) -> T {
        (self.copy)(value)
    }
}

impl<T: PartialEq + Clone + 'static> Distinction<T> {
    /// `PartialEq` comparison with `Clone` snapshots.
    pub fn structural() -> Self {
        Self::new(|a: &T, b: &T| a == b, T::clone)
    }
}

impl<T> Clone for Distinction<T> {
    fn clone(&self) -> Self {
        Self {
            comparator: Arc::clone(&self.comparator),
            copy: Arc::clone(&self.copy),
        }
    }
}

impl<T> fmt::Debug for Distinction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distinction").finish_non_exhaustive()
    }
}

const DISTINCT_DETAILS: &str = "ignore repeats";

/// Drops values that repeat the last accepted one.
pub struct IgnoreRepeats<T> {
    distinction: Distinction<T>,
    cached: Mutex<Option<T>>,
    tracker: Option<Arc<SlowCallTracker>>,
    origin: &'static Location<'static>,
}

impl<T: CellValue> IgnoreRepeats<T> {
    /// Create a filter using `distinction`.
    ///
    /// Comparisons are measured by the process-wide slow-call tracker, if one
    /// is configured.
    #[track_caller]
    pub fn new(distinction: Distinction<T>) -> Self {
        Self::tracked(distinction, config::active().tracker)
    }

    #[track_caller]
    fn tracked(distinction: Distinction<T>, tracker: Option<Arc<SlowCallTracker>>) -> Self {
        Self {
            distinction,
            cached: Mutex::new(None),
            tracker,
            origin: Location::caller(),
        }
    }

    /// Measure comparisons with `tracker` instead of the configured one.
    pub fn with_tracker(mut self, tracker: Option<Arc<SlowCallTracker>>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Pass `input` through unless it repeats the cached value.
    pub fn check(&self, input: &T) -> Option<T> {
        measure(self.tracker.as_deref(), DISTINCT_DETAILS, self.origin, || {
            // The cache is taken out so user code never runs under the lock.
            let previous = self.cached.lock().take();
            match previous {
                Some(previous) if self.distinction.same(&previous, input) => {
                    *self.cached.lock() = Some(previous);
                    None
                }
                _ => {
                    let snapshot = self.distinction.copy(input);
                    *self.cached.lock() = Some(snapshot);
                    Some(input.clone())
                }
            }
        })
    }

    /// Turn the filter into a pipe transform.
    pub fn into_transform(self) -> impl Fn(&T) -> Option<T> + Send + Sync + 'static {
        move |input: &T| self.check(input)
    }
}

/// A pipe transform that drops repeated values.
///
/// Uses the distinction registered for `T` with
/// [`config::set_default_distinction`], falling back to `PartialEq`.
/// Comparisons are measured by the process-wide slow-call tracker, if one is
/// configured.
#[track_caller]
pub fn ignore_repeats<T>() -> impl Fn(&T) -> Option<T> + Send + Sync + 'static
where
    T: CellValue + PartialEq,
{
    default_filter(config::active().tracker).into_transform()
}

/// The filter behind [`ignore_repeats`], measured by `tracker`.
#[track_caller]
pub(crate) fn default_filter<T>(tracker: Option<Arc<SlowCallTracker>>) -> IgnoreRepeats<T>
where
    T: CellValue + PartialEq,
{
    let distinction = config::default_distinction::<T>().unwrap_or_else(|| {
        trace!(
            value_type = std::any::type_name::<T>(),
            "no default distinction registered, comparing with PartialEq"
        );
        Distinction::structural()
    });
    IgnoreRepeats::tracked(distinction, tracker)
}

/// A pipe transform that drops values `distinction` considers repeats.
#[track_caller]
pub fn ignore_repeats_with<T: CellValue>(
    distinction: Distinction<T>,
) -> impl Fn(&T) -> Option<T> + Send + Sync + 'static {
    IgnoreRepeats::new(distinction).into_transform()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
