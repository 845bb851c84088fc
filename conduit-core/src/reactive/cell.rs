//! Value Cell Implementation
//!
//! A ValueCell is the fundamental primitive. It holds the latest value and a
//! set of listeners.
//!
//! # How Cells Work
//!
//! 1. `listen` registers a callback and, unless asked to skip, immediately
//!    replays the current value to it.
//!
//! 2. `set`/`update` store a new value and synchronously notify every
//!    listener, in registration order.
//!
//! 3. When the last listener unsubscribes, the cell completes. Completion
//!    runs the cell's cleanup hook once; derived cells use that hook to
//!    unsubscribe from their source, which is how a chain of pipes collapses.
//!
//! # Locking
//!
//! State sits behind a `parking_lot::Mutex`, but the lock is never held while
//! user code runs. Listeners are snapshotted before delivery, so a listener
//! may freely call back into the cell (set, listen, unsubscribe). A nested
//! `set` runs to completion before the outer delivery continues.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::emitter::{Emitter, Listenable};
use super::listener::{Detach, Listener, ListenerId, Subscription};
use crate::config;
use crate::diagnostics::SlowCallTracker;

/// Bounds every value held by a cell must satisfy.
pub trait CellValue: Clone + Send + Sync + 'static {}

impl<T> CellValue for T where T: Clone + Send + Sync + 'static {}

/// Unique identifier for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Construction options for a cell.
#[derive(Debug, Clone)]
pub struct CellOptions {
    pub(crate) keep_alive: bool,
    pub(crate) label: Option<Arc<str>>,
    pub(crate) diagnostics: Option<Arc<SlowCallTracker>>,
    pub(crate) misuse_warnings: bool,
}

impl CellOptions {
    /// Options seeded from the process-wide configuration.
    pub fn new() -> Self {
        let active = config::active();
        Self {
            keep_alive: false,
            label: None,
            diagnostics: active.tracker,
            misuse_warnings: active.config.misuse_warnings,
        }
    }

    /// Options that ignore the process-wide configuration entirely.
    pub fn detached() -> Self {
        Self {
            keep_alive: false,
            label: None,
            diagnostics: None,
            misuse_warnings: true,
        }
    }

    /// Keep the cell alive when its last listener leaves.
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Name the cell in lifecycle logs.
    pub fn label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Measure transforms derived from this cell with `tracker`.
    pub fn diagnostics(mut self, tracker: Option<Arc<SlowCallTracker>>) -> Self {
        self.diagnostics = tracker;
        self
    }

    /// Toggle misuse warnings.
    pub fn misuse_warnings(mut self, enabled: bool) -> Self {
        self.misuse_warnings = enabled;
        self
    }

    /// Options for a cell derived from one with these options.
    pub(crate) fn derive(&self, keep_alive: bool, label: Option<Arc<str>>) -> Self {
        Self {
            keep_alive,
            label: label.or_else(|| self.label.clone()),
            diagnostics: self.diagnostics.clone(),
            misuse_warnings: self.misuse_warnings,
        }
    }
}

impl Default for CellOptions {
    fn default() -> Self {
        Self::new()
    }
}

type Cleanup = Box<dyn FnOnce() + Send>;

struct CellState<T> {
    value: Option<T>,
    listeners: IndexMap<ListenerId, Listener<T>>,
}

/// Shared state behind every [`ValueCell`] and [`Emitter`] handle.
pub(crate) struct CellCore<T> {
    id: CellId,
    options: CellOptions,
    state: Mutex<CellState<T>>,
    cleanup: Mutex<Option<Cleanup>>,
    completed: AtomicBool,
}

impl<T: CellValue> CellCore<T> {
    pub(crate) fn new(value: Option<T>, options: CellOptions) -> Arc<Self> {
        Arc::new(Self {
            id: CellId::next(),
            options,
            state: Mutex::new(CellState {
                value,
                listeners: IndexMap::new(),
            }),
            cleanup: Mutex::new(None),
            completed: AtomicBool::new(false),
        })
    }

    pub(crate) fn id(&self) -> CellId {
        self.id
    }

    pub(crate) fn options(&self) -> &CellOptions {
        &self.options
    }

    pub(crate) fn label(&self) -> Option<&str> {
        self.options.label.as_deref()
    }

    /// Install the hook run on the first completion.
    pub(crate) fn set_cleanup(&self, cleanup: impl FnOnce() + Send + 'static) {
        *self.cleanup.lock() = Some(Box::new(cleanup));
    }

    pub(crate) fn current(&self) -> Option<T> {
        self.state.lock().value.clone()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        listener: &Listener<T>,
        skip_current: bool,
    ) -> Subscription {
        let replay = {
            let mut state = self.state.lock();
            state.listeners.insert(listener.id(), listener.clone());
            if skip_current {
                None
            } else {
                state.value.clone()
            }
        };

        if let Some(value) = replay {
            listener.notify(&value);
        }

        let source: Weak<dyn Detach> = Arc::downgrade(self) as Weak<Self>;
        Subscription::new(source, listener.id())
    }

    /// Store `value` and deliver it to a snapshot of the listeners.
    pub(crate) fn set(&self, value: T) {
        let listeners: Vec<Listener<T>> = {
            let mut state = self.state.lock();
            state.value = Some(value.clone());
            state.listeners.values().cloned().collect()
        };

        for listener in &listeners {
            listener.notify(&value);
        }
    }

    /// Functional update. `None` from `f` cancels the update.
    pub(crate) fn apply<F>(&self, f: F)
    where
        F: FnOnce(Option<T>) -> Option<T>,
    {
        let previous = self.current();
        match f(previous) {
            Some(next) => self.set(next),
            None => trace!(cell = %self.id, "update cancelled"),
        }
    }

    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(Option<T>) -> Option<T>,
    {
        if self.options.misuse_warnings && self.state.lock().value.is_none() {
            warn!(
                cell = %self.id,
                label = self.label(),
                "updating with a function while the cell holds no value"
            );
        }
        self.apply(f);
    }

    pub(crate) fn complete(&self) {
        if self.options.keep_alive {
            match self.label() {
                Some(label) => debug!(cell = %self.id, label, "keep-alive cell ignored complete"),
                None => trace!(cell = %self.id, "keep-alive cell ignored complete"),
            }
            return;
        }

        let dropped = std::mem::take(&mut self.state.lock().listeners);
        self.completed.store(true, Ordering::SeqCst);
        drop(dropped);

        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            match self.label() {
                Some(label) => debug!(cell = %self.id, label, "running cleanup"),
                None => trace!(cell = %self.id, "running cleanup"),
            }
            cleanup();
        }
    }
}

impl<T: CellValue> Detach for CellCore<T> {
    fn detach(&self, id: ListenerId) {
        let (removed, now_empty) = {
            let mut state = self.state.lock();
            let removed = state.listeners.shift_remove(&id);
            let now_empty = removed.is_some() && state.listeners.is_empty();
            (removed, now_empty)
        };
        // May hold the last reference to a derived cell.
        drop(removed);

        if now_empty {
            self.complete();
        }
    }
}

/// A mutable, observable value.
///
/// Cloning a `ValueCell` yields another handle to the same state.
///
/// # Example
///
/// ```rust
/// use conduit_core::reactive::{Listenable, ValueCell};
///
/// let count = ValueCell::new(1);
/// let doubled = count.map(|v| v * 2);
///
/// let sub = doubled.listen(|v| println!("doubled: {v}"));
/// count.set(5); // prints "doubled: 10"
/// sub.unsubscribe();
/// ```
pub struct ValueCell<T: CellValue> {
    core: Arc<CellCore<T>>,
}

impl<T: CellValue> ValueCell<T> {
    /// Create a cell holding `value`, configured from the process-wide defaults.
    pub fn new(value: T) -> Self {
        Self::with_options(Some(value), CellOptions::new())
    }

    /// Create a cell with no value yet.
    pub fn empty() -> Self {
        Self::with_options(None, CellOptions::new())
    }

    /// Create a cell with explicit options.
    pub fn with_options(value: Option<T>, options: CellOptions) -> Self {
        Self {
            core: CellCore::new(value, options),
        }
    }

    /// Replace the value and notify every listener.
    pub fn set(&self, value: T) {
        self.core.set(value);
    }

    /// Compute the next value from the current one.
    ///
    /// `f` receives `None` when the cell is empty (a warning is logged). If
    /// `f` returns `None` the update is cancelled: the value is left alone
    /// and no listener fires.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(Option<T>) -> Option<T>,
    {
        self.core.update(f);
    }

    /// Run a cleanup hook the first time this cell completes.
    ///
    /// Replaces any previously installed hook.
    pub fn on_complete(&self, cleanup: impl FnOnce() + Send + 'static) {
        self.core.set_cleanup(cleanup);
    }

    /// The label given at construction, if any.
    pub fn label(&self) -> Option<&str> {
        self.core.label()
    }
}

impl<T: CellValue> Listenable<T> for ValueCell<T> {
    fn current(&self) -> Option<T> {
        self.core.current()
    }

    fn subscribe(&self, listener: &Listener<T>, skip_current: bool) -> Subscription {
        self.core.subscribe(listener, skip_current)
    }

    fn complete(&self) {
        self.core.complete();
    }

    fn listener_count(&self) -> usize {
        self.core.listener_count()
    }

    fn emitter(&self) -> Emitter<T> {
        Emitter::from_core(Arc::clone(&self.core))
    }

    fn id(&self) -> CellId {
        self.core.id()
    }

    fn is_completed(&self) -> bool {
        self.core.is_completed()
    }
}

impl<T: CellValue> Clone for ValueCell<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: CellValue + Default> Default for ValueCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: CellValue + Debug> Debug for ValueCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCell")
            .field("id", &self.core.id())
            .field("label", &self.core.label())
            .field("value", &self.core.current())
            .field("listener_count", &self.core.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
