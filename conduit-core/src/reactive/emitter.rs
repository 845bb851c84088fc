//! Read-only views and the shared listening surface.
//!
//! [`Emitter`] is a [`ValueCell`](super::ValueCell) with the mutation surface
//! removed. It wraps the same shared state, so completing an emitter completes
//! the underlying cell. Pipes and joins only ever hand out emitters; the
//! derived cell's value is written by the pipe or join that owns it.

use std::fmt::{self, Debug};
use std::panic::Location;
use std::sync::Arc;

use super::cell::{CellCore, CellId, CellValue};
use super::distinct::default_filter;
use super::first::{first_value, FirstValue};
use super::listener::{Listener, Subscription};
use super::pipe::{pipe_from, PipeOptions};

/// Everything a holder of a cell may do without mutating it.
///
/// Implemented by [`ValueCell`](super::ValueCell) and [`Emitter`].
pub trait Listenable<T: CellValue> {
    /// The latest value, or `None` if the cell has not been given one.
    fn current(&self) -> Option<T>;

    /// Register `listener`.
    ///
    /// Unless `skip_current` is set, a present value is delivered to the
    /// listener before this returns.
    fn subscribe(&self, listener: &Listener<T>, skip_current: bool) -> Subscription;

    /// Drop every listener and run the cell's cleanup hook.
    ///
    /// No-op on keep-alive cells. Safe to call repeatedly.
    fn complete(&self);

    /// Number of registered listeners.
    fn listener_count(&self) -> usize;

    /// A read-only handle to the same cell.
    fn emitter(&self) -> Emitter<T>;

    /// The cell's unique ID.
    fn id(&self) -> CellId;

    /// Whether the cell has completed.
    fn is_completed(&self) -> bool;

    /// Register a callback, replaying the current value to it.
    fn listen<F>(&self, on_emit: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(&Listener::new(on_emit), false)
    }

    /// Derive a new cell through `transform`. `None` results are dropped.
    ///
    /// The derived cell completes itself, and releases this one, once its
    /// last listener leaves.
    #[track_caller]
    fn pipe<O, F>(&self, transform: F) -> Emitter<O>
    where
        O: CellValue,
        F: Fn(&T) -> Option<O> + Send + Sync + 'static,
    {
        pipe_from(&self.emitter(), transform, PipeOptions::default(), Location::caller())
    }

    /// Like [`pipe`](Self::pipe), but the derived cell survives losing its
    /// listeners and keeps its subscription to this cell.
    #[track_caller]
    fn pipe_keep_alive<O, F>(&self, transform: F) -> Emitter<O>
    where
        O: CellValue,
        F: Fn(&T) -> Option<O> + Send + Sync + 'static,
    {
        let options = PipeOptions::default().keep_alive(true);
        pipe_from(&self.emitter(), transform, options, Location::caller())
    }

    /// [`pipe`](Self::pipe) with explicit options.
    #[track_caller]
    fn pipe_with<O, F>(&self, transform: F, options: PipeOptions) -> Emitter<O>
    where
        O: CellValue,
        F: Fn(&T) -> Option<O> + Send + Sync + 'static,
    {
        pipe_from(&self.emitter(), transform, options, Location::caller())
    }

    /// Derive a cell holding `f` of every value.
    #[track_caller]
    fn map<O, F>(&self, f: F) -> Emitter<O>
    where
        O: CellValue,
        F: Fn(&T) -> O + Send + Sync + 'static,
    {
        let transform = move |v: &T| Some(f(v));
        pipe_from(&self.emitter(), transform, PipeOptions::default(), Location::caller())
    }

    /// Derive a cell holding only the values that satisfy `predicate`.
    #[track_caller]
    fn filter<F>(&self, predicate: F) -> Emitter<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let transform = move |v: &T| predicate(v).then(|| v.clone());
        pipe_from(&self.emitter(), transform, PipeOptions::default(), Location::caller())
    }

    /// Derive a cell that skips values equal to the last one it passed.
    ///
    /// Uses the default distinction registered for `T`, if any, otherwise
    /// `PartialEq`. Comparisons are measured by this cell's slow-call
    /// tracker.
    #[track_caller]
    fn distinct(&self) -> Emitter<T>
    where
        T: PartialEq,
    {
        let source = self.emitter();
        let tracker = source.core().options().diagnostics.clone();
        let transform = default_filter::<T>(tracker).into_transform();
        pipe_from(&source, transform, PipeOptions::default(), Location::caller())
    }

    /// Resolve with the current value, or the next one if there is none yet.
    fn listen_future(&self) -> FirstValue<T>
    where
        Self: Sized,
    {
        first_value(self)
    }
}

/// Read-only handle to a cell.
pub struct Emitter<T: CellValue> {
    core: Arc<CellCore<T>>,
}

impl<T: CellValue> Emitter<T> {
    pub(crate) fn from_core(core: Arc<CellCore<T>>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<CellCore<T>> {
        &self.core
    }

    /// The label given to the underlying cell, if any.
    pub fn label(&self) -> Option<&str> {
        self.core.label()
    }
}

impl<T: CellValue> Listenable<T> for Emitter<T> {
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
        self.clone()
    }

    fn id(&self) -> CellId {
        self.core.id()
    }

    fn is_completed(&self) -> bool {
        self.core.is_completed()
    }
}

impl<T: CellValue> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: CellValue> From<&super::ValueCell<T>> for Emitter<T> {
    fn from(cell: &super::ValueCell<T>) -> Self {
        cell.emitter()
    }
}

impl<T: CellValue + Debug> Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
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
