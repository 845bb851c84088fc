//! Pipe Implementation
//!
//! A pipe is a derived cell whose value is computed from an upstream cell.
//!
//! # How Pipes Work
//!
//! 1. At construction, if the source holds a value, the transform runs once
//!    to seed the derived cell. Otherwise the derived cell starts empty.
//!
//! 2. The pipe subscribes to the source with `skip_current`, so the seed is
//!    never computed a second time through the listener path.
//!
//! 3. Each later upstream emission runs the transform exactly once. A `None`
//!    result drops the event (the pipe acts as a filter); `Some` is set on
//!    the derived cell and delivered downstream.
//!
//! 4. The derived cell's cleanup hook unsubscribes from the source. When the
//!    last consumer of a chain leaves, each link releases its parent in turn,
//!    up to the root or the first keep-alive cell.
//!
//! The source owns the derived cell through the pipe's listener, while the
//! derived cell's subscription only points back weakly. A pipe that is never
//! listened to therefore lives as long as its source, and dropping every
//! handle to a graph frees all of it.

use std::panic::Location;
use std::sync::Arc;

use tracing::trace;

use super::cell::{CellCore, CellValue};
use super::emitter::{Emitter, Listenable};
use super::listener::Listener;
use crate::diagnostics::measure;

/// Options for [`Listenable::pipe_with`].
#[derive(Debug, Clone, Default)]
pub struct PipeOptions {
    keep_alive: bool,
    label: Option<Arc<str>>,
}

impl PipeOptions {
    /// Keep the derived cell, and its upstream subscription, alive after its
    /// last listener leaves.
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Name the derived cell in lifecycle logs. Defaults to the source's label.
    pub fn label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }
}

const PIPE_DETAILS: &str = "pipe transform";

pub(crate) fn pipe_from<T, O, F>(
    source: &Emitter<T>,
    transform: F,
    options: PipeOptions,
    origin: &'static Location<'static>,
) -> Emitter<O>
where
    T: CellValue,
    O: CellValue,
    F: Fn(&T) -> Option<O> + Send + Sync + 'static,
{
    let upstream = source.core();
    let cell_options = upstream
        .options()
        .derive(options.keep_alive, options.label);
    let tracker = cell_options.diagnostics.clone();

    let initial = upstream.current().and_then(|value| {
        measure(tracker.as_deref(), PIPE_DETAILS, origin, || transform(&value))
    });
    let derived = CellCore::new(initial, cell_options);

    let sink = Arc::clone(&derived);
    let listener = Listener::new(move |value: &T| {
        match measure(tracker.as_deref(), PIPE_DETAILS, origin, || transform(value)) {
            Some(next) => sink.set(next),
            None => trace!(cell = %sink.id(), "pipe filtered event"),
        }
    });
    let subscription = source.subscribe(&listener, true);

    let derived_id = derived.id();
    let label = derived.label().map(str::to_owned);
    derived.set_cleanup(move || {
        trace!(cell = %derived_id, label = label.as_deref(), "pipe releasing its source");
        subscription.unsubscribe();
    });

    Emitter::from_core(derived)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
