//! Reactive Primitives
//!
//! This module implements observable value cells and the ways to derive new
//! cells from them.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`ValueCell`] holds the latest value and a set of listeners. Setting a
//! value synchronously notifies every listener. A newly registered listener
//! is immediately given the current value, if there is one.
//!
//! ## Emitters
//!
//! An [`Emitter`] is a read-only handle to a cell. Everything derived from a
//! cell is handed out as an emitter, so only the owner of a cell can write it.
//!
//! ## Pipes and joins
//!
//! [`Listenable::pipe`] derives a cell through a transform that may return
//! `None` to drop an event. [`join`] combines several emitters into one
//! emitter of a tuple.
//!
//! ## Teardown
//!
//! Every derived cell holds a subscription to its sources. When the derived
//! cell loses its last listener it completes and releases those
//! subscriptions, which may in turn leave its sources without listeners.
//! Chains therefore collapse from the leaf upward until they reach a root or
//! a cell marked keep-alive.
//!
//! # Implementation Notes
//!
//! Delivery is synchronous and no lock is held while user code runs, so
//! listeners may re-enter the cells they observe. Handles are `Send + Sync`,
//! but the delivery order guarantees assume updates to one cell are not
//! issued concurrently from several threads.

mod cell;
mod distinct;
mod emitter;
mod first;
mod join;
mod listener;
mod pipe;

pub use cell::{CellId, CellOptions, CellValue, ValueCell};
pub use distinct::{ignore_repeats, ignore_repeats_with, Distinction, IgnoreRepeats};
pub use emitter::{Emitter, Listenable};
pub use first::{first_value, FirstValue};
pub use join::{join, join2, join3};
pub use listener::{Listener, ListenerId, Subscription, SubscriptionGuard};
pub use pipe::PipeOptions;
