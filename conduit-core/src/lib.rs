//! Conduit Core
//!
//! This crate provides a small reactive state-propagation primitive:
//!
//! - Observable value cells with replay-on-subscribe
//! - Derived cells (pipes) that double as filters
//! - Joins over several independent cells
//! - Cascading teardown driven by listener counts
//! - A one-shot bridge from a cell to a future
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Cells, emitters, pipes, joins and the distinctness filter
//! - `diagnostics`: Optional slow-call instrumentation for user transforms
//! - `config`: Process-wide defaults injected into cells at construction
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use conduit_core::reactive::{join2, Listenable, ValueCell};
//!
//! let first = ValueCell::new("Ada".to_string());
//! let last = ValueCell::<String>::empty();
//!
//! let full = join2(Some(&first.emitter()), Some(&last.emitter()))
//!     .expect("both sources are present")
//!     .pipe(|(first, last)| match (first, last) {
//!         (Some(first), Some(last)) => Some(format!("{first} {last}")),
//!         _ => None,
//!     });
//!
//! let sub = full.listen(|name| println!("name: {name}"));
//! last.set("Lovelace".to_string()); // prints "name: Ada Lovelace"
//!
//! // Dropping the last listener releases the whole graph.
//! sub.unsubscribe();
//! assert_eq!(first.listener_count(), 0);
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod reactive;

pub use error::{ConduitError, Result};
