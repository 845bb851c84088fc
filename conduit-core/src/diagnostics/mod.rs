//! Diagnostics
//!
//! Optional instrumentation for user code that runs inside the primitive:
//! pipe transforms and distinctness comparators/copies. When a
//! [`SlowCallTracker`] is installed (directly through
//! [`CellOptions`](crate::reactive::CellOptions) or process-wide through
//! [`config::configure`](crate::config::configure)), each call is timed and
//! calls over the threshold are recorded as [`SlowCall`] reports.
//!
//! Without a tracker, measurement is a plain function call.

mod slow_call;

pub use slow_call::{SlowCall, SlowCallTracker};

pub(crate) use slow_call::measure;
