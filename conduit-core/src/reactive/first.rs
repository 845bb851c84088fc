//! One-shot bridge from a cell to a future.
//!
//! [`first_value`] resolves with the cell's current value if it has one,
//! otherwise with the next value the cell emits. The temporary listener is
//! removed as soon as it fires, so the bridge never resolves twice and never
//! outlives its first value.
//!
//! If the cell completes before emitting, the listener (and with it the
//! sending half of the channel) is dropped and the future resolves to
//! [`ConduitError::Completed`]. Dropping the future before it resolves
//! unsubscribes the listener, which may complete the cell.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::cell::CellValue;
use super::emitter::Listenable;
use super::listener::{Listener, Subscription};
use crate::error::{ConduitError, Result};

/// Future returned by [`first_value`].
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct FirstValue<T> {
    state: FirstState<T>,
}

type Slot = Arc<Mutex<Option<Subscription>>>;

#[derive(Debug)]
enum FirstState<T> {
    Ready(Option<T>),
    Pending {
        receiver: oneshot::Receiver<T>,
        subscription: Slot,
    },
}

// The value is only ever moved out, never pinned.
impl<T> Unpin for FirstValue<T> {}

impl<T> Future for FirstValue<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            FirstState::Ready(value) => Poll::Ready(value.take().ok_or(ConduitError::AlreadyResolved)),
            FirstState::Pending { receiver, .. } => Pin::new(receiver)
                .poll(cx)
                .map(|received| received.map_err(|_| ConduitError::Completed)),
        }
    }
}

impl<T> Drop for FirstValue<T> {
    fn drop(&mut self) {
        if let FirstState::Pending { subscription, .. } = &self.state {
            let pending = subscription.lock().take();
            if let Some(subscription) = pending {
                subscription.unsubscribe();
            }
        }
    }
}

/// Resolve with the current value of `source`, or its next emission.
pub fn first_value<T, S>(source: &S) -> FirstValue<T>
where
    T: CellValue,
    S: Listenable<T> + ?Sized,
{
    if let Some(value) = source.current() {
        return FirstValue {
            state: FirstState::Ready(Some(value)),
        };
    }

    let (sender, receiver) = oneshot::channel();
    let pending = Mutex::new(Some(sender));
    let slot: Slot = Arc::new(Mutex::new(None));
    let resolved = Arc::new(AtomicBool::new(false));

    let own_slot = Arc::clone(&slot);
    let own_resolved = Arc::clone(&resolved);
    let listener = Listener::new(move |value: &T| {
        let Some(sender) = pending.lock().take() else {
            return;
        };
        let _ = sender.send(value.clone());
        own_resolved.store(true, Ordering::SeqCst);

        let subscription = own_slot.lock().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    });

    let subscription = source.subscribe(&listener, false);
    if resolved.load(Ordering::SeqCst) {
        // Fired during registration; the slot was still empty.
        subscription.unsubscribe();
    } else {
        *slot.lock() = Some(subscription);
    }

    FirstValue {
        state: FirstState::Pending {
            receiver,
            subscription: slot,
        },
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{CellOptions, ValueCell};
    use std::time::Duration;

    fn cell<T: CellValue>(value: Option<T>) -> ValueCell<T> {
        ValueCell::with_options(value, CellOptions::detached())
    }

    #[tokio::test]
    async fn resolves_immediately_with_current_value() {
        let source = cell(Some(5));
        let value = first_value(&source).await.unwrap();

        assert_eq!(value, 5);
        assert_eq!(source.listener_count(), 0);
    }

    #[tokio::test]
    async fn resolves_on_first_emission_and_unsubscribes() {
        let source = cell::<i32>(None);
        let pending = first_value(&source);
        assert_eq!(source.listener_count(), 1);

        source.set(7);
        source.set(8);

        assert_eq!(pending.await.unwrap(), 7);
        assert_eq!(source.listener_count(), 0);
    }

    #[tokio::test]
    async fn resolves_through_a_pipe() {
        let source = cell::<i32>(None);
        let big = source.filter(|v| *v > 10);
        let pending = big.listen_future();

        source.set(3);
        source.set(30);

        assert_eq!(pending.await.unwrap(), 30);
        // Losing its only listener collapsed the pipe.
        assert!(big.is_completed());
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn dropping_unresolved_future_releases_the_chain() {
        let source = cell::<i32>(None);
        let piped = source.map(|v| v + 1);

        let pending = first_value(&piped);
        assert_eq!(piped.listener_count(), 1);

        drop(pending);

        assert_eq!(piped.listener_count(), 0);
        assert!(piped.is_completed());
        assert_eq!(source.listener_count(), 0);
    }

    #[tokio::test]
    async fn timed_out_future_leaves_no_listener() {
        let source = cell::<i32>(None);
        let waited =
            tokio::time::timeout(Duration::from_millis(5), first_value(&source.map(|v| *v))).await;

        assert!(waited.is_err());
        assert_eq!(source.listener_count(), 0);
    }

    #[tokio::test]
    async fn errors_when_source_completes_first() {
        let source = cell::<i32>(None);
        let pending = first_value(&source);

        source.complete();

        assert!(matches!(pending.await, Err(ConduitError::Completed)));
    }
}
