//! Listener and subscription types.
//!
//! A [`Listener`] is a callback registered on a cell. Registering returns a
//! [`Subscription`], the only cancellation primitive: calling
//! [`Subscription::unsubscribe`] removes the listener and, if it was the last
//! one, completes the cell.
//!
//! Subscriptions hold their cell weakly. A cell owns its listeners, and
//! through them every cell derived from it, so the only strong edges in a
//! graph point downstream and dropping every handle frees it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Unique identifier for a listener.
///
/// Listener identity is what the listener set dedupes on: registering the
/// same [`Listener`] twice keeps a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback invoked with each value a cell emits.
pub struct Listener<T> {
    id: ListenerId,
    callback: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Listener<T> {
    /// Wrap a callback in a listener with a fresh ID.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::new(),
            callback: Arc::new(callback),
        }
    }

    /// Get the listener's unique ID.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback.
    pub fn notify(&self, value: &T) {
        (self.callback)(value);
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// Something a listener can be removed from.
///
/// Implemented by every cell so that [`Subscription`] does not need to carry
/// the cell's value type.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: ListenerId);
}

/// Handle returned by `listen`/`subscribe`.
///
/// Dropping a subscription does NOT unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe) or convert it with
/// [`into_guard`](Self::into_guard). A subscription does not keep its cell
/// alive; unsubscribing from a cell that has been freed is a no-op.
#[derive(Clone)]
pub struct Subscription {
    source: Weak<dyn Detach>,
    listener_id: ListenerId,
}

impl Subscription {
    pub(crate) fn new(source: Weak<dyn Detach>, listener_id: ListenerId) -> Self {
        Self {
            source,
            listener_id,
        }
    }

    /// The ID of the subscribed listener.
    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Remove the listener from its cell.
    ///
    /// Safe to call any number of times; only the call that actually removes
    /// the last listener completes the cell.
    pub fn unsubscribe(&self) {
        if let Some(source) = self.source.upgrade() {
            source.detach(self.listener_id);
        }
    }

    /// Turn this subscription into a guard that unsubscribes when dropped.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: Some(self),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("listener_id", &self.listener_id)
            .finish()
    }
}

/// Unsubscribes its listener when dropped.
#[must_use = "dropping the guard unsubscribes immediately"]
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Option<Subscription>,
}

impl SubscriptionGuard {
    /// Give the subscription back without unsubscribing.
    pub fn release(mut self) -> Subscription {
        match self.subscription.take() {
            Some(subscription) => subscription,
            None => unreachable!("guard holds its subscription until dropped"),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI32};

    struct Recorder {
        detached: Mutex<Vec<ListenerId>>,
    }

    impl Detach for Recorder {
        fn detach(&self, id: ListenerId) {
            self.detached.lock().push(id);
        }
    }

    fn detachable(recorder: &Arc<Recorder>) -> Weak<dyn Detach> {
        let source: Arc<dyn Detach> = recorder.clone();
        Arc::downgrade(&source)
    }

    #[test]
    fn listener_ids_are_unique() {
        let id1 = ListenerId::new();
        let id2 = ListenerId::new();
        let id3 = ListenerId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn listener_clone_keeps_identity() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let listener = Listener::new(move |_: &i32| {
            called_clone.store(true, Ordering::SeqCst);
        });
        let copy = listener.clone();

        assert_eq!(listener.id(), copy.id());
        copy.notify(&1);
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn listener_notify_passes_value() {
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();

        let listener = Listener::new(move |v: &i32| {
            seen_clone.store(*v, Ordering::SeqCst);
        });
        listener.notify(&7);

        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn guard_unsubscribes_on_drop() {
        let recorder = Arc::new(Recorder {
            detached: Mutex::new(Vec::new()),
        });
        let id = ListenerId::new();

        {
            let _guard = Subscription::new(detachable(&recorder), id).into_guard();
            assert!(recorder.detached.lock().is_empty());
        }

        assert_eq!(*recorder.detached.lock(), vec![id]);
    }

    #[test]
    fn released_guard_does_not_unsubscribe() {
        let recorder = Arc::new(Recorder {
            detached: Mutex::new(Vec::new()),
        });

        let guard = Subscription::new(detachable(&recorder), ListenerId::new()).into_guard();
        let subscription = guard.release();

        assert!(recorder.detached.lock().is_empty());
        subscription.unsubscribe();
        assert_eq!(recorder.detached.lock().len(), 1);
    }

    #[test]
    fn unsubscribe_after_source_is_freed_is_a_no_op() {
        let recorder = Arc::new(Recorder {
            detached: Mutex::new(Vec::new()),
        });
        let subscription = Subscription::new(detachable(&recorder), ListenerId::new());

        drop(recorder);
        subscription.unsubscribe();
        drop(subscription.into_guard());
    }
}
