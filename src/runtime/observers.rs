//! Typed observer list with catch-and-continue delivery

use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives events of type `E`. A returned error is logged by the list and
/// never reaches the publisher.
pub trait Observer<E>: Send + Sync {
    fn notify(&self, event: &E) -> anyhow::Result<()>;
}

impl<E, F> Observer<E> for F
where
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, event: &E) -> anyhow::Result<()> {
        self(event)
    }
}

/// Handle returned by [`ObserverList::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry<E> {
    id: SubscriptionId,
    observer: Arc<dyn Observer<E>>,
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            observer: Arc::clone(&self.observer),
        }
    }
}

/// Observers in registration order
pub struct ObserverList<E> {
    entries: RwLock<Vec<Entry<E>>>,
    next_id: AtomicU64,
}

impl<E> ObserverList<E> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer<E>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Entry { id, observer });
        id
    }

    /// Convenience for closures
    pub fn subscribe_fn<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
        E: 'static,
    {
        self.subscribe(Arc::new(f))
    }

    /// Returns false when the id was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deliver `event` to every observer in registration order.
    ///
    /// Failures (errors or panics) are logged and delivery continues.
    /// Returns the number of observers that failed.
    pub fn broadcast(&self, event: &E) -> usize {
        // Snapshot so observers may subscribe or unsubscribe while notified
        let snapshot: Vec<Entry<E>> = self.entries.read().clone();

        let mut failures = 0;
        for entry in &snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.observer.notify(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!(subscription = entry.id.0, "Observer failed: {:#}", e);
                }
                Err(panic) => {
                    failures += 1;
                    tracing::error!(
                        subscription = entry.id.0,
                        "Observer panicked: {}",
                        panic_message(&panic)
                    );
                }
            }
        }
        failures
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn delivers_in_registration_order() {
        let list: ObserverList<u32> = ObserverList::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            list.subscribe_fn(move |n: &u32| {
                seen.lock().push(format!("{tag}{n}"));
                Ok(())
            });
        }
        assert_eq!(list.broadcast(&7), 0);
        assert_eq!(*seen.lock(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn failing_observers_do_not_stop_delivery() {
        let list: ObserverList<()> = ObserverList::new();
        let count = Arc::new(Mutex::new(0));

        list.subscribe_fn(|_: &()| anyhow::bail!("listener error"));
        list.subscribe_fn(|_: &()| panic!("listener panic"));
        let c = Arc::clone(&count);
        list.subscribe_fn(move |_: &()| {
            *c.lock() += 1;
            Ok(())
        });

        assert_eq!(list.broadcast(&()), 2);
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_observer() {
        let list: ObserverList<()> = ObserverList::new();
        let first = list.subscribe_fn(|_: &()| Ok(()));
        list.subscribe_fn(|_: &()| Ok(()));
        assert!(list.unsubscribe(first));
        assert!(!list.unsubscribe(first));
        assert_eq!(list.len(), 1);
    }
}
