//! Status observer registry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use fazenda_engine::SyncStatus;

type Listener = Arc<dyn Fn(SyncStatus) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        // A listener never runs under the lock, so poisoning cannot leave the list half-updated.
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ordered set of status callbacks.
///
/// Listeners run synchronously, in registration order, on the task that
/// changed the status. A panicking listener is logged and skipped; the rest
/// still run.
#[derive(Clone, Default)]
pub struct StatusListeners {
    registry: Arc<Registry>,
}

impl StatusListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until
    /// [`ListenerHandle::unsubscribe`] is called; dropping the handle does not remove it.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(SyncStatus) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().push((id, Arc::new(listener)));

        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every listener with `status`.
    pub fn notify(&self, status: SyncStatus) {
        let snapshot: Vec<(u64, Listener)> = self.registry.lock().clone();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(status))).is_err() {
                tracing::error!(listener_id = id, status = %status, "Status listener panicked");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registration of one listener.
#[derive(Debug)]
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Registry>,
}

impl ListenerHandle {
    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut listeners = registry.lock();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Box<dyn Fn(SyncStatus) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| -> Box<dyn Fn(SyncStatus) + Send + Sync> {
            let sink = sink.clone();
            Box::new(move |status| sink.lock().unwrap().push(format!("{}:{}", name, status)))
        };
        (log, make)
    }

    #[test]
    fn notifies_in_registration_order() {
        let listeners = StatusListeners::new();
        let (log, make) = recorder();

        let _a = listeners.subscribe(make("a"));
        let _b = listeners.subscribe(make("b"));
        listeners.notify(SyncStatus::Syncing);

        assert_eq!(*log.lock().unwrap(), vec!["a:syncing", "b:syncing"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let listeners = StatusListeners::new();
        let (log, make) = recorder();

        let a = listeners.subscribe(make("a"));
        let _b = listeners.subscribe(make("b"));
        assert!(a.unsubscribe());
        assert_eq!(listeners.len(), 1);

        listeners.notify(SyncStatus::Online);
        assert_eq!(*log.lock().unwrap(), vec!["b:online"]);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let listeners = StatusListeners::new();
        let (log, make) = recorder();

        let _bad = listeners.subscribe(|_| panic!("listener bug"));
        let _good = listeners.subscribe(make("good"));
        listeners.notify(SyncStatus::Error);
        listeners.notify(SyncStatus::Online);

        assert_eq!(*log.lock().unwrap(), vec!["good:error", "good:online"]);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn handle_outliving_registry() {
        let listeners = StatusListeners::new();
        let handle = listeners.subscribe(|_| {});
        drop(listeners);
        assert!(!handle.unsubscribe());
    }
}
