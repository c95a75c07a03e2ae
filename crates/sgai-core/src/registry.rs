use crate::event::{Event, Scope};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Listener callback. Invoked synchronously on the dispatching task.
pub type Callback = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// SubscriptionId
// ---------------------------------------------------------------------------

/// Token identifying one registered listener. Ids increase monotonically, so
/// ordering by id is ordering by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Internal tables
// ---------------------------------------------------------------------------

type Key = (String, Scope);

struct Listener {
    id: SubscriptionId,
    // Cleared on unsubscribe so in-flight snapshots skip the listener.
    active: AtomicBool,
    callback: Callback,
}

#[derive(Default)]
struct Table {
    by_key: HashMap<Key, Vec<Arc<Listener>>>,
    keys: HashMap<SubscriptionId, Key>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    table: Mutex<Table>,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, Table> {
        // A listener never runs while the lock is held, so a poisoned lock
        // still guards a consistent table.
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut table = self.table();
        let Some(key) = table.keys.remove(&id) else {
            return false;
        };
        if let Some(list) = table.by_key.get_mut(&key) {
            if let Some(pos) = list.iter().position(|l| l.id == id) {
                let listener = list.remove(pos);
                listener.active.store(false, Ordering::Release);
            }
            if list.is_empty() {
                table.by_key.remove(&key);
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Listener sets keyed by `(event name, scope)`.
///
/// A workspace-scoped event reaches the listeners registered for that
/// workspace and the global listeners for the same name. A global event
/// reaches only global listeners. Listeners run in registration order.
///
/// The registry is cheap to clone; clones share the same listener table.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `name` within `scope`.
    ///
    /// The returned [`Subscription`] removes the listener when it is dropped
    /// or explicitly unsubscribed.
    pub fn subscribe<F>(&self, name: impl Into<String>, scope: Scope, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let key: Key = (name.into(), scope);
        let listener = Arc::new(Listener {
            id,
            active: AtomicBool::new(true),
            callback: Arc::new(callback),
        });

        tracing::trace!(subscription = %id, event = %key.0, scope = %key.1, "subscribe");

        let mut table = self.inner.table();
        table.keys.insert(id, key.clone());
        table.by_key.entry(key).or_default().push(listener);
        drop(table);

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            armed: true,
        }
    }

    /// Remove a listener by token. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        tracing::trace!(subscription = %id, "unsubscribe");
        self.inner.remove(id)
    }

    /// Deliver `event` to `(name, workspace)` listeners and `(name, global)`
    /// listeners. Returns how many listeners were invoked.
    pub fn dispatch(&self, event: &Event) -> usize {
        let snapshot = self.snapshot(&event.name, |scope| match scope {
            Scope::Global => true,
            Scope::Workspace(ws) => event.workspace.as_deref() == Some(ws.as_str()),
        });
        self.invoke(event, snapshot)
    }

    /// Deliver `event` to every listener of `event.name` regardless of scope.
    pub fn broadcast(&self, event: &Event) -> usize {
        let snapshot = self.snapshot(&event.name, |_| true);
        self.invoke(event, snapshot)
    }

    /// Total number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.table().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listener_count(&self, name: &str, scope: &Scope) -> usize {
        self.inner
            .table()
            .by_key
            .get(&(name.to_string(), scope.clone()))
            .map_or(0, Vec::len)
    }

    /// Drop every listener. Outstanding [`Subscription`] guards become inert.
    pub fn clear(&self) {
        let mut table = self.inner.table();
        for list in table.by_key.values() {
            for listener in list {
                listener.active.store(false, Ordering::Release);
            }
        }
        table.by_key.clear();
        table.keys.clear();
    }

    fn snapshot(&self, name: &str, include: impl Fn(&Scope) -> bool) -> Vec<Arc<Listener>> {
        let table = self.inner.table();
        let mut snapshot: Vec<Arc<Listener>> = table
            .by_key
            .iter()
            .filter(|((n, scope), _)| n == name && include(scope))
            .flat_map(|(_, list)| list.iter().cloned())
            .collect();
        snapshot.sort_by_key(|l| l.id);
        snapshot
    }

    fn invoke(&self, event: &Event, snapshot: Vec<Arc<Listener>>) -> usize {
        let mut invoked = 0;
        for listener in &snapshot {
            // Removed earlier in this pass (possibly by another listener).
            if !listener.active.load(Ordering::Acquire) {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| (listener.callback)(event)));
            match result {
                Ok(()) => invoked += 1,
                Err(_) => tracing::error!(
                    event = %event,
                    subscription = %listener.id,
                    "listener panicked; continuing dispatch"
                ),
            }
        }
        tracing::trace!(event = %event, candidates = snapshot.len(), invoked, "dispatch");
        invoked
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("listeners", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Disposer returned by [`Registry::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Inner>,
    armed: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    /// Keep the listener registered for the life of the registry and hand
    /// back its token for a later [`Registry::unsubscribe`].
    pub fn detach(mut self) -> SubscriptionId {
        self.armed = false;
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
