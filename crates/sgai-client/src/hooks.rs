//! Declarative subscriptions for consumers that re-fetch state on change.
//!
//! An [`EventWatch`] bumps its version on every matching event and on every
//! reconnect, so a consumer only has to compare versions (or await
//! [`EventWatch::changed`]) to know when to reload from REST.

use std::sync::Arc;

use sgai_core::event::{Event, Scope, RECONNECTED};
use sgai_core::{Registry, Subscription};
use tokio::sync::watch;

use crate::EventClient;

#[derive(Debug, Clone, Default)]
struct Signal {
    version: u64,
    reconnects: u64,
    last: Option<Event>,
}

/// Live view of one `(event name, scope)` subscription.
///
/// Dropping the watch removes both of its listeners from the registry.
pub struct EventWatch {
    rx: watch::Receiver<Signal>,
    _subscriptions: [Subscription; 2],
}

/// Watch `name` across every workspace.
pub fn use_sse_event(client: &EventClient, name: &str) -> EventWatch {
    watch_scope(client.registry(), name, Scope::Global)
}

/// Watch `name` for a single workspace.
pub fn use_workspace_sse_event(client: &EventClient, name: &str, workspace: &str) -> EventWatch {
    watch_scope(client.registry(), name, Scope::workspace(workspace))
}

fn watch_scope(registry: &Registry, name: &str, scope: Scope) -> EventWatch {
    let (tx, rx) = watch::channel(Signal::default());
    let tx = Arc::new(tx);

    let on_event = {
        let tx = Arc::clone(&tx);
        registry.subscribe(name, scope.clone(), move |ev: &Event| {
            tx.send_modify(|s| {
                s.version += 1;
                s.last = Some(ev.clone());
            });
        })
    };
    let on_reconnect = registry.subscribe(RECONNECTED, scope, move |_: &Event| {
        tx.send_modify(|s| {
            s.version += 1;
            s.reconnects += 1;
        });
    });

    EventWatch {
        rx,
        _subscriptions: [on_event, on_reconnect],
    }
}

impl EventWatch {
    /// Increments on every matching event and every reconnect.
    pub fn version(&self) -> u64 {
        self.rx.borrow().version
    }

    pub fn reconnects(&self) -> u64 {
        self.rx.borrow().reconnects
    }

    /// The most recent matching event, if any arrived.
    pub fn last(&self) -> Option<Event> {
        self.rx.borrow().last.clone()
    }

    /// Wait until the version moves past the last one observed here.
    /// Returns `false` once the registry has been cleared.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
