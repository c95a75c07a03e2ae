use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use serde::Serialize;
use sgai_core::config::ClientConfig;
use sgai_core::event::{self, Event, Scope};
use sgai_core::{Backoff, BackoffConfig, Registry, Subscription};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::{HttpTransport, RawMessage, Transport, TransportEvent};
use crate::Result;

// ─── ConnectionState ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// First attempt after `start()`, not yet open.
    Connecting,
    Open,
    /// The stream failed; waiting out the backoff or re-opening.
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── ConnectionStats ──────────────────────────────────────────────────────

/// Counters since construction or the last [`EventClient::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Transport open attempts.
    pub opens: u64,
    /// Opens that followed a failure.
    pub reconnects: u64,
    /// Events decoded and handed to the registry.
    pub dispatched: u64,
    /// Frames dropped as malformed.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicU64,
    reconnects: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            opens: self.opens.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn clear(&self) {
        for counter in [
            &self.opens,
            &self.reconnects,
            &self.dispatched,
            &self.dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

// ─── Shared driver state ──────────────────────────────────────────────────

/// Everything the driver task needs. Owned jointly by the client handle and
/// the running driver; it never points back at the handle, so dropping the
/// last [`EventClient`] still tears the driver down.
struct Shared {
    transport: Arc<dyn Transport>,
    registry: Registry,
    backoff: BackoffConfig,
    state: watch::Sender<ConnectionState>,
    counters: Counters,
}

impl Shared {
    /// Move to `next` unless `token` has been cancelled. The check runs under
    /// the watch lock, so a stopped driver can never overwrite `Closed`.
    fn transition(&self, token: &CancellationToken, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if token.is_cancelled() || *current == next {
                return false;
            }
            tracing::debug!(from = %current, to = %next, "connection state");
            *current = next;
            true
        });
    }

    fn deliver(&self, raw: &RawMessage) {
        match Event::from_sse(&raw.event, &raw.data) {
            Ok(ev) if ev.name == event::RECONNECTED => {
                Counters::bump(&self.counters.dropped);
                tracing::warn!(event = %ev, "dropping server event with reserved name");
            }
            Ok(ev) => {
                let listeners = self.registry.dispatch(&ev);
                Counters::bump(&self.counters.dispatched);
                tracing::debug!(event = %ev, listeners, "event dispatched");
            }
            Err(e) => {
                Counters::bump(&self.counters.dropped);
                tracing::warn!(
                    error = %e,
                    sse_event = %raw.event,
                    "dropping malformed event"
                );
            }
        }
    }
}

struct Run {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct ClientInner {
    shared: Arc<Shared>,
    run: Mutex<Option<Run>>,
}

impl ClientInner {
    fn run(&self) -> MutexGuard<'_, Option<Run>> {
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let run = match self.run.get_mut() {
            Ok(run) => run.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(run) = run {
            run.token.cancel();
        }
    }
}

// ─── EventClient ──────────────────────────────────────────────────────────

/// One shared event-stream connection plus its subscription registry.
///
/// The handle is cheap to clone; all clones drive the same connection.
/// At most one driver task is alive per client: [`EventClient::start`] is a
/// no-op while a connection is connecting, open or reconnecting.
///
/// ```rust,ignore
/// use sgai_client::EventClient;
/// use sgai_core::{config::ClientConfig, event, Scope};
///
/// let client = EventClient::from_config(&ClientConfig::default())?;
/// let _sub = client.subscribe(event::CHANGES_UPDATE, Scope::workspace("proj-a"), |ev| {
///     println!("refetch changes for {ev}");
/// });
/// client.start();
/// ```
#[derive(Clone)]
pub struct EventClient {
    inner: Arc<ClientInner>,
}

impl EventClient {
    pub fn new(transport: Arc<dyn Transport>, backoff: BackoffConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        let shared = Arc::new(Shared {
            transport,
            registry: Registry::new(),
            backoff,
            state,
            counters: Counters::default(),
        });
        Self {
            inner: Arc::new(ClientInner {
                shared,
                run: Mutex::new(None),
            }),
        }
    }

    /// Build a client that streams from `config.stream_url()` over HTTP.
    ///
    /// Refuses a config with error-level problems, such as a zero backoff
    /// floor that would re-open a failing stream without pause.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.check()?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config.backoff.clone()))
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.shared.registry
    }

    pub fn subscribe<F>(&self, name: impl Into<String>, scope: Scope, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.registry().subscribe(name, scope, callback)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state.subscribe()
    }

    /// Resolve once the connection reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) {
        let mut rx = self.watch_state();
        let _ = rx.wait_for(|state| *state == target).await;
    }

    pub fn stats(&self) -> ConnectionStats {
        self.inner.shared.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .run()
            .as_ref()
            .is_some_and(|run| !run.token.is_cancelled())
    }

    /// Start the connection. Returns `false` when one is already live.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut run = self.inner.run();
        if run.as_ref().is_some_and(|r| !r.token.is_cancelled()) {
            tracing::debug!("event stream already running");
            return false;
        }

        let token = CancellationToken::new();
        let shared = Arc::clone(&self.inner.shared);
        shared.state.send_replace(ConnectionState::Connecting);
        tracing::info!(endpoint = %shared.transport.endpoint(), "starting event stream");
        let handle = tokio::spawn(drive(shared, token.clone()));
        *run = Some(Run { token, handle });
        true
    }

    /// Close the connection and cancel any scheduled retry. Safe in every
    /// state. Once this returns, no further event is dispatched and no
    /// reconnect is attempted.
    pub fn stop(&self) {
        let run = self.inner.run().take();
        if let Some(run) = &run {
            run.token.cancel();
            tracing::info!("event stream stopped");
        }
        self.inner
            .shared
            .state
            .send_replace(ConnectionState::Closed);
    }

    /// [`EventClient::stop`], then wait for the driver task to release the
    /// transport.
    pub async fn stop_and_wait(&self) {
        let run = self.inner.run().take();
        // Cancel first: a driver mid-transition must see the token before
        // `Closed` is published, or it could overwrite it.
        if let Some(run) = &run {
            run.token.cancel();
        }
        self.inner
            .shared
            .state
            .send_replace(ConnectionState::Closed);
        if let Some(run) = run {
            let _ = run.handle.await;
            tracing::info!("event stream stopped");
        }
    }

    /// Stop, drop every listener and zero the counters.
    pub fn reset(&self) {
        self.stop();
        self.registry().clear();
        self.inner.shared.counters.clear();
    }
}

impl fmt::Debug for EventClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventClient")
            .field("endpoint", &self.inner.shared.transport.endpoint())
            .field("state", &self.state())
            .field("listeners", &self.registry().len())
            .finish()
    }
}

// ─── Driver ───────────────────────────────────────────────────────────────

/// Open, read, and on failure back off and re-open, until `token` is
/// cancelled. Retries never stop on their own.
async fn drive(shared: Arc<Shared>, token: CancellationToken) {
    let endpoint = shared.transport.endpoint();
    let mut backoff = Backoff::new(shared.backoff.clone());
    let mut has_opened = false;

    loop {
        Counters::bump(&shared.counters.opens);
        let mut stream = shared.transport.open();

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                next = stream.next() => next,
            };
            if token.is_cancelled() {
                return;
            }
            match next {
                Some(TransportEvent::Open) => {
                    backoff.reset();
                    shared.transition(&token, ConnectionState::Open);
                    if has_opened {
                        Counters::bump(&shared.counters.reconnects);
                        tracing::info!(endpoint = %endpoint, "event stream reconnected");
                        shared.registry.broadcast(&Event::global(event::RECONNECTED));
                    } else {
                        tracing::info!(endpoint = %endpoint, "event stream open");
                    }
                    has_opened = true;
                }
                Some(TransportEvent::Message(raw)) => shared.deliver(&raw),
                Some(TransportEvent::Error(reason)) => break reason,
                None => break "stream ended".to_string(),
            }
        };

        // Release the failed connection before waiting.
        drop(stream);

        let delay = backoff.next_delay();
        shared.transition(&token, ConnectionState::Reconnecting);
        tracing::warn!(
            endpoint = %endpoint,
            error = %reason,
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "event stream failed; reconnecting"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
