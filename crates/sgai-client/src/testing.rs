//! Scripted transport for driving an [`EventClient`](crate::EventClient)
//! without a network.
//!
//! Each connection attempt made by the client surfaces as a [`StreamHandle`]
//! the test uses to emit open/message/error signals.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::transport::{RawMessage, Transport, TransportEvent, TransportStream};

/// A [`Transport`] whose connections are fed by the test.
pub struct ChannelTransport {
    count: Arc<AtomicUsize>,
    handles: mpsc::UnboundedSender<StreamHandle>,
}

/// Observes the connection attempts made through a [`ChannelTransport`].
pub struct Opens {
    count: Arc<AtomicUsize>,
    handles: mpsc::UnboundedReceiver<StreamHandle>,
}

impl ChannelTransport {
    pub fn new() -> (Self, Opens) {
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                count: Arc::clone(&count),
                handles: tx,
            },
            Opens { count, handles: rx },
        )
    }
}

impl Transport for ChannelTransport {
    fn open(&self) -> TransportStream {
        self.count.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _ = self.handles.send(StreamHandle { tx });
        stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed()
    }

    fn endpoint(&self) -> String {
        "channel://test".to_string()
    }
}

impl Opens {
    /// Total `open()` calls so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait for the next connection attempt. `None` once the transport has
    /// been dropped and every attempt was consumed.
    pub async fn next(&mut self) -> Option<StreamHandle> {
        self.handles.recv().await
    }

    pub fn try_next(&mut self) -> Option<StreamHandle> {
        self.handles.try_recv().ok()
    }
}

/// The server side of one scripted connection.
///
/// Every method returns `false` once the client has closed the connection.
pub struct StreamHandle {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl StreamHandle {
    pub fn open(&self) -> bool {
        self.tx.send(TransportEvent::Open).is_ok()
    }

    pub fn message(&self, event: &str, data: &str) -> bool {
        self.tx
            .send(TransportEvent::Message(RawMessage {
                event: event.to_string(),
                data: data.to_string(),
                id: None,
            }))
            .is_ok()
    }

    /// Send a `message` frame carrying `data` as its JSON body.
    pub fn json(&self, data: serde_json::Value) -> bool {
        self.message("message", &data.to_string())
    }

    pub fn error(&self, reason: &str) -> bool {
        self.tx.send(TransportEvent::Error(reason.to_string())).is_ok()
    }

    /// Whether the client has dropped this connection.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
