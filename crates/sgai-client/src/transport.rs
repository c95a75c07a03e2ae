use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest_eventsource::{retry, Event as SseEvent, EventSource};
use sgai_core::config::ClientConfig;

use crate::{ClientError, Result};

// ─── Transport events ─────────────────────────────────────────────────────

/// One undecoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// The SSE `event:` field (`"message"` when the server sent none).
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// What an open transport reports to the connection driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(RawMessage),
    /// The transport failed. Nothing further is read from it.
    Error(String),
}

pub type TransportStream = BoxStream<'static, TransportEvent>;

/// Opens event-stream connections.
///
/// Every call to [`Transport::open`] is one connection attempt. Dropping the
/// returned stream closes the connection; the stream ending on its own is
/// treated as a failure by the driver.
pub trait Transport: Send + Sync + 'static {
    fn open(&self) -> TransportStream;

    /// Human-readable endpoint, used in log lines.
    fn endpoint(&self) -> String;
}

// ─── HttpTransport ────────────────────────────────────────────────────────

/// `GET <base_url><stream_path>` with `Accept: text/event-stream`.
///
/// Automatic retries inside `reqwest_eventsource` are disabled; the
/// connection driver owns the retry schedule.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ClientError::Http)?;
        Ok(Self {
            client,
            url: config.stream_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn open(&self) -> TransportStream {
        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream");

        let mut source = match EventSource::new(request) {
            Ok(source) => source,
            Err(e) => {
                let msg = format!("cannot build stream request: {e}");
                return stream::once(async move { TransportEvent::Error(msg) }).boxed();
            }
        };
        source.set_retry_policy(Box::new(retry::Never));

        source
            .map(|item| match item {
                Ok(SseEvent::Open) => TransportEvent::Open,
                Ok(SseEvent::Message(msg)) => TransportEvent::Message(RawMessage {
                    event: msg.event,
                    data: msg.data,
                    id: (!msg.id.is_empty()).then_some(msg.id),
                }),
                Err(e) => TransportEvent::Error(describe_error(&e)),
            })
            .boxed()
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

fn describe_error(error: &reqwest_eventsource::Error) -> String {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, _) => {
            format!("unexpected status {status}")
        }
        reqwest_eventsource::Error::InvalidContentType(content_type, _) => {
            format!("unexpected content type {content_type:?}")
        }
        reqwest_eventsource::Error::StreamEnded => "stream ended".to_string(),
        reqwest_eventsource::Error::Transport(e) => format!("transport error: {e}"),
        other => other.to_string(),
    }
}
