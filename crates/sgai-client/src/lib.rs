//! `sgai-client`: the shared event-stream connection used by sgai consumers.
//!
//! One [`EventClient`] holds one Server-Sent Events connection to
//! `/api/v1/events/stream` and fans decoded events out to listeners keyed by
//! event name and workspace. Events are re-fetch signals: consumers reload
//! authoritative state over REST when one arrives.
//!
//! # Architecture
//!
//! ```text
//! ClientConfig
//!     │
//!     ▼
//! HttpTransport   ← reqwest + reqwest-eventsource, built-in retries disabled
//!     │              one open() per connection attempt
//!     ▼
//! driver task     ← owns Backoff; Connecting → Open → Reconnecting → …
//!     │              cancelled through a CancellationToken on stop()
//!     ▼
//! Registry        ← (name, workspace) + (name, global) listeners,
//!     │              synchronous dispatch in arrival order
//!     ▼
//! EventWatch      ← version counter per subscription, bumped on reconnect
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use sgai_client::{hooks, EventClient};
//! use sgai_core::{config::ClientConfig, event};
//!
//! let client = EventClient::from_config(&ClientConfig::default())?;
//! let mut changes = hooks::use_workspace_sse_event(&client, event::CHANGES_UPDATE, "proj-a");
//! client.start();
//!
//! while changes.changed().await {
//!     reload_changes("proj-a").await?;
//! }
//! ```

pub mod connection;
pub mod error;
pub mod hooks;
pub mod shared;
pub mod transport;

#[doc(hidden)]
pub mod testing;

pub use connection::{ConnectionState, ConnectionStats, EventClient};
pub use error::ClientError;
pub use hooks::{use_sse_event, use_workspace_sse_event, EventWatch};
pub use transport::{HttpTransport, RawMessage, Transport, TransportEvent, TransportStream};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClientError>;
