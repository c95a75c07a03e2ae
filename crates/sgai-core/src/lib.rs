pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod io;
pub mod paths;
pub mod registry;

pub use backoff::{Backoff, BackoffConfig};
pub use error::{CoreError, Result};
pub use event::{Event, Scope};
pub use registry::{Registry, Subscription, SubscriptionId};
