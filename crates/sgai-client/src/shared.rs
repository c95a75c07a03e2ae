//! Process-wide client slot.
//!
//! Most code should receive an [`EventClient`] by injection. This slot exists
//! for entry points that need "the" connection of the process; [`reset`]
//! empties it so tests start from a clean state.

use std::sync::{Mutex, MutexGuard, OnceLock};

use sgai_core::config::ClientConfig;

use crate::{EventClient, Result};

static SLOT: OnceLock<Mutex<Option<EventClient>>> = OnceLock::new();

fn slot() -> MutexGuard<'static, Option<EventClient>> {
    SLOT.get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// Return the process client, building an HTTP client from `config` on first
/// use. Later calls ignore `config`.
pub fn init(config: &ClientConfig) -> Result<EventClient> {
    let mut slot = slot();
    if let Some(client) = slot.as_ref() {
        return Ok(client.clone());
    }
    let client = EventClient::from_config(config)?;
    *slot = Some(client.clone());
    Ok(client)
}

/// Install `client` unless one is already present; returns the one in use.
pub fn install(client: EventClient) -> EventClient {
    slot().get_or_insert(client).clone()
}

pub fn get() -> Option<EventClient> {
    slot().as_ref().cloned()
}

/// Stop the process client, drop its listeners and empty the slot.
pub fn reset() {
    let client = slot().take();
    if let Some(client) = client {
        client.reset();
    }
}
