use crate::output::print_json_line;
use sgai_client::{ConnectionState, EventClient};
use sgai_core::event::{self, Event, Scope, RECONNECTED};
use std::path::Path;

/// Names watched when no `--event` is given.
const DEFAULT_EVENTS: &[&str] = &[
    event::CHANGES_UPDATE,
    event::MESSAGES_NEW,
    event::SESSION_UPDATE,
    event::LOG_APPEND,
    event::TODO_UPDATED,
];

pub fn run(
    root: &Path,
    url: Option<&str>,
    workspace: Option<&str>,
    events: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let names = watch_names(events)?;
    let config = super::load_config(root, url)?;
    let scope = Scope::from(workspace.filter(|w| !w.is_empty()));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let client = EventClient::from_config(&config.client)?;
        let subscriptions: Vec<_> = names
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(RECONNECTED))
            .map(|name| client.subscribe(name, scope.clone(), move |ev| print_event(ev, json)))
            .collect();

        tracing::info!(url = %config.client.stream_url(), %scope, "watching");
        let mut states = client.watch_state();
        client.start();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    print_state(state, json);
                }
            }
        }

        client.stop_and_wait().await;
        drop(subscriptions);
        let stats = client.stats();
        tracing::info!(
            opens = stats.opens,
            reconnects = stats.reconnects,
            dispatched = stats.dispatched,
            dropped = stats.dropped,
            "stopped"
        );
        Ok(())
    })
}

fn watch_names(events: &[String]) -> anyhow::Result<Vec<String>> {
    if events.is_empty() {
        return Ok(DEFAULT_EVENTS.iter().map(|s| s.to_string()).collect());
    }
    let mut names = Vec::with_capacity(events.len());
    for name in events {
        event::validate_name(name)?;
        if name == RECONNECTED {
            anyhow::bail!("'{RECONNECTED}' is always watched; pass a regular event name");
        }
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    Ok(names)
}

fn print_event(ev: &Event, json: bool) {
    if json {
        let _ = print_json_line(&serde_json::json!({
            "type": "event",
            "at": chrono::Utc::now().to_rfc3339(),
            "name": ev.name,
            "workspace": ev.workspace,
            "payload": ev.payload,
        }));
        return;
    }
    let at = chrono::Local::now().format("%H:%M:%S");
    if ev.name == RECONNECTED {
        println!("{at}  reconnected; reload state");
    } else if ev.payload.is_null() {
        println!("{at}  {:<16} {}", ev.name, ev.scope());
    } else {
        println!("{at}  {:<16} {}  {}", ev.name, ev.scope(), ev.payload);
    }
}

fn print_state(state: ConnectionState, json: bool) {
    if json {
        let _ = print_json_line(&serde_json::json!({
            "type": "state",
            "at": chrono::Utc::now().to_rfc3339(),
            "state": state,
        }));
    } else {
        println!("{}  [{state}]", chrono::Local::now().format("%H:%M:%S"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_when_none_given() {
        let names = watch_names(&[]).unwrap();
        assert_eq!(names.len(), DEFAULT_EVENTS.len());
        assert!(names.iter().any(|n| n == event::CHANGES_UPDATE));
    }

    #[test]
    fn explicit_names_are_deduplicated() {
        let names = watch_names(&["log:append".into(), "log:append".into()]).unwrap();
        assert_eq!(names, vec!["log:append".to_string()]);
    }

    #[test]
    fn invalid_and_reserved_names_fail() {
        assert!(watch_names(&["two words".into()]).is_err());
        assert!(watch_names(&[RECONNECTED.into()]).is_err());
    }
}
