use crate::output::print_json;
use anyhow::Context;
use serde_json::Value;
use sgai_core::event::{self, RECONNECTED};
use std::path::Path;
use std::time::Duration;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

pub fn run(
    root: &Path,
    url: Option<&str>,
    name: &str,
    workspace: Option<&str>,
    payload: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let body = publish_body(name, workspace, payload)?;
    let config = super::load_config(root, url)?;
    let endpoint = config.client.publish_url();

    tracing::debug!(%endpoint, event = name, "publishing");
    let response = match ureq::post(&endpoint)
        .timeout(PUBLISH_TIMEOUT)
        .send_json(body)
    {
        Ok(r) => r,
        Err(ureq::Error::Status(code, r)) => {
            let reason = r
                .into_json::<Value>()
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| "no details".to_string());
            anyhow::bail!("hub rejected '{name}' ({code}): {reason}");
        }
        Err(e) => return Err(e).with_context(|| format!("failed to reach {endpoint}")),
    };

    let reply: Value = response
        .into_json()
        .context("hub returned a non-JSON reply")?;
    if json {
        return print_json(&reply);
    }
    let delivered = reply["delivered"].as_u64().unwrap_or(0);
    match workspace {
        Some(ws) => println!("{name}@{ws} delivered to {delivered} stream(s)"),
        None => println!("{name} delivered to {delivered} stream(s)"),
    }
    Ok(())
}

/// Build the POST body, rejecting names the hub would refuse before any
/// network round trip.
fn publish_body(name: &str, workspace: Option<&str>, payload: Option<&str>) -> anyhow::Result<Value> {
    event::validate_name(name)?;
    if name == RECONNECTED {
        anyhow::bail!("'{RECONNECTED}' is reserved for client reconnect notices");
    }
    let payload = match payload {
        Some(raw) => serde_json::from_str(raw).context("--payload is not valid JSON")?,
        None => Value::Null,
    };

    let mut body = serde_json::json!({ "name": name, "payload": payload });
    if let Some(ws) = workspace {
        body["workspace"] = Value::String(ws.to_string());
    }
    Ok(body)
}
