use crate::output::{print_json, print_table};
use clap::Subcommand;
use sgai_core::config::{Config, WarnLevel};
use sgai_core::paths;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the resolved configuration
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Write the default config file if none exists
    Init,
}

pub fn run(
    root: &Path,
    url: Option<&str>,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, url, json),
        ConfigSubcommand::Validate => validate(root, url, json),
        ConfigSubcommand::Init => init(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, url: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root, url)?;

    if json {
        return print_json(&config);
    }

    let client = &config.client;
    let server = &config.server;
    let backoff = &client.backoff;
    let rows = vec![
        row("client.base_url", &client.base_url),
        row("client.stream_url", &client.stream_url()),
        row("client.publish_url", &client.publish_url()),
        row(
            "client.request_timeout_secs",
            &client
                .request_timeout_secs
                .map_or_else(|| "none".to_string(), |s| s.to_string()),
        ),
        row("client.backoff.base_ms", &backoff.base_ms.to_string()),
        row("client.backoff.max_ms", &backoff.max_ms.to_string()),
        row("client.backoff.factor", &backoff.factor.to_string()),
        row("client.backoff.jitter", &backoff.jitter.to_string()),
        row("server.port", &server.port.to_string()),
        row("server.channel_capacity", &server.channel_capacity.to_string()),
        row("server.keep_alive_secs", &server.keep_alive_secs.to_string()),
    ];
    println!("config: {}", paths::config_path(root).display());
    print_table(&["KEY", "VALUE"], rows);
    Ok(())
}

fn row(key: &str, value: &str) -> Vec<String> {
    vec![key.to_string(), value.to_string()]
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, url: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root, url)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(root: &Path, json: bool) -> anyhow::Result<()> {
    let created = Config::init(root)?;
    let path = paths::config_path(root);

    if json {
        return print_json(&serde_json::json!({
            "path": path,
            "created": created,
        }));
    }
    if created {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists; left unchanged.", path.display());
    }
    Ok(())
}
