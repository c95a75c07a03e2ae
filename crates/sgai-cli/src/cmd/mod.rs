pub mod config;
pub mod emit;
pub mod serve;
pub mod watch;

use anyhow::Context;
use sgai_core::config::Config;
use std::path::Path;

/// Load the project config and apply a `--url` override.
pub fn load_config(root: &Path, url: Option<&str>) -> anyhow::Result<Config> {
    let config = Config::load(root).context("failed to load config")?;
    Ok(match url {
        Some(u) => config.with_base_url(u),
        None => config,
    })
}
