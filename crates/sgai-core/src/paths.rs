use std::path::{Path, PathBuf};

pub const SGAI_DIR: &str = ".sgai";
/// Config file name inside [`SGAI_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

/// Path of the event stream endpoint, relative to the backend base URL.
pub const EVENTS_STREAM_PATH: &str = "/api/v1/events/stream";
/// Publish endpoint of the reference hub.
pub const EVENTS_PUBLISH_PATH: &str = "/api/v1/events";
pub const HEALTH_PATH: &str = "/api/v1/health";

pub fn sgai_dir(root: &Path) -> PathBuf {
    root.join(SGAI_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    sgai_dir(root).join(CONFIG_FILE)
}

/// Join a base URL and an absolute path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
