#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use sgai_core::Event;
use sgai_server::AppState;
use std::time::Duration;
use tempfile::TempDir;

fn sgai(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sgai").unwrap();
    cmd.current_dir(dir.path())
        .env("SGAI_ROOT", dir.path())
        .env_remove("SGAI_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::create_dir_all(dir.path().join(".sgai")).unwrap();
    std::fs::write(dir.path().join(".sgai/config.yaml"), yaml).unwrap();
}

/// A loopback port with nothing listening on it.
fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

/// Run a hub on a background runtime; returns its state and base URL.
fn spawn_hub() -> (AppState, String) {
    let state = AppState::new(16, Duration::from_secs(15));
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();
    let hub_state = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let _ = sgai_server::serve_on(listener, hub_state).await;
        });
    });
    (state, format!("http://127.0.0.1:{port}"))
}

// ---------------------------------------------------------------------------
// sgai config
// ---------------------------------------------------------------------------

#[test]
fn config_init_writes_defaults_once() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
    assert!(dir.path().join(".sgai/config.yaml").exists());

    sgai(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn config_show_json_reports_defaults() {
    let dir = TempDir::new().unwrap();
    let output = sgai(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["client"]["base_url"], "http://localhost:3141");
    assert_eq!(json["client"]["backoff"]["base_ms"], 1000);
    assert_eq!(json["server"]["port"], 3141);
}

#[test]
fn config_show_applies_url_override() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["config", "show", "--url", "http://hub.internal:9000"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "http://hub.internal:9000/api/v1/events/stream",
        ));
}

#[test]
fn config_show_reads_file() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "client:\n  backoff:\n    max_ms: 5000\n");
    let output = sgai(&dir)
        .args(["config", "show", "-j"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["client"]["backoff"]["max_ms"], 5000);
    assert_eq!(json["client"]["backoff"]["base_ms"], 1000);
}

#[test]
fn config_validate_accepts_defaults() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "client:\n  backoff:\n    base_ms: 0\n");
    sgai(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_validate_rejects_bad_url_override() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["config", "validate", "--url", "ftp://nope"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// sgai emit
// ---------------------------------------------------------------------------

#[test]
fn emit_rejects_invalid_name_without_network() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["emit", "bad name", "--url", &dead_url()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid event name"));
}

#[test]
fn emit_rejects_bad_payload() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["emit", "changes:update", "--payload", "{oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--payload is not valid JSON"));
}

#[test]
fn emit_reports_unreachable_hub() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["emit", "changes:update", "--url", &dead_url()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to reach"));
}

#[test]
fn emit_delivers_to_open_streams() {
    let dir = TempDir::new().unwrap();
    let (state, url) = spawn_hub();
    let mut rx = state.events.subscribe();

    sgai(&dir)
        .args(["emit", "changes:update", "-w", "proj-a", "--url", &url])
        .args(["--payload", r#"{"files":2}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "changes:update@proj-a delivered to 1 stream(s)",
        ));

    let ev = rx.try_recv().unwrap();
    assert_eq!(ev.workspace.as_deref(), Some("proj-a"));
    assert_eq!(ev.payload["files"], 2);
}

#[test]
fn emit_json_prints_hub_reply() {
    let dir = TempDir::new().unwrap();
    let (_state, url) = spawn_hub();
    let output = sgai(&dir)
        .args(["emit", "session:update", "--json", "--url", &url])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["delivered"], 0);
}

// ---------------------------------------------------------------------------
// sgai watch
// ---------------------------------------------------------------------------

#[test]
fn watch_prints_events_and_state_changes() {
    let dir = TempDir::new().unwrap();
    let (state, url) = spawn_hub();

    let publisher = state.clone();
    std::thread::spawn(move || {
        for _ in 0..300 {
            if publisher.subscriber_count() > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        publisher.publish(Event::scoped("changes:update", "proj-a"));
        publisher.publish(Event::scoped("changes:update", "proj-b"));
    });

    let output = sgai(&dir)
        .args(["watch", "-j", "-w", "proj-a", "--url", &url])
        .timeout(Duration::from_secs(4))
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();

    assert!(lines
        .iter()
        .any(|l| l["type"] == "state" && l["state"] == "open"));
    let events: Vec<_> = lines.iter().filter(|l| l["type"] == "event").collect();
    assert_eq!(events.len(), 1, "{stdout}");
    assert_eq!(events[0]["workspace"], "proj-a");
}

#[test]
fn watch_rejects_invalid_event_name() {
    let dir = TempDir::new().unwrap();
    sgai(&dir)
        .args(["watch", "--event", "no good", "--url", &dead_url()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid event name"));
}

#[test]
fn watch_refuses_zero_backoff_floor() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "client:\n  backoff:\n    base_ms: 0\n    max_ms: 0\n");
    sgai(&dir)
        .args(["watch", "--url", &dead_url()])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"))
        .stderr(predicate::str::contains("base_ms must be greater than zero"));
}
