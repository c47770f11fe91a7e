//! Smoke tests for the `ke` binary

use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use kgsm_events::events::{InstanceStarted, LifecycleManager};
use kgsm_events::service::EventService;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Build a `ke` command isolated from the user's config and log dirs
fn ke_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("ke");
    cmd.timeout(Duration::from_secs(15))
        .current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_tags_lists_every_known_tag() {
    let home = TempDir::new().unwrap();
    ke_cmd(&home)
        .arg("tags")
        .assert()
        .success()
        .stdout(contains("instance_started"))
        .stdout(contains("instance_backup_restored"))
        .stdout(contains("instance_uninstalled"));
}

#[test]
fn test_emit_to_missing_socket_fails() {
    let home = TempDir::new().unwrap();
    let socket = home.path().join("nobody-listening.sock");
    ke_cmd(&home)
        .args(["emit", "instance_removed", r#"{"instance_name":"x"}"#, "--socket"])
        .arg(&socket)
        .assert()
        .failure()
        .stderr(contains("Failed to publish"));
}

#[test]
fn test_emit_rejects_invalid_json() {
    let home = TempDir::new().unwrap();
    ke_cmd(&home)
        .args(["emit", "instance_removed", "{not json"])
        .assert()
        .failure()
        .stderr(contains("DATA_JSON"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let home = TempDir::new().unwrap();
    ke_cmd(&home)
        .args(["--config", "missing.yml", "tags"])
        .assert()
        .failure()
        .stderr(contains("Failed to load").and(contains("missing.yml")));
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    ke_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("listen").and(contains("emit")).and(contains("tags")));
}

#[tokio::test]
async fn test_emit_reaches_listening_service() {
    let home = TempDir::new().unwrap();
    let socket = home.path().join("kgsm.sock");

    let service = EventService::new(&socket);
    let (tx, mut rx) = mpsc::unbounded_channel();
    service
        .register_handler(move |event: InstanceStarted| {
            let _ = tx.send(event);
            async { Ok(()) }
        })
        .unwrap();
    service.initialize().unwrap();

    let mut cmd = ke_cmd(&home);
    cmd.args([
        "emit",
        "instance_started",
        r#"{"instance_name":"factorio-1","lifecycle_manager":"systemd"}"#,
        "--socket",
    ])
    .arg(&socket);
    tokio::task::spawn_blocking(move || {
        cmd.assert().success().stdout(contains("Sent"));
    })
    .await
    .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("handler channel closed");
    assert_eq!(event.instance_name, "factorio-1");
    assert_eq!(event.lifecycle_manager, LifecycleManager::Systemd);

    service.dispose().await;
}
