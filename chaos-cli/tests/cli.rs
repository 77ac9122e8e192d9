//! End-to-end tests of the engula-chaos binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn engula_chaos(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("engula-chaos").unwrap();
    cmd.arg("--config").arg(config).env("RUST_LOG", "warn");
    cmd
}

/// Config pointing at a fake bootstrap.sh that reports `live` running servers.
fn fake_cluster(dir: &TempDir, servers: u32, live: u32) -> PathBuf {
    let script = dir.path().join("bootstrap.sh");
    let mut status = String::new();
    for id in 1..=live {
        status.push_str(&format!("echo 'server {id} running'; "));
    }
    std::fs::write(
        &script,
        format!("[ \"$1\" = status ] && {{ {status}}}\nexit 0\n"),
    )
    .unwrap();

    let config = dir.path().join("engula-chaos.toml");
    std::fs::write(
        &config,
        format!(
            r#"[cluster]
bootstrap = '{}'
interpreter = "sh"
work_dir = '{}'
servers = {servers}
core_dump_dirs = ['{}']

[supervisor]
binary = '{}'
"#,
            script.display(),
            dir.path().display(),
            dir.path().display(),
            dir.path().join("engula-supervisor-absent-91c2").display(),
        ),
    )
    .unwrap();
    config
}

#[test]
fn init_writes_config_once() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("engula-chaos.toml");

    engula_chaos(&config)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written"));
    assert!(config.exists());

    engula_chaos(&config)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    engula_chaos(&config).args(["init", "--force"]).assert().success();
}

#[test]
fn missing_config_suggests_init() {
    let dir = TempDir::new().unwrap();
    engula_chaos(&dir.path().join("absent.toml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("engula-chaos init"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("engula-chaos.toml");
    std::fs::write(&config, "[cluster]\nservers = 0\n").unwrap();

    engula_chaos(&config)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cluster.servers"));
}

#[cfg(unix)]
#[test]
fn status_reports_live_servers() {
    let dir = TempDir::new().unwrap();
    let config = fake_cluster(&dir, 3, 2);

    engula_chaos(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Live:       2/3"))
        .stdout(predicate::str::contains("Servers:    1, 2, 3"));
}

#[cfg(unix)]
#[test]
fn check_fails_on_missing_server() {
    let dir = TempDir::new().unwrap();
    let config = fake_cluster(&dir, 3, 2);

    engula_chaos(&config)
        .args(["check", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"live\": 2"))
        .stderr(predicate::str::contains("live server count mismatch"));
}

#[cfg(unix)]
#[test]
fn check_fails_on_core_dump() {
    let dir = TempDir::new().unwrap();
    let config = fake_cluster(&dir, 2, 2);
    std::fs::write(dir.path().join("core.4711"), b"").unwrap();

    engula_chaos(&config)
        .arg("check")
        .assert()
        .failure()
        .stdout(predicate::str::contains("core.4711"))
        .stderr(predicate::str::contains("core dump"));
}

#[test]
fn workload_passes_in_memory() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("engula-chaos.toml");
    engula_chaos(&config).arg("init").assert().success();

    engula_chaos(&config)
        .args(["workload", "--duration-secs", "1", "--seed", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workload passed (seed 5)"));
}
