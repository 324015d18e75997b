//! Runs the `sift-exec` binary against recorded SSE fixtures.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "..", "core", "tests", "fixtures", name]
        .iter()
        .collect()
}

fn sift_exec(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sift-exec").unwrap();
    cmd.env("SIFT_HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn prints_finished_turn() {
    let home = TempDir::new().unwrap();
    sift_exec(&home)
        .arg("--color")
        .arg("never")
        .arg("--fixture")
        .arg(fixture_path("volcanoes.sse"))
        .arg("volcanoes")
        .assert()
        .success()
        .stdout(predicate::str::contains("Volcanoes are geological vents."))
        .stdout(predicate::str::contains("1. A (a.example)"))
        .stdout(predicate::str::contains("plate tectonics"));
}

#[test]
fn json_mode_prints_one_turn_per_query() {
    let home = TempDir::new().unwrap();
    let output = sift_exec(&home)
        .arg("--json")
        .arg("--fixture")
        .arg(fixture_path("volcanoes.sse"))
        .arg("volcanoes")
        .arg("volcanoes again")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let turns: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["query"], "volcanoes");
    assert_eq!(turns[1]["query"], "volcanoes again");
    assert_eq!(turns[1]["status"], "complete");
    assert_eq!(turns[0]["summaryText"], "Volcanoes are geological vents.");
}

#[test]
fn truncated_stream_exits_with_failure() {
    let home = TempDir::new().unwrap();
    let fixture = home.path().join("truncated.sse");
    std::fs::write(&fixture, "event: summary_part\ndata: \"Hel\"\n").unwrap();

    sift_exec(&home)
        .arg("--color")
        .arg("never")
        .arg("--fixture")
        .arg(&fixture)
        .arg("hello")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("error: stream closed unexpectedly"));
}

#[test]
fn malformed_config_is_reported() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("config.toml"), "base_url = [").unwrap();

    sift_exec(&home)
        .arg("q")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}
