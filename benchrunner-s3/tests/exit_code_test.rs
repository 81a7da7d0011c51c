use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const BIN: &str = env!("CARGO_BIN_EXE_s3-benchrunner-rust");

fn write_workload(dir: &Path, file_name: &str, json: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, json).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .env_clear()
        .output()
        .unwrap()
}

fn run_memory(workload: &Path) -> Output {
    run(&[
        "memory",
        workload.to_str().unwrap(),
        "bench-bucket",
        "us-west-2",
        "10",
    ])
}

#[test]
fn test_successful_workload_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workload(
        dir.path(),
        "download-1KiB.run.json",
        r#"{"version": 2, "filesOnDisk": false, "checksum": null,
            "maxRepeatCount": 2, "maxRepeatSecs": 600,
            "tasks": [{"action": "download", "key": "a", "size": 1024}]}"#,
    );

    let output = run_memory(&path);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run:1 Secs:"));
    assert!(stdout.contains("Run:2 Secs:"));
    assert!(stdout.contains("Overall Throughput (Gb/s)"));
}

#[test]
fn test_skipped_workload_exits_123() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workload(
        dir.path(),
        "old.run.json",
        r#"{"version": 1, "filesOnDisk": false, "checksum": null,
            "maxRepeatCount": 1, "maxRepeatSecs": 1, "tasks": []}"#,
    );

    let output = run_memory(&path);
    assert_eq!(output.status.code(), Some(123));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Skipping benchmark"));
}

#[test]
fn test_malformed_workload_exits_255() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workload(dir.path(), "broken.run.json", "{ not json");

    let output = run_memory(&path);
    assert_eq!(output.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&output.stderr).contains("FAIL"));
}

#[test]
fn test_argument_errors_exit_255() {
    let output = run(&["nosuch-client", "w.json", "b", "r", "10"]);
    assert_eq!(output.status.code(), Some(255));

    let output = run(&["memory", "w.json"]);
    assert_eq!(output.status.code(), Some(255));

    let output = run(&["memory", "w.json", "b", "r", "10", "--no-such-flag"]);
    assert_eq!(output.status.code(), Some(255));
}

#[test]
fn test_help_exits_zero() {
    let output = run(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("S3_CLIENT"));
}
