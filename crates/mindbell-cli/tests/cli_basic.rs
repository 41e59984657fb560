//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway config file and verify
//! outputs.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(config: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_mindbell"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("event line is JSON"))
        .collect()
}

#[test]
fn test_config_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let (_, stderr, code) = run_cli(&config, &["config", "set", "scheduler.lookahead_ms", "150"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    let (stdout, _, code) = run_cli(&config, &["config", "get", "scheduler.lookahead_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "150");
}

#[test]
fn test_config_rejects_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let (_, stderr, code) = run_cli(&config, &["config", "set", "scheduler.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "stderr: {stderr}");
}

#[test]
fn test_config_list_is_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let (stdout, _, code) = run_cli(&config, &["config", "list"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["policy"]["mode"], "periodic");
}

#[test]
fn test_simulate_periodic_prints_rings() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        "[policy]\nmode = \"periodic\"\nsmall_interval_min = 5\nbig_interval_min = 15\n",
    )
    .unwrap();

    let (stdout, stderr, code) = run_cli(
        &config,
        &["simulate", "--minutes", "30", "--start", "2026-06-01T10:00:00"],
    );
    assert_eq!(code, 0, "simulate failed: {stderr}");
    let rings: Vec<String> = json_lines(&stdout)
        .iter()
        .filter(|e| e["type"] == "bell_ring")
        .map(|e| e["bell_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(rings, ["small", "small", "big", "small", "small", "big"]);
}

#[test]
fn test_simulate_rejects_invalid_policy() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        "[policy]\nmode = \"periodic\"\nsmall_interval_min = 15\nbig_interval_min = 5\n",
    )
    .unwrap();
    let (stdout, stderr, code) = run_cli(&config, &["simulate"]);
    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("error:"));
}

#[test]
fn test_render_writes_wav() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let wav = dir.path().join("small.wav");
    let (_, stderr, code) = run_cli(
        &config,
        &[
            "render",
            "small",
            "--output",
            wav.to_str().unwrap(),
            "--sample-rate",
            "8000",
        ],
    );
    assert_eq!(code, 0, "render failed: {stderr}");
    let bytes = std::fs::metadata(&wav).unwrap().len();
    // 44-byte header + 32s of 16-bit mono at 8kHz.
    assert_eq!(bytes, 44 + 32 * 8_000 * 2);
}

#[test]
fn test_render_rejects_unknown_bell() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let (_, _, code) = run_cli(&config, &["render", "medium"]);
    assert_ne!(code, 0);
}
