use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn usage_snapshot(cwd: &Path, context_tokens: u64) -> String {
    serde_json::json!({
        "model": {"id": "claude-opus-4-20250514", "display_name": "Opus"},
        "cwd": cwd,
        "context_window": {
            "context_window_size": 200000,
            "total_input_tokens": 15234,
            "total_output_tokens": 9412,
            "current_usage": {"input_tokens": context_tokens, "output_tokens": 100,
                "cache_creation_input_tokens": 0, "cache_read_input_tokens": 0}
        },
        "cost": {"total_cost_usd": 0.45, "total_duration_ms": 300000}
    })
    .to_string()
}

// Isolated HOME, wide terminal, no inherited color or config overrides.
fn statusline(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ecw-statusline").expect("binary exists");
    cmd.env("HOME", home.path())
        .env("COLUMNS", "200")
        .env_remove("NO_COLOR")
        .env_remove("ECW_STATUSLINE_CONFIG")
        .env_remove("ECW_DEBUG")
        .env_remove("ECW_LOG");
    cmd
}

fn with_config(home: &TempDir, body: &str) -> Command {
    let path = home.path().join("override.json");
    fs::write(&path, body).unwrap();
    let mut cmd = statusline(home);
    cmd.env("ECW_STATUSLINE_CONFIG", &path);
    cmd
}

fn state_file(home: &TempDir) -> std::path::PathBuf {
    home.path().join(".claude").join("ecw-statusline-state.json")
}

// -----------------------------------------------------------------------
// Diagnostics
// -----------------------------------------------------------------------

#[test]
fn empty_stdin_reports_no_data() {
    let home = TempDir::new().unwrap();
    statusline(&home)
        .write_stdin("")
        .assert()
        .success()
        .stdout("ECW: No data\n");
}

#[test]
fn invalid_json_reports_parse_error() {
    let home = TempDir::new().unwrap();
    statusline(&home)
        .write_stdin("{not json")
        .assert()
        .success()
        .stdout("ECW: Parse error\n");
}

#[test]
fn version_flag() {
    let home = TempDir::new().unwrap();
    statusline(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ecw-statusline "));
}

#[test]
fn help_goes_to_stderr() {
    let home = TempDir::new().unwrap();
    statusline(&home)
        .arg("--help")
        .assert()
        .success()
        .stderr(predicate::str::contains("Usage"));
}

// -----------------------------------------------------------------------
// Rendering
// -----------------------------------------------------------------------

#[test]
fn full_line_renders_core_segments() {
    let home = TempDir::new().unwrap();
    statusline(&home)
        .write_stdin(usage_snapshot(home.path(), 25500))
        .assert()
        .success()
        .stdout(predicate::str::contains("Opus"))
        .stdout(predicate::str::contains("13%"))
        .stdout(predicate::str::contains("$0.45"))
        .stdout(predicate::str::contains("24.6ktok"));
}

#[test]
fn no_color_env_disables_escapes() {
    let home = TempDir::new().unwrap();
    statusline(&home)
        .env("NO_COLOR", "")
        .write_stdin(usage_snapshot(home.path(), 25500))
        .assert()
        .success()
        .stdout(predicate::str::contains("\x1b").not());
}

#[test]
fn use_color_false_disables_escapes() {
    let home = TempDir::new().unwrap();
    with_config(&home, r#"{"display": {"use_color": false}}"#)
        .write_stdin(usage_snapshot(home.path(), 25500))
        .assert()
        .success()
        .stdout(predicate::str::contains("\x1b").not())
        .stdout(predicate::str::contains("Opus"));
}

#[test]
fn forced_compact_mode_drops_secondary_segments() {
    let home = TempDir::new().unwrap();
    with_config(&home, r#"{"display": {"compact_mode": true}}"#)
        .write_stdin(usage_snapshot(home.path(), 25500))
        .assert()
        .success()
        .stdout(predicate::str::contains("13%"))
        .stdout(predicate::str::contains("\u{23f1}").not())
        .stdout(predicate::str::contains("\u{26a1}").not())
        .stdout(predicate::str::contains("\u{1f4c2}").not())
        .stdout(predicate::str::contains("tok").not());
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let home = TempDir::new().unwrap();
    with_config(&home, "{broken")
        .write_stdin(usage_snapshot(home.path(), 25500))
        .assert()
        .success()
        .stdout(predicate::str::contains("13%"));
}

#[test]
fn debug_logging_goes_to_stderr_only() {
    let work = TempDir::new().unwrap();
    let snapshot = usage_snapshot(work.path(), 25500);

    let quiet_home = TempDir::new().unwrap();
    let quiet = statusline(&quiet_home)
        .write_stdin(snapshot.clone())
        .output()
        .unwrap();

    let debug_home = TempDir::new().unwrap();
    let debug = statusline(&debug_home)
        .env("ECW_DEBUG", "1")
        .write_stdin(snapshot)
        .output()
        .unwrap();

    assert!(quiet.status.success() && debug.status.success());
    assert_eq!(quiet.stdout, debug.stdout);
    assert!(quiet.stderr.is_empty());
    let stderr = String::from_utf8_lossy(&debug.stderr);
    assert!(stderr.contains("session parsed"), "stderr: {}", stderr);
}

#[test]
fn schema_mismatch_warns_on_stderr() {
    let home = TempDir::new().unwrap();
    with_config(
        &home,
        r#"{"schema_version": "0.9", "display": {"use_emoji": false}}"#,
    )
    .write_stdin(usage_snapshot(home.path(), 25500))
    .assert()
    .success()
    .stderr(predicate::str::contains("schema_version 0.9"))
    .stdout(predicate::str::contains("warning").not())
    .stdout(predicate::str::contains("13%"))
    .stdout(predicate::str::contains("\u{1f4ca}").not());
}

#[test]
fn mistyped_config_value_keeps_other_overrides() {
    let home = TempDir::new().unwrap();
    with_config(
        &home,
        r#"{"schema_version": 2, "colors": {"red": 300}, "cost": {"currency_symbol": "CAD"}}"#,
    )
    .write_stdin(usage_snapshot(home.path(), 25500))
    .assert()
    .success()
    .stdout(predicate::str::contains("CAD0.45"))
    .stderr(predicate::str::contains("warning").not());
}

// -----------------------------------------------------------------------
// Persistent state
// -----------------------------------------------------------------------

#[test]
fn corrupt_state_file_is_ignored() {
    let home = TempDir::new().unwrap();
    fs::create_dir_all(home.path().join(".claude")).unwrap();
    fs::write(state_file(&home), "\0garbage{").unwrap();
    statusline(&home)
        .write_stdin(usage_snapshot(home.path(), 25500))
        .assert()
        .success()
        .stdout(predicate::str::contains("Opus"));
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(state_file(&home)).unwrap()).unwrap();
    assert_eq!(saved["previous_context_tokens"], 25500);
}

#[test]
fn compaction_persists_across_runs() {
    let home = TempDir::new().unwrap();
    statusline(&home)
        .write_stdin(usage_snapshot(home.path(), 180_000))
        .assert()
        .success()
        .stdout(predicate::str::contains("\u{1f4c9}").not());

    statusline(&home)
        .write_stdin(usage_snapshot(home.path(), 25000))
        .assert()
        .success()
        .stdout(predicate::str::contains("180.0k\u{2192}25.0k"));

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(state_file(&home)).unwrap()).unwrap();
    assert_eq!(saved["previous_context_tokens"], 25000);
    assert_eq!(saved["last_compaction_from"], 180_000);
    assert_eq!(saved["last_compaction_to"], 25000);
    assert_eq!(saved["schema_version"], "2");
}
