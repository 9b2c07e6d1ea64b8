//! End-to-end tests for `layerstack simulate`.

use std::io::Write;
use std::process::Stdio;

mod fixtures;
use fixtures::*;

/// Enter Adjust through the keys, select Dvorak, release, type one key.
const SELECT_DVORAK: &str = "\
# enter adjust and pick dvorak
down 1 0
down 1 4
down 0 2
up 0 2
up 1 4
up 1 0

down 0 0   # semicolon on dvorak
up 0 0
";

fn run_json(env: &TestEnv, extra: &[&str]) -> serde_json::Value {
    let keymap = env.keymap_arg();
    let mut args = vec!["simulate", "--keymap", keymap.as_str(), "--json"];
    args.extend_from_slice(extra);

    let output = env.command(&args).output().expect("Failed to execute command");
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("Should parse JSON output")
}

#[test]
fn test_simulate_select_base_through_adjust() {
    let env = TestEnv::new();
    let events = env.write("events.txt", SELECT_DVORAK);
    let state = env.path().join("state.toml");

    let result = run_json(
        &env,
        &[
            "--events",
            events.to_str().unwrap(),
            "--state-file",
            state.to_str().unwrap(),
        ],
    );

    let steps = result["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 8);
    assert_eq!(result["mode"], "tracked");

    // After both modifiers are down: Adjust only
    assert_eq!(steps[1]["active_layers"], serde_json::json!([16]));
    assert_eq!(steps[1]["tri_state"], "adjust");

    // Selector key on Adjust
    assert_eq!(steps[2]["action"]["kind"], "select_base");
    assert_eq!(steps[2]["action"]["layer"], 1);
    assert_eq!(steps[2]["base_layer"], 1);

    // Line numbers count comments and blank lines
    assert_eq!(steps[6]["line"], 9);
    assert_eq!(steps[6]["hid"], "KC_SCLN");
    assert_eq!(steps[6]["layer"], 1);

    assert_eq!(result["final_base_layer"], 1);
    assert_eq!(result["invariant_violations"], 0);
    assert!(state.exists(), "Base layer should be persisted");
}

#[test]
fn test_simulate_base_survives_restart() {
    let env = TestEnv::new();
    let state = env.path().join("state.toml");
    let first = env.write("first.txt", "base dvorak\n");
    let second = env.write("second.txt", "down 0 0\nup 0 0\n");

    run_json(
        &env,
        &["--events", first.to_str().unwrap(), "--state-file", state.to_str().unwrap()],
    );
    let result = run_json(
        &env,
        &["--events", second.to_str().unwrap(), "--state-file", state.to_str().unwrap()],
    );

    assert_eq!(result["steps"][0]["hid"], "KC_SCLN");
    assert_eq!(result["final_base_layer"], 1);
}

#[test]
fn test_simulate_default_state_file_in_config_dir() {
    let env = TestEnv::new();
    let events = env.write("events.txt", "base DVORAK\n");

    run_json(&env, &["--events", events.to_str().unwrap()]);

    assert!(env.default_state_file().exists());
}

#[test]
fn test_simulate_no_persist_writes_nothing() {
    let env = TestEnv::new();
    let events = env.write("events.txt", "base DVORAK\n");
    let state = env.path().join("state.toml");

    let result = run_json(
        &env,
        &[
            "--events",
            events.to_str().unwrap(),
            "--state-file",
            state.to_str().unwrap(),
            "--no-persist",
        ],
    );

    assert_eq!(result["final_base_layer"], 1);
    assert!(!state.exists());
    assert!(!env.default_state_file().exists());
}

#[test]
fn test_simulate_mode_changes_chatter_handling() {
    let env = TestEnv::new();
    let events = env.write("events.txt", "lower down\nraise down\nlower down\n");

    let exclusive = run_json(
        &env,
        &["--events", events.to_str().unwrap(), "--mode", "exclusive", "--no-persist"],
    );
    assert_eq!(exclusive["mode"], "exclusive");
    assert_eq!(exclusive["steps"][2]["tri_state"], "lower");

    let tracked = run_json(
        &env,
        &["--events", events.to_str().unwrap(), "--mode", "tracked", "--no-persist"],
    );
    assert_eq!(tracked["steps"][2]["tri_state"], "adjust");
}

#[test]
fn test_simulate_simple_mode_keeps_modifiers() {
    let env = TestEnv::new();
    let events = env.write("events.txt", "lower down\nraise down\n");

    let result = run_json(
        &env,
        &["--events", events.to_str().unwrap(), "--mode", "simple", "--no-persist"],
    );
    assert_eq!(
        result["steps"][1]["active_layers"],
        serde_json::json!([16, 3, 2])
    );
}

#[test]
fn test_simulate_reads_stdin() {
    let env = TestEnv::new();
    let keymap = env.keymap_arg();

    let mut child = env
        .command(&["simulate", "--keymap", &keymap, "--events", "-", "--no-persist"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn command");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"down 0 1\nup 0 1\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Mode: tracked"), "stdout: {stdout}");
    assert!(stdout.contains("KC_W"), "stdout: {stdout}");
    assert!(stdout.contains("Final base layer: 0"), "stdout: {stdout}");
}

#[test]
fn test_simulate_uses_config_defaults() {
    let env = TestEnv::new();
    let keymap = env.keymap_arg();
    let events = env.write("events.txt", "lower down\nraise down\nlower down\n");

    let output = env
        .command(&["config", "set", "--keymap", &keymap, "--mode", "exclusive"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let output = env
        .command(&[
            "simulate",
            "--events",
            events.to_str().unwrap(),
            "--no-persist",
            "--json",
        ])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["mode"], "exclusive");
    assert_eq!(result["steps"][2]["tri_state"], "lower");
}

#[test]
fn test_simulate_invalid_event_line() {
    let env = TestEnv::new();
    let keymap = env.keymap_arg();
    let events = env.write("events.txt", "down 0 0\njump 1 2\n");

    let output = env
        .command(&["simulate", "--keymap", &keymap, "--events", events.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Line 2"), "stderr: {stderr}");
}

#[test]
fn test_simulate_unknown_base_selector() {
    let env = TestEnv::new();
    let keymap = env.keymap_arg();
    let events = env.write("events.txt", "base COLEMAK\n");

    let output = env
        .command(&["simulate", "--keymap", &keymap, "--events", events.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_simulate_invalid_mode() {
    let env = TestEnv::new();
    let keymap = env.keymap_arg();
    let events = env.write("events.txt", "down 0 0\n");

    let output = env
        .command(&[
            "simulate",
            "--keymap",
            &keymap,
            "--events",
            events.to_str().unwrap(),
            "--mode",
            "both",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_simulate_missing_events_file() {
    let env = TestEnv::new();
    let keymap = env.keymap_arg();

    let output = env
        .command(&["simulate", "--keymap", &keymap, "--events", "/nonexistent/events.txt"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_simulate_missing_keymap() {
    let env = TestEnv::new();
    let events = env.write("events.txt", "down 0 0\n");

    let output = env
        .command(&[
            "simulate",
            "--keymap",
            "/nonexistent/keymap.md",
            "--events",
            events.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_simulate_without_any_keymap() {
    let env = TestEnv::new();
    let events = env.write("events.txt", "down 0 0\n");

    let output = env
        .command(&["simulate", "--events", events.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--keymap"), "stderr: {stderr}");
}

#[test]
fn test_simulate_demo_script() {
    let env = TestEnv::new();
    let demos = concat!(env!("CARGO_MANIFEST_DIR"), "/demos");
    let keymap = format!("{demos}/adoah.md");
    let events = format!("{demos}/adjust.events");

    let output = env
        .command(&[
            "simulate", "--keymap", &keymap, "--events", &events, "--no-persist", "--json",
        ])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let hids: Vec<&str> = result["steps"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|step| step["hid"].as_str())
        .collect();

    // Lower still held after RAISE is released, then the Dvorak base layer
    assert_eq!(hids, vec!["KC_EXLM", "KC_EXLM", "KC_SCLN", "KC_SCLN"]);
    assert_eq!(result["final_base_layer"], 0);
}
