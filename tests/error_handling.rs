mod common;

use common::{Harness, assistant, run_cli, user};
use serde_json::json;
use std::fs;

#[test]
fn invalid_json_exits_cleanly() {
    let h = Harness::new();
    let (code, stdout, stderr) = h.run("not json");
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
    assert!(h.exported().is_empty());
}

#[test]
fn empty_stdin_exits_cleanly() {
    let h = Harness::new();
    let (code, stdout, stderr) = h.run("");
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}

#[test]
fn unknown_flags_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(
        &["--definitely-not-a-flag"],
        "{}",
        &[("CCTRACE_STATE_DIR", dir.path().to_str().unwrap())],
    );
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}

#[test]
fn other_hook_events_read_the_transcript() {
    let h = Harness::new();
    h.append(&[user("hi"), assistant("m1", json!("hello"))]);
    let (code, _, _) = h.run(&h.payload(json!({ "hook_event_name": "SubagentStop" })));
    assert_eq!(code, 0);
    assert_eq!(h.exported().len(), 1);
}

#[test]
fn missing_transcript_is_a_no_op() {
    let h = Harness::new();
    let (code, stdout, stderr) = h.run(&h.payload(json!({})));
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
    assert!(h.exported().is_empty());
}

#[test]
fn garbage_transcript_lines_are_skipped() {
    let h = Harness::new();
    h.append_raw("garbage\n[1,2,3]\n");
    h.append(&[user("real")]);
    h.append_raw("{\"truncated\": \n");
    h.stop();

    let records = h.exported();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["user_text"], "real");
}

#[test]
fn corrupt_state_file_starts_over() {
    let h = Harness::new();
    fs::create_dir_all(h.state_dir()).unwrap();
    fs::write(h.state_dir().join("cctrace_state.json"), "{ not json").unwrap();
    h.append(&[user("hi")]);
    h.stop();

    assert_eq!(h.exported().len(), 1);
    assert!(h.state().is_object());
}

#[test]
fn disabled_by_env() {
    let h = Harness::new();
    h.append(&[user("hi")]);
    let (code, _, _) = h.run_with(&[], &h.payload(json!({})), &[("CCTRACE_ENABLED", "false")]);
    assert_eq!(code, 0);
    assert!(h.exported().is_empty());
    assert!(!h.state_dir().join("cctrace_state.json").exists());
}

#[test]
fn disabled_by_config_file() {
    let h = Harness::new();
    fs::create_dir_all(h.state_dir()).unwrap();
    fs::write(h.state_dir().join("cctrace.toml"), "enabled = false\n").unwrap();
    h.append(&[user("hi")]);
    h.stop();
    assert!(h.exported().is_empty());
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let h = Harness::new();
    fs::create_dir_all(h.state_dir()).unwrap();
    fs::write(h.state_dir().join("cctrace.toml"), "enabled = [").unwrap();
    h.append(&[user("hi")]);
    h.stop();
    assert_eq!(h.exported().len(), 1);

    let log = fs::read_to_string(h.state_dir().join("cctrace.log")).unwrap();
    assert!(log.contains("ignoring config"));
}

#[test]
fn unwritable_export_destination_still_checkpoints() {
    let h = Harness::new();
    fs::create_dir_all(h.state_dir()).unwrap();
    // a directory where the export file should be
    fs::create_dir_all(h.export_file()).unwrap();
    h.append(&[user("hi")]);
    h.stop();

    let state = h.state();
    let entry = state.as_object().unwrap().values().next().unwrap();
    assert_eq!(entry["turn_count"], 1);
}
