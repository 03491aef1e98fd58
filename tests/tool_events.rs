mod common;

use common::{Harness, assistant, read_jsonl, tool_result, tool_use, user};
use serde_json::json;

fn pre(h: &Harness, name: &str) -> String {
    h.payload(json!({
        "hook_event_name": "PreToolUse",
        "tool_name": name,
        "tool_input": { "command": "ls" }
    }))
}

fn post(h: &Harness, name: &str, response: serde_json::Value) -> String {
    h.payload(json!({
        "hook_event_name": "PostToolUse",
        "tool_name": name,
        "tool_input": { "command": "ls" },
        "tool_response": response
    }))
}

#[test]
fn tool_events_are_buffered_silently() {
    let h = Harness::new();
    let (code, stdout, stderr) = h.run(&pre(&h, "Bash"));
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());

    let buffered = read_jsonl(&h.state_dir().join("cctrace_tool_buffer.jsonl"));
    assert_eq!(buffered.len(), 1);
    assert_eq!(buffered[0]["event"], "PreToolUse");
    assert_eq!(buffered[0]["session_id"], "test-session");
    assert_eq!(buffered[0]["tool_name"], "Bash");
    assert!(h.exported().is_empty());
}

#[test]
fn buffered_events_attach_to_the_turn_that_used_the_tools() {
    let h = Harness::new();
    h.run(&pre(&h, "Bash"));
    h.run(&post(&h, "Bash", json!({ "stdout": "a.txt" })));
    h.run(&pre(&h, "Read"));
    h.run(&post(&h, "Read", json!("contents")));

    h.append(&[
        user("first"),
        tool_use("m1", "t1", "Bash"),
        tool_result("t1", json!("a.txt")),
        assistant("m2", json!("no tools here")),
        user("second"),
        tool_use("m3", "t2", "Read"),
        tool_result("t2", json!("contents")),
        assistant("m4", json!("read it")),
    ]);
    h.stop();

    let records = h.exported();
    assert_eq!(records.len(), 2);

    let first = records[0]["hook_tool_events"].as_array().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0]["event"], "PreToolUse");
    assert_eq!(first[0]["tool_name"], "Bash");
    assert_eq!(first[0]["input"], r#"{"command":"ls"}"#);
    assert_eq!(first[1]["output"], r#"{"stdout":"a.txt"}"#);

    let second = records[1]["hook_tool_events"].as_array().unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second[1]["tool_name"], "Read");
    assert_eq!(second[1]["output"], "contents");

    let remaining = read_jsonl(&h.state_dir().join("cctrace_tool_buffer.jsonl"));
    assert!(remaining.is_empty());
}

#[test]
fn events_from_other_sessions_are_left_alone() {
    let h = Harness::new();
    h.run(&pre(&h, "Bash"));
    let other = h.payload(json!({
        "session_id": "other-session",
        "hook_event_name": "PreToolUse",
        "tool_name": "Grep"
    }));
    h.run(&other);

    h.append(&[user("go"), tool_use("m1", "t1", "Bash"), assistant("m2", json!("done"))]);
    h.stop();

    let events = h.exported()[0]["hook_tool_events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["tool_name"], "Bash");

    let remaining = read_jsonl(&h.state_dir().join("cctrace_tool_buffer.jsonl"));
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["session_id"], "other-session");
}

#[test]
fn event_kind_is_inferred_without_a_declared_name() {
    let h = Harness::new();
    let payload = json!({
        "session_id": "test-session",
        "tool_name": "Bash",
        "tool_input": {},
        "tool_output": "done"
    });
    h.run(&payload.to_string());

    let buffered = read_jsonl(&h.state_dir().join("cctrace_tool_buffer.jsonl"));
    assert_eq!(buffered[0]["event"], "PostToolUse");
    assert_eq!(buffered[0]["tool_output"], "done");
}
