#![allow(dead_code)]

use serde_json::{Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Run the binary with `args`, feeding `stdin`. Returns (exit code, stdout,
/// stderr). Inherited `CCTRACE_*` and `RUST_LOG` variables are cleared so
/// the caller's environment can't leak into assertions.
pub fn run_cli(args: &[&str], stdin: &str, env: &[(&str, &str)]) -> (i32, String, String) {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cctrace"));
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for key in [
        "CCTRACE_ENABLED",
        "CCTRACE_DEBUG",
        "CCTRACE_MAX_CHARS",
        "CCTRACE_USER_ID",
        "CCTRACE_HOSTNAME",
        "CCTRACE_STATE_DIR",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    let mut child = cmd.spawn().expect("failed to spawn binary");

    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// A temp state dir plus a transcript file inside it.
/// The `TempDir` must be kept alive for the duration of the test.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub transcript: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("transcript.jsonl");
        Self { dir, transcript }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn export_file(&self) -> PathBuf {
        self.state_dir().join("cctrace_turns.jsonl")
    }

    pub fn append(&self, lines: &[Value]) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.transcript)
            .unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
    }

    pub fn append_raw(&self, text: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.transcript)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    /// A hook payload for this harness's session and transcript, with
    /// `extra` fields merged over the defaults.
    pub fn payload(&self, extra: Value) -> String {
        let mut value = json!({
            "session_id": "test-session",
            "transcript_path": self.transcript.to_str().unwrap(),
            "cwd": "/home/user/project",
            "permission_mode": "default",
            "hook_event_name": "Stop"
        });
        value
            .as_object_mut()
            .unwrap()
            .extend(extra.as_object().unwrap().clone());
        value.to_string()
    }

    /// Run the hook against this harness's state dir.
    pub fn run(&self, payload: &str) -> (i32, String, String) {
        self.run_with(&[], payload, &[])
    }

    pub fn run_with(&self, args: &[&str], payload: &str, env: &[(&str, &str)]) -> (i32, String, String) {
        let state_dir = self.state_dir();
        let mut full = vec!["--state-dir", state_dir.to_str().unwrap()];
        full.extend_from_slice(args);
        run_cli(&full, payload, env)
    }

    /// Run a Stop invocation and assert it was silent and successful.
    pub fn stop(&self) {
        let (code, stdout, stderr) = self.run(&self.payload(json!({})));
        assert_eq!(code, 0);
        assert!(stdout.is_empty(), "expected no stdout, got: {stdout}");
        assert!(stderr.is_empty(), "expected no stderr, got: {stderr}");
    }

    /// Every record exported so far.
    pub fn exported(&self) -> Vec<Value> {
        read_jsonl(&self.export_file())
    }

    pub fn state(&self) -> Value {
        let path = self.state_dir().join("cctrace_state.json");
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }
}

pub fn read_jsonl(path: &Path) -> Vec<Value> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn user(text: &str) -> Value {
    json!({ "type": "user", "message": { "role": "user", "content": text } })
}

pub fn assistant(id: &str, content: Value) -> Value {
    json!({ "type": "assistant", "message": { "id": id, "role": "assistant", "content": content } })
}

pub fn tool_use(id: &str, tool_id: &str, name: &str) -> Value {
    assistant(
        id,
        json!([{ "type": "tool_use", "id": tool_id, "name": name, "input": { "command": "ls" } }]),
    )
}

pub fn tool_result(tool_id: &str, content: Value) -> Value {
    json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": [{ "type": "tool_result", "tool_use_id": tool_id, "content": content }]
        }
    })
}
