use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

// ===================================================================
// Hook events
// ===================================================================

/// The events this hook acts on. Anything else Claude Code sends
/// (SessionStart, SubagentStop, ...) is handled like `Stop`: a prompt to
/// catch up on the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Stop,
    Notification,
    PreToolUse,
    PostToolUse,
}

impl HookEvent {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Stop" => Some(Self::Stop),
            "Notification" => Some(Self::Notification),
            "PreToolUse" => Some(Self::PreToolUse),
            "PostToolUse" => Some(Self::PostToolUse),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "Stop",
            Self::Notification => "Notification",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===================================================================
// Hook payload (stdin)
// ===================================================================

/// Everything we read from the hook's stdin.
///
/// Claude Code has shipped both camelCase and snake_case field names, and
/// some fields nested under `session` / `transcript` objects, so this is
/// extracted by hand rather than derived: a field with an unexpected shape
/// reads as absent instead of rejecting the whole payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookPayload {
    pub declared_event: Option<String>,
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
    pub cwd: Option<String>,
    pub permission_mode: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_output: Option<Value>,
    pub notification_type: Option<String>,
    pub message: Option<String>,
    pub details: Option<Value>,
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

impl HookPayload {
    /// Decode raw stdin. Empty or non-JSON input yields an empty payload.
    pub fn parse(input: &str) -> Self {
        match serde_json::from_str::<Value>(input) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::default(),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let first = |candidates: [Option<&Value>; 3]| candidates.into_iter().find_map(non_empty_str);

        Self {
            declared_event: non_empty_str(value.get("hook_event_name"))
                .or_else(|| non_empty_str(value.get("event"))),
            session_id: first([
                value.get("sessionId"),
                value.get("session_id"),
                value.get("session").and_then(|s| s.get("id")),
            ]),
            transcript_path: first([
                value.get("transcriptPath"),
                value.get("transcript_path"),
                value.get("transcript").and_then(|t| t.get("path")),
            ]),
            cwd: non_empty_str(value.get("cwd")),
            permission_mode: non_empty_str(value.get("permission_mode")),
            tool_name: non_empty_str(value.get("tool_name")),
            tool_input: present(value.get("tool_input")),
            tool_output: present(value.get("tool_output"))
                .or_else(|| present(value.get("tool_response"))),
            notification_type: non_empty_str(value.get("notification_type")),
            message: non_empty_str(value.get("message")),
            details: present(value.get("details")),
        }
    }

    /// Which event this invocation is for. A recognized declared name
    /// wins; otherwise the payload's shape decides.
    pub fn event(&self) -> HookEvent {
        if let Some(event) = self.declared_event.as_deref().and_then(HookEvent::from_name) {
            return event;
        }
        if self.tool_name.is_some() {
            return if self.tool_output.is_some() {
                HookEvent::PostToolUse
            } else {
                HookEvent::PreToolUse
            };
        }
        if self.notification_type.is_some() || self.details.is_some() {
            return HookEvent::Notification;
        }
        HookEvent::Stop
    }
}

// ===================================================================
// Transcript path resolution
// ===================================================================

/// Expand a leading `~`, then canonicalize. A path that can't be
/// canonicalized (usually because it doesn't exist yet) is made absolute
/// so the state key stays stable once the file appears.
pub fn resolve_transcript_path(raw: &str, home: Option<&Path>) -> PathBuf {
    let expanded = match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(raw),
    };
    expanded
        .canonicalize()
        .or_else(|_| std::path::absolute(&expanded))
        .unwrap_or(expanded)
}
