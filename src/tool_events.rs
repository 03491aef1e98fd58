//! Pre/PostToolUse events captured by the hook itself.
//!
//! These arrive out of band (one hook invocation per event) and are parked
//! in a JSON-lines buffer until the next transcript-driven invocation
//! assigns them to turns.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::trace;

use crate::turns::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolEventKind {
    PreToolUse,
    PostToolUse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedToolEvent {
    pub event: ToolEventKind,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub tool_output: Value,
}

pub struct ToolEventBuffer {
    path: PathBuf,
}

impl ToolEventBuffer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, event: &BufferedToolEvent) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut line = serde_json::to_string(event).context("serializing tool event")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to {}", self.path.display()))
    }

    fn read_lines(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    /// Events for `session_id` in file order. Does not modify the buffer.
    pub fn read_session(&self, session_id: &str) -> Result<Vec<BufferedToolEvent>> {
        let Some(contents) = self.read_lines()? else {
            return Ok(Vec::new());
        };
        Ok(contents
            .lines()
            .filter_map(parse_line)
            .filter(|e| e.session_id == session_id)
            .collect())
    }

    /// Drop the first `count` events belonging to `session_id`. Every other
    /// line, including ones that don't parse, is written back untouched.
    pub fn consume_session(&self, session_id: &str, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let Some(contents) = self.read_lines()? else {
            return Ok(());
        };

        let mut dropped = 0;
        let mut kept = String::with_capacity(contents.len());
        for line in contents.lines() {
            let ours = dropped < count
                && parse_line(line).is_some_and(|e| e.session_id == session_id);
            if ours {
                dropped += 1;
                continue;
            }
            if !line.trim().is_empty() {
                kept.push_str(line);
                kept.push('\n');
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, kept).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} over {}", tmp.display(), self.path.display()))
    }
}

fn parse_line(line: &str) -> Option<BufferedToolEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!("skipping malformed tool event line: {e}");
            None
        }
    }
}

/// Split buffered events across turns, assuming each `tool_use` produced
/// one Pre and one Post event in order. Whatever doesn't fit lands on the
/// last turn. Returns one bucket per turn.
pub fn partition_by_turn(
    turns: &[Turn],
    events: Vec<BufferedToolEvent>,
) -> Vec<Vec<BufferedToolEvent>> {
    if turns.is_empty() {
        return Vec::new();
    }
    let mut events = events.into_iter();
    let mut buckets: Vec<Vec<BufferedToolEvent>> = turns
        .iter()
        .map(|turn| events.by_ref().take(turn.tool_use_count() * 2).collect())
        .collect();
    if let Some(last) = buckets.last_mut() {
        last.extend(events);
    }
    buckets
}
