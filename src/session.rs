use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Config, StatePaths};
use crate::export::Exporter;
use crate::lock::StateLock;
use crate::reader::read_new_records;
use crate::record::{RecordContext, TurnRecord, build_notification, build_turn_record};
use crate::state::{StateStore, state_key};
use crate::tool_events::{BufferedToolEvent, ToolEventBuffer, ToolEventKind, partition_by_turn};
use crate::turns::build_turns;
use crate::types::{HookEvent, HookPayload, resolve_transcript_path};

/// What one invocation did, for the log line `main` writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Disabled,
    NoSession,
    Buffered(HookEvent),
    Exported {
        turns: usize,
        failed: usize,
        notification: bool,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::NoSession => f.write_str("no session id"),
            Self::Buffered(event) => write!(f, "buffered {event}"),
            Self::Exported {
                turns,
                failed,
                notification,
            } => {
                write!(f, "exported {} of {turns} turn(s)", turns - failed)?;
                if *notification {
                    f.write_str(" and a notification")?;
                }
                Ok(())
            }
        }
    }
}

pub struct Session {
    paths: StatePaths,
    config: Config,
    hostname: String,
    home: Option<PathBuf>,
}

impl Session {
    pub fn new(paths: StatePaths, config: Config, hostname: String, home: Option<PathBuf>) -> Self {
        Self {
            paths,
            config,
            hostname,
            home,
        }
    }

    pub fn handle(&self, payload: &HookPayload, exporter: &mut dyn Exporter) -> Result<Outcome> {
        if !self.config.enabled {
            debug!("disabled by config, ignoring invocation");
            return Ok(Outcome::Disabled);
        }
        let Some(session_id) = payload.session_id.as_deref() else {
            debug!("payload has no session id, nothing to do");
            return Ok(Outcome::NoSession);
        };

        let event = payload.event();
        match event {
            HookEvent::PreToolUse => {
                self.buffer_tool_event(session_id, ToolEventKind::PreToolUse, payload)?;
                Ok(Outcome::Buffered(event))
            }
            HookEvent::PostToolUse => {
                self.buffer_tool_event(session_id, ToolEventKind::PostToolUse, payload)?;
                Ok(Outcome::Buffered(event))
            }
            HookEvent::Stop | HookEvent::Notification => {
                self.export_transcript(session_id, event, payload, exporter)
            }
        }
    }

    // ---------------------------------------------------------------
    // Pre/PostToolUse
    // ---------------------------------------------------------------

    fn buffer_tool_event(
        &self,
        session_id: &str,
        kind: ToolEventKind,
        payload: &HookPayload,
    ) -> Result<()> {
        let event = BufferedToolEvent {
            event: kind,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            tool_name: payload.tool_name.clone(),
            tool_input: payload.tool_input.clone().unwrap_or(Value::Null),
            tool_output: match kind {
                ToolEventKind::PreToolUse => Value::Null,
                ToolEventKind::PostToolUse => payload.tool_output.clone().unwrap_or(Value::Null),
            },
        };
        let _lock = StateLock::acquire(&self.paths.lock_file(), self.config.lock_timeout());
        ToolEventBuffer::new(self.paths.tool_buffer()).append(&event)?;
        debug!(
            "buffered {:?} for {} in session {session_id}",
            kind,
            event.tool_name.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    // ---------------------------------------------------------------
    // Stop/Notification
    // ---------------------------------------------------------------

    fn export_transcript(
        &self,
        session_id: &str,
        event: HookEvent,
        payload: &HookPayload,
        exporter: &mut dyn Exporter,
    ) -> Result<Outcome> {
        let transcript = payload
            .transcript_path
            .as_deref()
            .map(|raw| resolve_transcript_path(raw, self.home.as_deref()));
        let display_path = transcript.clone().unwrap_or_default();

        let ctx = RecordContext {
            session_id,
            transcript_path: &display_path,
            cwd: payload.cwd.as_deref(),
            hostname: &self.hostname,
            user_id: &self.config.user_id,
            hook_event: event,
            permission_mode: payload.permission_mode.as_deref(),
            max_chars: self.config.max_chars,
        };

        let records = match &transcript {
            Some(path) => self.collect_turns(&ctx, path).unwrap_or_else(|e| {
                warn!("processing transcript {} failed: {e:#}", path.display());
                Vec::new()
            }),
            None => {
                debug!("payload has no transcript path");
                Vec::new()
            }
        };

        // State is already saved; from here on a failure loses records
        // rather than duplicating them.
        let mut failed = 0;
        for record in &records {
            if let Err(e) = exporter.export_turn(record) {
                failed += 1;
                warn!("exporting {} failed: {e:#}", record.header().name);
            }
        }

        let notification = event == HookEvent::Notification;
        if notification {
            if let Err(e) = exporter.export_notification(&build_notification(&ctx, payload)) {
                warn!("exporting notification failed: {e:#}");
            }
        }
        if let Err(e) = exporter.flush() {
            warn!("flushing exporter failed: {e:#}");
        }

        Ok(Outcome::Exported {
            turns: records.len(),
            failed,
            notification,
        })
    }

    /// The locked section: read what's new, turn it into records, and
    /// checkpoint before anything leaves the process.
    fn collect_turns(&self, ctx: &RecordContext, transcript: &Path) -> Result<Vec<TurnRecord>> {
        let lock = StateLock::acquire(&self.paths.lock_file(), self.config.lock_timeout());
        if !lock.is_held() {
            debug!("continuing without the state lock");
        }

        let mut store = StateStore::load(&self.paths.state_file());
        let key = state_key(ctx.session_id, transcript);
        let before = store.session(&key);
        let mut state = before.clone();

        let lines = match read_new_records(transcript, &mut state) {
            Ok(lines) => lines,
            Err(e) => {
                debug!("reading {} failed, will retry next time: {e:#}", transcript.display());
                return Ok(Vec::new());
            }
        };
        let turns = build_turns(&lines);
        debug!(
            "read {} new lines, {} turns from {}",
            lines.len(),
            turns.len(),
            transcript.display()
        );

        let buffer = ToolEventBuffer::new(self.paths.tool_buffer());
        let events = if turns.is_empty() {
            Vec::new()
        } else {
            buffer.read_session(ctx.session_id).unwrap_or_else(|e| {
                warn!("reading tool event buffer failed: {e:#}");
                Vec::new()
            })
        };

        // Incomplete turns carry no tool events, so whatever lands in their
        // bucket stays buffered for the turn that eventually uses it.
        let mut consumed = 0;
        let records: Vec<TurnRecord> = turns
            .iter()
            .zip(partition_by_turn(&turns, events))
            .zip(state.turn_count + 1..)
            .map(|((turn, bucket), number)| {
                if !turn.is_incomplete() {
                    consumed += bucket.len();
                }
                build_turn_record(ctx, turn, number, &bucket)
            })
            .collect();

        state.turn_count += turns.len() as u64;
        if state != before {
            store.update(&key, state)?;
            store.save()?;
        }

        if consumed > 0 {
            if let Err(e) = buffer.consume_session(ctx.session_id, consumed) {
                warn!("pruning tool event buffer failed: {e:#}");
            }
        }

        if !records.is_empty() {
            info!(
                "session {}: {} turn(s) up to #{}",
                ctx.session_id,
                records.len(),
                records.last().map_or(0, |r| r.header().turn_number)
            );
        }
        Ok(records)
    }
}
