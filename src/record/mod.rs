use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::sequence::{BlockCounts, ContentBlock, build_sequence};
use crate::tool_events::{BufferedToolEvent, ToolEventKind};
use crate::transcript::Record;
use crate::truncate::{TruncationMeta, truncate_text};
use crate::turns::Turn;
use crate::types::{HookEvent, HookPayload};
use crate::usage::{UsageSummary, aggregate};

const SOURCE_TAG: &str = "claude-code";
const DEFAULT_MODEL: &str = "claude";
const SYSTEM_SEPARATOR: &str = "\n---\n";

// ===================================================================
// Input: invocation-wide facts, gathered by Session before building
// ===================================================================

pub struct RecordContext<'a> {
    pub session_id: &'a str,
    pub transcript_path: &'a Path,
    pub cwd: Option<&'a str>,
    pub hostname: &'a str,
    pub user_id: &'a str,
    pub hook_event: HookEvent,
    pub permission_mode: Option<&'a str>,
    pub max_chars: usize,
}

// ===================================================================
// Output: one JSON object per sealed turn
// ===================================================================

/// Fields every turn record starts with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnHeader {
    pub name: String,
    pub session_id: String,
    pub turn_number: u64,
    pub transcript_path: String,
    pub cwd: Option<String>,
    pub hostname: String,
    pub user_id: String,
    pub hook_event: String,
    pub permission_mode: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnRecord {
    Complete(Box<CompleteTurn>),
    Incomplete(IncompleteTurn),
}

impl TurnRecord {
    pub fn header(&self) -> &TurnHeader {
        match self {
            Self::Complete(t) => &t.header,
            Self::Incomplete(t) => &t.header,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteTurn {
    #[serde(flatten)]
    pub header: TurnHeader,
    pub user_text: String,
    pub user_text_meta: TruncationMeta,
    pub assistant_text: String,
    pub assistant_text_meta: TruncationMeta,
    pub system_text: String,
    pub system_text_meta: TruncationMeta,
    pub model: String,
    pub stop_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSummary>,
    pub blocks: Vec<BlockRecord>,
    #[serde(flatten)]
    pub counts: BlockCounts,
    pub hook_tool_events: Vec<HookToolEventRecord>,
}

/// A user message nothing answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncompleteTurn {
    #[serde(flatten)]
    pub header: TurnHeader,
    pub user_text: String,
    pub user_text_meta: TruncationMeta,
    pub incomplete: bool,
}

/// A content block as exported. `index` counts per kind from 1, so the
/// second thinking block is `thinking` #2 regardless of what's between.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockRecord {
    Text {
        index: usize,
        text: String,
        text_meta: TruncationMeta,
    },
    Thinking {
        index: usize,
        text: String,
        text_meta: TruncationMeta,
    },
    ToolUse {
        index: usize,
        id: String,
        name: String,
        input: Value,
        input_meta: Option<TruncationMeta>,
        output: Option<String>,
        output_meta: Option<TruncationMeta>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookToolEventRecord {
    pub index: usize,
    pub event: ToolEventKind,
    pub tool_name: String,
    pub timestamp: String,
    pub input: String,
    pub input_meta: TruncationMeta,
    pub output: Option<String>,
    pub output_meta: TruncationMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub name: String,
    pub session_id: String,
    pub hostname: String,
    pub user_id: String,
    pub hook_event: String,
    pub tags: Vec<String>,
    pub notification_type: Option<String>,
    pub message: Option<String>,
    pub details: Option<Value>,
}

// ===================================================================
// Pure builders
// ===================================================================

fn header(ctx: &RecordContext, turn_number: u64, incomplete: bool) -> TurnHeader {
    let mut name = format!("Claude Code - Turn {turn_number}");
    let mut tags = vec![SOURCE_TAG.to_string()];
    if incomplete {
        name.push_str(" (incomplete)");
        tags.push("incomplete".into());
    }
    tags.push(ctx.hostname.to_string());
    TurnHeader {
        name,
        session_id: ctx.session_id.to_string(),
        turn_number,
        transcript_path: ctx.transcript_path.display().to_string(),
        cwd: ctx.cwd.map(String::from),
        hostname: ctx.hostname.to_string(),
        user_id: ctx.user_id.to_string(),
        hook_event: ctx.hook_event.to_string(),
        permission_mode: ctx.permission_mode.map(String::from),
        tags,
    }
}

/// Join the non-empty text of several records.
fn joined_text(records: &[Record], separator: &str) -> String {
    records
        .iter()
        .map(Record::text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Assemble the exported form of a sealed turn. `hook_events` is the
/// bucket of buffered tool events assigned to this turn.
pub fn build_turn_record(
    ctx: &RecordContext,
    turn: &Turn,
    turn_number: u64,
    hook_events: &[BufferedToolEvent],
) -> TurnRecord {
    let (user_text, user_text_meta) = truncate_text(&turn.user.text(), ctx.max_chars);

    if turn.is_incomplete() {
        return TurnRecord::Incomplete(IncompleteTurn {
            header: header(ctx, turn_number, true),
            user_text,
            user_text_meta,
            incomplete: true,
        });
    }

    let (assistant_text, assistant_text_meta) =
        truncate_text(&joined_text(&turn.assistants, "\n"), ctx.max_chars);
    let (system_text, system_text_meta) =
        truncate_text(&joined_text(&turn.system, SYSTEM_SEPARATOR), ctx.max_chars);

    let sequence = build_sequence(turn, ctx.max_chars);
    let counts = BlockCounts::of(&sequence);

    TurnRecord::Complete(Box::new(CompleteTurn {
        header: header(ctx, turn_number, false),
        user_text,
        user_text_meta,
        assistant_text,
        assistant_text_meta,
        system_text,
        system_text_meta,
        model: turn
            .assistants
            .first()
            .and_then(|r| r.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        stop_reason: turn.assistants.last().and_then(|r| r.stop_reason.clone()),
        usage: aggregate(&turn.assistants),
        blocks: block_records(sequence, ctx.max_chars),
        counts,
        hook_tool_events: hook_event_records(hook_events, ctx.max_chars),
    }))
}

fn block_records(sequence: Vec<ContentBlock>, max_chars: usize) -> Vec<BlockRecord> {
    let (mut texts, mut thoughts, mut tools) = (0, 0, 0);
    sequence
        .into_iter()
        .map(|block| match block {
            ContentBlock::Text { text } => {
                texts += 1;
                let (text, text_meta) = truncate_text(&text, max_chars);
                BlockRecord::Text {
                    index: texts,
                    text,
                    text_meta,
                }
            }
            ContentBlock::Thinking { text } => {
                thoughts += 1;
                let (text, text_meta) = truncate_text(&text, max_chars);
                BlockRecord::Thinking {
                    index: thoughts,
                    text,
                    text_meta,
                }
            }
            ContentBlock::ToolUse(tool) => {
                tools += 1;
                let (input, input_meta) = match tool.input {
                    Value::String(s) => {
                        let (kept, meta) = truncate_text(&s, max_chars);
                        (Value::String(kept), Some(meta))
                    }
                    other => (other, None),
                };
                BlockRecord::ToolUse {
                    index: tools,
                    id: tool.id,
                    name: tool.name,
                    input,
                    input_meta,
                    output: tool.output,
                    output_meta: tool.output_meta,
                }
            }
        })
        .collect()
}

/// Flatten a hook event payload to text: strings verbatim, null empty,
/// anything else compact JSON.
fn event_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn hook_event_records(events: &[BufferedToolEvent], max_chars: usize) -> Vec<HookToolEventRecord> {
    events
        .iter()
        .enumerate()
        .map(|(i, ev)| {
            let (input, input_meta) = truncate_text(&event_text(&ev.tool_input), max_chars);
            let (output, output_meta) = truncate_text(&event_text(&ev.tool_output), max_chars);
            HookToolEventRecord {
                index: i + 1,
                event: ev.event,
                tool_name: ev
                    .tool_name
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                timestamp: ev.timestamp.to_rfc3339(),
                input,
                input_meta,
                output: (!output.is_empty()).then_some(output),
                output_meta,
            }
        })
        .collect()
}

pub fn build_notification(ctx: &RecordContext, payload: &HookPayload) -> NotificationRecord {
    NotificationRecord {
        name: "Claude Code - Notification".into(),
        session_id: ctx.session_id.to_string(),
        hostname: ctx.hostname.to_string(),
        user_id: ctx.user_id.to_string(),
        hook_event: HookEvent::Notification.to_string(),
        tags: vec![
            SOURCE_TAG.to_string(),
            "notification".into(),
            ctx.hostname.to_string(),
        ],
        notification_type: payload.notification_type.clone(),
        message: payload.message.clone(),
        details: payload.details.clone(),
    }
}
