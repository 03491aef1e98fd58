use serde::Serialize;
use serde_json::{Map, Value};

use crate::transcript::{Block, Content};
use crate::truncate::{TruncationMeta, truncate_text};
use crate::turns::Turn;

/// A tool invocation and, once correlated, what it returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
    pub output: Option<String>,
    pub output_meta: Option<TruncationMeta>,
}

/// One element of a turn's ordered assistant output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Thinking { text: String },
    ToolUse(ToolUse),
}

/// Per-kind block tallies for a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockCounts {
    pub content_blocks: usize,
    pub text_blocks: usize,
    pub thinking_blocks: usize,
    pub tool_blocks: usize,
}

impl BlockCounts {
    pub fn of(blocks: &[ContentBlock]) -> Self {
        let mut counts = Self {
            content_blocks: blocks.len(),
            ..Self::default()
        };
        for block in blocks {
            match block {
                ContentBlock::Text { .. } => counts.text_blocks += 1,
                ContentBlock::Thinking { .. } => counts.thinking_blocks += 1,
                ContentBlock::ToolUse(_) => counts.tool_blocks += 1,
            }
        }
        counts
    }
}

/// Tool input as it should be reported: structured values and scalars
/// pass through, null or missing becomes an empty object.
fn normalize_input(input: &Value) -> Value {
    match input {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    }
}

/// Render a tool result payload as text. Strings are kept as-is; anything
/// structured is serialized compactly.
fn render_output(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn text_block(text: &str) -> Option<ContentBlock> {
    (!text.trim().is_empty()).then(|| ContentBlock::Text {
        text: text.to_string(),
    })
}

/// Walk the turn's assistant messages in order and emit their visible
/// content, attaching each tool call's result from the same turn.
pub fn build_sequence(turn: &Turn, max_chars: usize) -> Vec<ContentBlock> {
    let mut out = Vec::new();
    for assistant in &turn.assistants {
        match &assistant.content {
            Content::Text(s) => out.extend(text_block(s)),
            Content::Blocks(blocks) => {
                for block in blocks {
                    match block {
                        Block::Text(t) | Block::Bare(t) => out.extend(text_block(t)),
                        Block::Thinking(t) if !t.trim().is_empty() => {
                            out.push(ContentBlock::Thinking { text: t.clone() })
                        }
                        Block::ToolUse { id, name, input } => {
                            out.push(ContentBlock::ToolUse(correlate(turn, id, name, input, max_chars)))
                        }
                        _ => {}
                    }
                }
            }
            Content::Other => {}
        }
    }
    out
}

fn correlate(
    turn: &Turn,
    id: &str,
    name: &Option<String>,
    input: &Value,
    max_chars: usize,
) -> ToolUse {
    let result = (!id.is_empty())
        .then(|| turn.tool_results.get(id))
        .flatten()
        .map(|payload| truncate_text(&render_output(payload), max_chars));
    let (output, output_meta) = match result {
        Some((text, meta)) => (Some(text), Some(meta)),
        None => (None, None),
    };
    ToolUse {
        id: id.to_string(),
        name: name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("unknown")
            .to_string(),
        input: normalize_input(input),
        output,
        output_meta,
    }
}
