use crate::usage::Usage;
use serde_json::Value;

// ===================================================================
// Role: which side of the conversation a transcript line belongs to
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    fn parse(value: Option<&Value>) -> Option<Self> {
        match value?.as_str()? {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

// ===================================================================
// Content: `message.content` (or top-level `content`) of a line
// ===================================================================

/// Content can be a plain string (user prompts), an array of typed blocks
/// (assistant responses, tool results), or anything else we don't model.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Blocks(Vec<Block>),
    Other,
}

/// One element of a content array.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(String),
    Thinking(String),
    ToolUse {
        id: String,
        name: Option<String>,
        input: Value,
    },
    ToolResult {
        tool_use_id: Option<String>,
        content: Value,
    },
    /// A bare string element inside the array.
    Bare(String),
    /// Object blocks of a type we don't model (images, documents, ...)
    /// and any non-object, non-string element.
    Other,
}

/// Read a string field, treating a missing or non-string value as empty.
fn str_field(block: &Value, field: &str) -> String {
    block[field].as_str().unwrap_or_default().to_string()
}

/// Stringify an id that may have been written as a number.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Block {
    fn from_value(value: &Value) -> Self {
        if let Some(s) = value.as_str() {
            return Self::Bare(s.to_string());
        }
        if !value.is_object() {
            return Self::Other;
        }
        match value["type"].as_str() {
            Some("text") => Self::Text(str_field(value, "text")),
            Some("thinking") => Self::Thinking(str_field(value, "thinking")),
            Some("tool_use") => Self::ToolUse {
                id: id_string(&value["id"]).unwrap_or_default(),
                name: value["name"].as_str().map(String::from),
                input: value["input"].clone(),
            },
            Some("tool_result") => Self::ToolResult {
                tool_use_id: id_string(&value["tool_use_id"]).filter(|id| !id.is_empty()),
                content: value["content"].clone(),
            },
            _ => Self::Other,
        }
    }
}

impl Content {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(Value::Array(items)) => Self::Blocks(items.iter().map(Block::from_value).collect()),
            _ => Self::Other,
        }
    }

    /// Flatten to plain text: strings verbatim, arrays join the `text`
    /// blocks and bare strings with newlines, skipping empty pieces.
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        Block::Text(t) | Block::Bare(t) => Some(t.as_str()),
                        _ => None,
                    })
                    .filter(|t| !t.is_empty())
                    .collect();
                parts.join("\n")
            }
            Self::Other => String::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            Self::Blocks(b) => b,
            _ => &[],
        }
    }
}

// ===================================================================
// Record: one classified transcript line
// ===================================================================

/// A single JSONL transcript line, reduced to the fields turn
/// reconstruction needs. Claude Code wraps most of them in a `message`
/// envelope; older or foreign writers put them at the top level.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub role: Option<Role>,
    pub content: Content,
    pub message_id: Option<String>,
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

impl Record {
    pub fn classify(value: &Value) -> Self {
        let envelope = value.get("message").filter(|m| m.is_object());

        let role = Role::parse(value.get("type"))
            .or_else(|| envelope.and_then(|m| Role::parse(m.get("role"))));

        let content = match envelope {
            Some(m) => Content::from_value(m.get("content")),
            None => Content::from_value(value.get("content")),
        };

        let field = |name: &str| {
            envelope
                .and_then(|m| m.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Self {
            role,
            content,
            message_id: field("id"),
            model: field("model"),
            usage: envelope.and_then(|m| m.get("usage")).and_then(Usage::from_value),
            stop_reason: field("stop_reason"),
        }
    }

    /// True for user-role lines whose content carries at least one
    /// `tool_result` block.
    pub fn is_tool_result(&self) -> bool {
        self.role == Some(Role::User)
            && self
                .content
                .blocks()
                .iter()
                .any(|b| matches!(b, Block::ToolResult { .. }))
    }

    /// `(tool_use_id, payload)` pairs for every tool result with an id.
    pub fn tool_results(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.content.blocks().iter().filter_map(|b| match b {
            Block::ToolResult {
                tool_use_id: Some(id),
                content,
            } => Some((id.as_str(), content)),
            _ => None,
        })
    }

    /// Number of `tool_use` blocks in this line's content.
    pub fn tool_use_count(&self) -> usize {
        self.content
            .blocks()
            .iter()
            .filter(|b| matches!(b, Block::ToolUse { .. }))
            .count()
    }

    pub fn text(&self) -> String {
        self.content.text()
    }
}
