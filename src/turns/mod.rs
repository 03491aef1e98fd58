use crate::transcript::{Record, Role};
use serde_json::Value;
use std::collections::HashMap;

// ===================================================================
// Turn: one user message and everything that answered it
// ===================================================================

/// A sealed turn. Nothing mutates it once the segmenter hands it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub user: Record,
    /// Latest revision per message id, in first-seen order.
    pub assistants: Vec<Record>,
    /// `tool_use_id` → result payload, scoped to this turn.
    pub tool_results: HashMap<String, Value>,
    /// System lines seen after the previous turn and before `user`.
    pub system: Vec<Record>,
}

impl Turn {
    /// A user message that never got an answer (e.g. interrupted).
    pub fn is_incomplete(&self) -> bool {
        self.assistants.is_empty()
    }

    /// `tool_use` blocks across the raw assistant content.
    pub fn tool_use_count(&self) -> usize {
        self.assistants.iter().map(Record::tool_use_count).sum()
    }
}

/// The turn currently accumulating records.
struct TurnInProgress {
    user: Record,
    order: Vec<String>,
    latest: HashMap<String, Record>,
    tool_results: HashMap<String, Value>,
    system: Vec<Record>,
}

impl TurnInProgress {
    fn open(user: Record, system: Vec<Record>) -> Self {
        Self {
            user,
            order: Vec::new(),
            latest: HashMap::new(),
            tool_results: HashMap::new(),
            system,
        }
    }

    /// Keep the newest revision of each message while preserving the
    /// position its first revision arrived at.
    fn add_assistant(&mut self, record: Record) {
        let key = record
            .message_id
            .clone()
            .unwrap_or_else(|| format!("noid:{}", self.order.len()));
        if !self.latest.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.latest.insert(key, record);
    }

    fn seal(mut self) -> Turn {
        let assistants = self
            .order
            .iter()
            .filter_map(|key| self.latest.remove(key))
            .collect();
        Turn {
            user: self.user,
            assistants,
            tool_results: self.tool_results,
            system: self.system,
        }
    }
}

// ===================================================================
// Segmenter: record stream → sealed turns
// ===================================================================

enum State {
    Idle,
    Active(TurnInProgress),
}

/// Groups classified records into turns.
///
/// System lines are held until the next user message opens a turn. Tool
/// results and assistant lines only count while a turn is active; before
/// the first user message they are dropped.
pub struct Segmenter {
    state: State,
    pending_system: Vec<Record>,
    sealed: Vec<Turn>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            pending_system: Vec::new(),
            sealed: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        if record.role == Some(Role::System) {
            self.pending_system.push(record);
            return;
        }

        if record.is_tool_result() {
            if let State::Active(turn) = &mut self.state {
                for (id, payload) in record.tool_results() {
                    turn.tool_results.insert(id.to_string(), payload.clone());
                }
            }
            return;
        }

        match record.role {
            Some(Role::User) => {
                self.flush();
                let system = std::mem::take(&mut self.pending_system);
                self.state = State::Active(TurnInProgress::open(record, system));
            }
            Some(Role::Assistant) => {
                if let State::Active(turn) = &mut self.state {
                    turn.add_assistant(record);
                }
            }
            _ => {}
        }
    }

    /// Seal the active turn, if any, even when nothing answered it yet.
    pub fn flush(&mut self) {
        if let State::Active(turn) = std::mem::replace(&mut self.state, State::Idle) {
            self.sealed.push(turn.seal());
        }
    }

    /// Flush and return every turn sealed by this segmenter.
    pub fn finish(mut self) -> Vec<Turn> {
        self.flush();
        self.sealed
    }
}

/// Classify and segment a batch of raw transcript lines.
pub fn build_turns<'a>(lines: impl IntoIterator<Item = &'a Value>) -> Vec<Turn> {
    let mut segmenter = Segmenter::new();
    for line in lines {
        segmenter.push(Record::classify(line));
    }
    segmenter.finish()
}
