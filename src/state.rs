use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::truncate::sha256_hex;

/// Resumption checkpoint for one (session, transcript) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Bytes of the transcript already consumed. Never decreases.
    #[serde(default)]
    pub offset: u64,
    /// Trailing partial line carried over to the next read.
    #[serde(default)]
    pub buffer: String,
    /// Turns emitted so far; the next turn is `turn_count + 1`.
    #[serde(default)]
    pub turn_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// Stable key for a session's checkpoint.
pub fn state_key(session_id: &str, transcript_path: &Path) -> String {
    sha256_hex(&format!("{}::{}", session_id, transcript_path.display()))
}

/// The whole persisted state document: key → checkpoint.
///
/// Entries are kept as raw JSON so one malformed entry can't take the
/// others down with it; they're decoded on access.
pub struct StateStore {
    path: PathBuf,
    sessions: BTreeMap<String, Value>,
}

impl StateStore {
    /// Load the document at `path`. A missing or unreadable document loads
    /// as empty rather than failing the invocation.
    pub fn load(path: &Path) -> Self {
        let sessions = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                debug!("ignoring corrupt state file {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                debug!("reading state file {} failed: {e}", path.display());
                BTreeMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            sessions,
        }
    }

    /// The checkpoint for `key`, or a fresh one.
    pub fn session(&self, key: &str) -> SessionState {
        self.sessions
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Record a checkpoint, stamping it with the current time.
    pub fn update(&mut self, key: &str, mut state: SessionState) -> Result<()> {
        state.updated = Some(Utc::now());
        let value = serde_json::to_value(&state).context("serializing session state")?;
        self.sessions.insert(key.to_string(), value);
        Ok(())
    }

    /// Rewrite the whole document: write a sibling temp file, then rename it
    /// over the real one so readers never see a partial write.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(&self.sessions).context("serializing state")?;
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} over {}", tmp.display(), self.path.display()))
    }
}
