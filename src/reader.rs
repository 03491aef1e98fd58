//! Incremental JSONL tailing.
//!
//! Each call reads only the bytes appended since the stored offset. Lines
//! are complete once their `\n` has been written; whatever follows the last
//! newline is carried in `SessionState::buffer` until the next read.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

use crate::state::SessionState;

/// Length of the prefix of `bytes` that doesn't end inside a multi-byte
/// UTF-8 sequence. The held-back bytes are picked up by the next read.
fn complete_utf8_prefix(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue; // continuation byte, keep looking for the lead
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { len - back } else { len };
    }
    len
}

/// Read the records appended to `path` since `state.offset`, advancing the
/// offset and partial-line buffer in place.
///
/// A missing transcript yields nothing and leaves `state` untouched, as
/// does any I/O error (the caller logs it and retries next invocation).
/// Lines that aren't JSON objects are skipped.
pub fn read_new_records(path: &Path, state: &mut SessionState) -> Result<Vec<Value>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("opening transcript {}", path.display())),
    };

    let len = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    if len < state.offset {
        debug!(
            "transcript {} is shorter than stored offset ({len} < {}); waiting for it to grow",
            path.display(),
            state.offset
        );
        return Ok(Vec::new());
    }

    file.seek(SeekFrom::Start(state.offset))
        .with_context(|| format!("seeking {}", path.display()))?;
    let mut chunk = Vec::new();
    file.read_to_end(&mut chunk)
        .with_context(|| format!("reading {}", path.display()))?;

    let consumed = complete_utf8_prefix(&chunk);
    if consumed == 0 {
        return Ok(Vec::new());
    }

    let mut combined = std::mem::take(&mut state.buffer);
    combined.push_str(&String::from_utf8_lossy(&chunk[..consumed]));
    state.offset += consumed as u64;

    let (complete, partial) = match combined.rsplit_once('\n') {
        Some((complete, partial)) => (complete, partial),
        None => ("", combined.as_str()),
    };

    let mut records = Vec::new();
    for line in complete.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) if value.is_object() => records.push(value),
            Ok(_) => trace!("skipping non-object transcript line"),
            Err(e) => trace!("skipping unparseable transcript line: {e}"),
        }
    }
    state.buffer = partial.to_string();

    Ok(records)
}
