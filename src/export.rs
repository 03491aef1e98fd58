use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::record::{NotificationRecord, TurnRecord};

/// Destination for finished records. Called after state has been
/// persisted, so a failing exporter loses records but never replays them.
pub trait Exporter {
    fn export_turn(&mut self, record: &TurnRecord) -> Result<()>;
    fn export_notification(&mut self, record: &NotificationRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

fn to_line<T: Serialize>(record: &T) -> Result<String> {
    let mut line = serde_json::to_string(record).context("serializing record")?;
    line.push('\n');
    Ok(line)
}

// -------------------------------------------------------------------
// JSON lines file
// -------------------------------------------------------------------

/// Appends one JSON object per line. The file is opened per write so a
/// missing or unwritable destination only fails that record.
pub struct JsonlExporter {
    path: PathBuf,
}

impl JsonlExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, line: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

impl Exporter for JsonlExporter {
    fn export_turn(&mut self, record: &TurnRecord) -> Result<()> {
        self.append(&to_line(record)?)
    }

    fn export_notification(&mut self, record: &NotificationRecord) -> Result<()> {
        self.append(&to_line(record)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// -------------------------------------------------------------------
// stdout
// -------------------------------------------------------------------

pub struct StdoutExporter<W: Write = io::Stdout> {
    out: W,
}

impl StdoutExporter {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

#[cfg(test)]
impl<W: Write> StdoutExporter<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Exporter for StdoutExporter<W> {
    fn export_turn(&mut self, record: &TurnRecord) -> Result<()> {
        self.out
            .write_all(to_line(record)?.as_bytes())
            .context("writing turn record")
    }

    fn export_notification(&mut self, record: &NotificationRecord) -> Result<()> {
        self.out
            .write_all(to_line(record)?.as_bytes())
            .context("writing notification record")
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("flushing output")
    }
}

// -------------------------------------------------------------------
// In-memory (tests)
// -------------------------------------------------------------------

#[cfg(test)]
#[derive(Default)]
pub struct MemoryExporter {
    pub turns: Vec<TurnRecord>,
    pub notifications: Vec<NotificationRecord>,
    pub flushed: bool,
    pub fail: bool,
}

#[cfg(test)]
impl Exporter for MemoryExporter {
    fn export_turn(&mut self, record: &TurnRecord) -> Result<()> {
        if self.fail {
            anyhow::bail!("exporter unavailable");
        }
        self.turns.push(record.clone());
        Ok(())
    }

    fn export_notification(&mut self, record: &NotificationRecord) -> Result<()> {
        if self.fail {
            anyhow::bail!("exporter unavailable");
        }
        self.notifications.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushed = true;
        Ok(())
    }
}
