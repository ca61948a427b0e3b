use crate::record::ExecutionResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// One persisted history line. Serialized as a single JSON object per line
/// so the log stays append-only and greppable.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub id: String, // Truncated SHA-256 of the command text
    pub command: String,
    pub success: bool,
    pub duration_ms: u64,
}

/// Append-only on-disk command log. Only executed commands land here;
/// blocked commands never produce an entry.
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn record(&self, result: &ExecutionResult) -> Result<()> {
        let entry = LogEntry {
            timestamp: result.timestamp,
            id: command_id(&result.command),
            command: result.command.clone(),
            success: result.success,
            duration_ms: result.duration_ms,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        let line = serde_json::to_string(&entry)?;
        writeln!(file, "{line}").context("failed to append history entry")?;
        Ok(())
    }

    /// The last `count` entries in file order (oldest of the window first).
    /// Unparseable lines are skipped rather than failing the whole read.
    pub fn tail(&self, count: usize) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let entries: Vec<LogEntry> = BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        let skip = entries.len().saturating_sub(count);
        Ok(entries.into_iter().skip(skip).collect())
    }
}

/// Stable short identifier for a command, used to spot re-runs of the same
/// command across sessions.
pub fn command_id(command: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(command.trim().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
