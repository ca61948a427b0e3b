use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One unit of work entering the pipeline. Immutable after construction;
/// only the resulting `ExecutionResult` is retained in history.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub raw: String,                    // Original text typed by the caller
    pub working_dir: Option<PathBuf>,   // Override, defaults to process cwd
    pub timeout_secs: Option<u64>,      // Override, defaults to configured value
}

impl CommandRequest {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            working_dir: None,
            timeout_secs: None,
        }
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecutionResult {
    pub command: String,            // Command as the caller issued it
    pub translated_command: String, // What the host interpreter actually ran
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
    pub duration_ms: u64, // Wall clock of the external process call only
    pub timestamp: DateTime<Utc>,
}
