use crate::record::ExecutionResult;
use crate::translator::ShellKind;
use chrono::Utc;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sentinel exit code for a timed-out process, distinct from anything a
/// real child can return.
pub const TIMEOUT_EXIT_CODE: i32 = -124;

/// Exit code recorded when the process could not be spawned or was killed
/// by a signal without reporting a code.
pub const FAILURE_EXIT_CODE: i32 = -1;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Append-only, insertion-ordered log of every execution this session.
/// Append is the sole mutator; reads return snapshots, so concurrent
/// sessions sharing a supervisor cannot observe partial state.
#[derive(Default)]
pub struct ExecutionHistory {
    entries: Mutex<Vec<ExecutionResult>>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, result: ExecutionResult) {
        self.entries.lock().unwrap().push(result);
    }

    /// The most recent `count` entries, newest first.
    pub fn recent(&self, count: usize) -> Vec<ExecutionResult> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(count).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs one external process per call through the host interpreter and
/// records every outcome. Knows nothing about translation or risk; it runs
/// exactly the string it is given.
pub struct Supervisor {
    shell: ShellKind,
    default_timeout: Duration,
    history: ExecutionHistory,
}

impl Supervisor {
    pub fn new(shell: ShellKind, default_timeout: Duration) -> Self {
        Self {
            shell,
            default_timeout,
            history: ExecutionHistory::new(),
        }
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    /// Never returns an error for command-level failures; timeouts, spawn
    /// failures, and bad working directories all come back as a failed
    /// `ExecutionResult`, appended to history before returning.
    pub fn execute(
        &self,
        command: &str,
        translated: &str,
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> ExecutionResult {
        let start = Instant::now();
        let timestamp = Utc::now();
        let effective_timeout = timeout.unwrap_or(self.default_timeout);

        if let Some(dir) = working_dir {
            if !dir.is_dir() {
                // Fail fast without spawning anything
                let result = ExecutionResult {
                    command: command.to_string(),
                    translated_command: translated.to_string(),
                    stdout: String::new(),
                    stderr: format!("working directory does not exist: {}", dir.display()),
                    exit_code: FAILURE_EXIT_CODE,
                    success: false,
                    duration_ms: 0,
                    timestamp,
                };
                self.history.append(result.clone());
                return result;
            }
        }

        debug!(command, translated, timeout_secs = effective_timeout.as_secs(), "spawning");

        let (program, flag) = self.shell.interpreter();
        let mut builder = Command::new(program);
        builder
            .arg(flag)
            .arg(translated)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = working_dir {
            builder.current_dir(dir);
        }

        let mut child = match builder.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(command, error = %err, "failed to spawn interpreter");
                let result = ExecutionResult {
                    command: command.to_string(),
                    translated_command: translated.to_string(),
                    stdout: String::new(),
                    stderr: err.to_string(),
                    exit_code: FAILURE_EXIT_CODE,
                    success: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    timestamp,
                };
                self.history.append(result.clone());
                return result;
            }
        };

        let stdout_handle = child.stdout.take().map(drain);
        let stderr_handle = child.stderr.take().map(drain);

        let status = wait_with_deadline(&mut child, start + effective_timeout);

        let stdout_bytes = stdout_handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let stderr_bytes = stderr_handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&stdout_bytes).to_string();
        let mut stderr = String::from_utf8_lossy(&stderr_bytes).to_string();

        let (exit_code, success) = match status {
            WaitOutcome::Finished(status) => {
                (status.code().unwrap_or(FAILURE_EXIT_CODE), status.success())
            }
            WaitOutcome::TimedOut => {
                stderr = format!(
                    "command timed out after {}s\n{}",
                    effective_timeout.as_secs(),
                    stderr
                );
                (TIMEOUT_EXIT_CODE, false)
            }
            WaitOutcome::WaitFailed(err) => {
                stderr = format!("failed to wait for process: {err}\n{stderr}");
                (FAILURE_EXIT_CODE, false)
            }
        };

        debug!(command, exit_code, duration_ms, "finished");

        let result = ExecutionResult {
            command: command.to_string(),
            translated_command: translated.to_string(),
            stdout,
            stderr,
            exit_code,
            success,
            duration_ms,
            timestamp,
        };
        self.history.append(result.clone());
        result
    }
}

enum WaitOutcome {
    Finished(ExitStatus),
    TimedOut,
    WaitFailed(std::io::Error),
}

fn wait_with_deadline(child: &mut Child, deadline: Instant) -> WaitOutcome {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return WaitOutcome::Finished(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    // Kill and reap so the reader threads see EOF
                    let _ = child.kill();
                    let _ = child.wait();
                    return WaitOutcome::TimedOut;
                }
                thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return WaitOutcome::WaitFailed(err);
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut collected = Vec::new();
        // A read error ends capture with whatever arrived so far
        let _ = reader.read_to_end(&mut collected);
        collected
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> Supervisor {
        Supervisor::new(ShellKind::Posix, Duration::from_secs(30))
    }

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let sup = supervisor();
        let result = sup.execute("echo hello", "echo hello", None, None);
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        let sup = supervisor();
        let result = sup.execute("exit 3", "exit 3", None, None);
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
    }

    #[test]
    fn test_stderr_is_captured_separately() {
        let sup = supervisor();
        let result = sup.execute("echo oops 1>&2", "echo oops 1>&2", None, None);
        assert!(result.success);
        assert_eq!(result.stderr.trim(), "oops");
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_timeout_kills_and_reports_sentinel() {
        let sup = supervisor();
        let result = sup.execute(
            "sleep 5",
            "sleep 5",
            None,
            Some(Duration::from_secs(1)),
        );
        assert!(!result.success);
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.stderr.contains("timed out after 1s"));
        // Bounded overshoot: killed near the deadline, not at sleep's end
        assert!(result.duration_ms >= 1000);
        assert!(result.duration_ms < 3000);
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_failure_reports_failed_result() {
        // powershell.exe is not on a Unix host, so the spawn itself fails
        let sup = Supervisor::new(ShellKind::PowerShell, Duration::from_secs(5));
        let result = sup.execute("dir", "Get-ChildItem", None, None);
        assert!(!result.success);
        assert_eq!(result.exit_code, FAILURE_EXIT_CODE);
        assert!(!result.stderr.is_empty());
        assert!(result.stdout.is_empty());
        assert_eq!(sup.history().len(), 1);
    }

    #[test]
    fn test_missing_working_directory_fails_fast() {
        let sup = supervisor();
        let result = sup.execute(
            "echo hi",
            "echo hi",
            Some(Path::new("/definitely/not/a/real/dir")),
            None,
        );
        assert!(!result.success);
        assert_eq!(result.exit_code, FAILURE_EXIT_CODE);
        assert!(result.stderr.contains("working directory does not exist"));
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_working_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor();
        let result = sup.execute("pwd", "pwd", Some(dir.path()), None);
        assert!(result.success);
        // Compare canonicalized paths; the tempdir may live behind a symlink
        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[test]
    fn test_every_outcome_lands_in_history() {
        let sup = supervisor();
        sup.execute("echo one", "echo one", None, None);
        sup.execute("exit 1", "exit 1", None, None);
        sup.execute(
            "echo hi",
            "echo hi",
            Some(Path::new("/definitely/not/a/real/dir")),
            None,
        );
        assert_eq!(sup.history().len(), 3);
    }

    #[test]
    fn test_history_recent_is_newest_first() {
        let sup = supervisor();
        sup.execute("echo one", "echo one", None, None);
        sup.execute("echo two", "echo two", None, None);
        sup.execute("echo three", "echo three", None, None);

        let recent = sup.history().recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].command, "echo three");
        assert_eq!(recent[1].command, "echo two");

        // Asking for more than exists returns everything
        assert_eq!(sup.history().recent(10).len(), 3);
    }

    #[test]
    fn test_concurrent_appends_keep_every_entry() {
        let history = ExecutionHistory::new();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let history = &history;
                scope.spawn(move || {
                    for n in 0..25 {
                        history.append(ExecutionResult {
                            command: format!("cmd-{worker}-{n}"),
                            translated_command: String::new(),
                            stdout: String::new(),
                            stderr: String::new(),
                            exit_code: 0,
                            success: true,
                            duration_ms: 0,
                            timestamp: Utc::now(),
                        });
                    }
                });
            }
        });
        assert_eq!(history.len(), 100);
    }

    #[test]
    fn test_lossy_decode_of_invalid_utf8() {
        let sup = supervisor();
        // Octal escapes: \377\376 is not valid UTF-8
        let result = sup.execute(
            "printf '\\377\\376'",
            "printf '\\377\\376'",
            None,
            None,
        );
        assert!(result.success);
        // Undecodable bytes degrade to replacement characters
        assert!(result.stdout.contains('\u{FFFD}'));
    }
}
