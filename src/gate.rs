use crate::config::Config;
use crate::executor::{ExecutionHistory, Supervisor};
use crate::record::{CommandRequest, ExecutionResult};
use crate::risk::{RiskAssessment, RiskEvaluator};
use crate::translator::{ShellKind, Translator};
use std::time::Duration;
use tracing::{info, warn};

/// Terminal outcome of one request: the gate either blocks it with the
/// assessment, or runs it and returns both the assessment and the result.
#[derive(Debug)]
pub enum Verdict {
    Blocked(RiskAssessment),
    Executed {
        assessment: RiskAssessment,
        result: ExecutionResult,
    },
}

/// Orchestrates the pipeline: evaluate risk, admit or block, translate the
/// original text, hand the translated text to the supervisor.
pub struct DecisionGate {
    evaluator: RiskEvaluator,
    translator: Translator,
    supervisor: Supervisor,
    use_native: bool,
}

impl DecisionGate {
    pub fn new(config: &Config, shell: ShellKind) -> Self {
        Self {
            evaluator: RiskEvaluator::new(config.risk.clone()),
            translator: Translator::new(shell),
            supervisor: Supervisor::new(
                shell,
                Duration::from_secs(config.execution.timeout_secs),
            ),
            use_native: config.shell.use_native,
        }
    }

    /// Pure screening query, used by callers to drive warnings and the
    /// confirmation prompt before submitting. Does not execute anything.
    pub fn screen(&self, command: &str) -> RiskAssessment {
        self.evaluator.evaluate(command)
    }

    /// Translation preview for dry runs; identical to what `submit` would
    /// hand to the supervisor.
    pub fn preview(&self, command: &str) -> String {
        if self.use_native {
            command.to_string()
        } else {
            self.translator.translate(command)
        }
    }

    pub fn history(&self) -> &ExecutionHistory {
        self.supervisor.history()
    }

    /// Runs the full pipeline for one request. Risk is re-evaluated here so
    /// a blocked command can never reach the supervisor, even if the caller
    /// skipped `screen`.
    pub fn submit(&self, request: &CommandRequest) -> Verdict {
        let assessment = self.evaluator.evaluate(&request.raw);
        if !assessment.allowed {
            warn!(command = %request.raw, score = assessment.score, "blocked command");
            return Verdict::Blocked(assessment);
        }

        let translated = self.preview(&request.raw);
        if translated != request.raw {
            info!(original = %request.raw, translated = %translated, "translated command");
        }

        let result = self.supervisor.execute(
            &request.raw,
            &translated,
            request.working_dir.as_deref(),
            request.timeout_secs.map(Duration::from_secs),
        );

        Verdict::Executed { assessment, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> DecisionGate {
        DecisionGate::new(&Config::default(), ShellKind::Posix)
    }

    #[test]
    fn test_harmless_command_executes() {
        let gate = gate();
        let verdict = gate.submit(&CommandRequest::new("echo hello"));
        match verdict {
            Verdict::Executed { assessment, result } => {
                assert!(assessment.allowed);
                assert_eq!(assessment.score, 0);
                assert!(result.success);
                assert_eq!(result.stdout.trim(), "hello");
            }
            Verdict::Blocked(_) => panic!("echo should not be blocked"),
        }
    }

    #[test]
    fn test_critical_command_never_reaches_supervisor() {
        let gate = gate();
        let verdict = gate.submit(&CommandRequest::new("rm -rf /"));
        match verdict {
            Verdict::Blocked(assessment) => {
                assert!(!assessment.allowed);
            }
            Verdict::Executed { .. } => panic!("critical command must be blocked"),
        }
        // No execution result was produced
        assert!(gate.history().is_empty());
    }

    #[test]
    fn test_medium_command_is_admitted_with_warnings() {
        let gate = gate();
        let screening = gate.screen("rm notes.txt");
        assert!(screening.allowed);
        assert!(!screening.requires_confirmation());
        assert!(!screening.reasons.is_empty());

        // rm of a nonexistent file is admitted and fails at the host shell,
        // which is an execution failure, not a policy decision
        let verdict = gate.submit(&CommandRequest::new("rm surely-not-here.txt"));
        match verdict {
            Verdict::Executed { result, .. } => assert!(!result.success),
            Verdict::Blocked(_) => panic!("plain rm must be admitted"),
        }
    }

    #[test]
    fn test_high_risk_screening_requires_confirmation() {
        let gate = gate();
        let screening = gate.screen("rm stale.pid && kill 4242");
        assert!(screening.allowed);
        assert!(screening.requires_confirmation());
    }

    #[test]
    fn test_use_native_skips_translation() {
        let mut config = Config::default();
        config.shell.use_native = true;
        let native = DecisionGate::new(&config, ShellKind::PowerShell);
        assert_eq!(native.preview("ls -la"), "ls -la");

        // Default config still translates for the same dialect
        let translating = DecisionGate::new(&Config::default(), ShellKind::PowerShell);
        assert_eq!(translating.preview("ls -la"), "Get-ChildItem -Force");
    }

    #[test]
    fn test_request_overrides_flow_through() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate();
        let request = CommandRequest::new("pwd")
            .with_working_dir(Some(dir.path().to_path_buf()))
            .with_timeout_secs(Some(5));
        match gate.submit(&request) {
            Verdict::Executed { result, .. } => {
                assert!(result.success);
                let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
                let expected = std::fs::canonicalize(dir.path()).unwrap();
                assert_eq!(reported, expected);
            }
            Verdict::Blocked(_) => panic!("pwd must be admitted"),
        }
    }

    #[test]
    fn test_history_grows_only_on_admitted_commands() {
        let gate = gate();
        gate.submit(&CommandRequest::new("echo one"));
        gate.submit(&CommandRequest::new("rm -rf /"));
        gate.submit(&CommandRequest::new("echo two"));

        assert_eq!(gate.history().len(), 2);
        let recent = gate.history().recent(2);
        assert_eq!(recent[0].command, "echo two");
        assert_eq!(recent[1].command, "echo one");
    }
}
