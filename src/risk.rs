use crate::config::RiskConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Outcome of screening one command. Created fresh per request and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub score: u32,
    pub level: RiskLevel,
    pub reasons: Vec<String>,
    pub allowed: bool,
}

impl RiskAssessment {
    /// HIGH-risk commands run only after the caller confirms. The core
    /// never blocks waiting for that answer itself.
    pub fn requires_confirmation(&self) -> bool {
        self.level == RiskLevel::High
    }
}

/// Scores a command's destructive potential with four independent checks.
/// Matching is substring/keyword based on the original, untranslated text;
/// the strategy is hidden behind `evaluate` so it can be swapped later.
pub struct RiskEvaluator {
    config: RiskConfig,
}

impl RiskEvaluator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Deterministic: identical input and configuration always produce an
    /// identical assessment. All four checks run unconditionally and their
    /// contributions sum; reasons keep check order.
    pub fn evaluate(&self, command: &str) -> RiskAssessment {
        let lowered = command.to_lowercase();
        let mut score: u32 = 0;
        let mut reasons = Vec::new();
        let mut critical_hit = false;

        for signature in &self.config.critical_operations {
            if lowered.contains(&signature.to_lowercase()) {
                score += self.config.critical_penalty;
                reasons.push(format!("critical operation: {signature}"));
                critical_hit = true;
            }
        }

        for pattern in &self.config.dangerous_patterns {
            if lowered.contains(&pattern.to_lowercase()) {
                score += self.config.dangerous_penalty;
                reasons.push(format!("dangerous pattern: {}", pattern.trim_end()));
            }
        }

        for path in &self.config.system_paths {
            if lowered.contains(&path.to_lowercase()) {
                score += self.config.system_path_penalty;
                reasons.push(format!("touches system path: {path}"));
            }
        }

        for marker in &self.config.resource_intensive {
            if lowered.contains(&marker.to_lowercase()) {
                score += self.config.resource_penalty;
                reasons.push(format!("resource intensive: {}", marker.trim_end()));
            }
        }

        // A critical signature forces CRITICAL even if the configured
        // penalty would not reach the breakpoint on its own.
        let level = if critical_hit {
            RiskLevel::Critical
        } else {
            self.level_for(score)
        };

        RiskAssessment {
            score,
            level,
            reasons,
            allowed: level != RiskLevel::Critical,
        }
    }

    fn level_for(&self, score: u32) -> RiskLevel {
        if score >= self.config.critical_threshold {
            RiskLevel::Critical
        } else if score >= self.config.high_threshold {
            RiskLevel::High
        } else if score >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}
