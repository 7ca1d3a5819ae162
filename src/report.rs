//! Per-step run reporting
//!
//! Every pipeline step produces an explicit outcome instead of silently
//! swallowing failures. Soft failures keep the run going; a hard failure
//! aborts it. The aggregated report is what operators (and tests) inspect
//! to determine what actually happened, since the process exit code only
//! reflects hard failures.

use serde::{Deserialize, Serialize};

/// Outcome of a single provisioning step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "kebab-case")]
pub enum StepOutcome {
    /// Step completed successfully
    Success,
    /// Step failed but the run continues
    SoftFailure(String),
    /// Step failed and the run must abort
    HardFailure(String),
    /// Step was not applicable for this configuration
    Skipped(String),
}

impl StepOutcome {
    pub fn is_hard_failure(&self) -> bool {
        matches!(self, Self::HardFailure(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A named step together with its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub outcome: StepOutcome,
}

/// Ordered record of a provisioning run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step outcome, returning whether the run may continue
    pub fn record(&mut self, step: impl Into<String>, outcome: StepOutcome) -> bool {
        let proceed = !outcome.is_hard_failure();
        self.steps.push(StepReport {
            step: step.into(),
            outcome,
        });
        proceed
    }

    /// Look up the outcome of a named step
    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| &s.outcome)
    }

    /// Whether any step hard-failed
    pub fn failed(&self) -> bool {
        self.steps.iter().any(|s| s.outcome.is_hard_failure())
    }

    /// Number of soft failures in the run
    pub fn soft_failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::SoftFailure(_)))
            .count()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for step in &self.steps {
            let status = match &step.outcome {
                StepOutcome::Success => "ok".to_string(),
                StepOutcome::SoftFailure(r) => format!("soft-fail ({r})"),
                StepOutcome::HardFailure(r) => format!("FAILED ({r})"),
                StepOutcome::Skipped(r) => format!("skipped ({r})"),
            };
            writeln!(f, "{:<16} {}", step.step, status)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_soft_failure_continues() {
        let mut report = RunReport::new();
        assert!(report.record("firewall", StepOutcome::SoftFailure("ufw missing".into())));
        assert!(!report.failed());
        assert_eq!(report.soft_failures(), 1);
    }

    #[test]
    fn test_record_hard_failure_stops() {
        let mut report = RunReport::new();
        assert!(report.record("config", StepOutcome::Success));
        assert!(!report.record("webserver", StepOutcome::HardFailure("install".into())));
        assert!(report.failed());
    }

    #[test]
    fn test_outcome_lookup() {
        let mut report = RunReport::new();
        report.record("packages", StepOutcome::Success);
        assert!(report.outcome("packages").unwrap().is_success());
        assert!(report.outcome("missing").is_none());
    }
}
