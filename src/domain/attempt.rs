//! Attempt record and its per-stage outcomes
//!
//! An Attempt is one extract → resolve → run → validate cycle. The healing loop
//! fills in a fresh Attempt as it moves through the states and appends it to the
//! history once the cycle ends; after that it is never touched again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one declared package during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOutcome {
    /// Already importable, nothing was installed
    FoundPreinstalled,
    /// Installed by the package installer
    Installed,
    /// Both the user-scoped and the unscoped install failed
    InstallFailed,
}

impl DependencyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyOutcome::FoundPreinstalled => "found_preinstalled",
            DependencyOutcome::Installed => "installed",
            DependencyOutcome::InstallFailed => "install_failed",
        }
    }
}

impl std::fmt::Display for DependencyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of an attempt's dependency log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub package_name: String,
    pub outcome: DependencyOutcome,
}

impl DependencyRecord {
    pub fn new(package_name: impl Into<String>, outcome: DependencyOutcome) -> Self {
        Self {
            package_name: package_name.into(),
            outcome,
        }
    }
}

/// How the sandboxed run of the extracted code ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The code raised, exited non-zero or timed out
    Crashed(String),
    /// The code finished but printed nothing
    RanEmpty,
    /// The code finished and printed something
    RanWithOutput(String),
}

impl ExecutionOutcome {
    /// Classify a raw `(success, captured_text)` pair from the runner.
    pub fn from_run(success: bool, captured: impl Into<String>) -> Self {
        let captured = captured.into();
        if !success {
            ExecutionOutcome::Crashed(captured)
        } else if captured.trim().is_empty() {
            ExecutionOutcome::RanEmpty
        } else {
            ExecutionOutcome::RanWithOutput(captured)
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, ExecutionOutcome::Crashed(_))
    }

    /// Captured output, if the run completed with any
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::RanWithOutput(text) => Some(text),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Crashed(_) => "crashed",
            ExecutionOutcome::RanEmpty => "ran_empty",
            ExecutionOutcome::RanWithOutput(_) => "ran_with_output",
        }
    }
}

/// Semantic verdict on a completed run's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    Invalid(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Valid => None,
            Verdict::Invalid(reason) => Some(reason),
        }
    }
}

/// One iteration of the healing loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 0-based position in the loop
    pub index: u32,

    /// Raw oracle response this attempt worked from
    pub source_text: String,

    /// Code pulled out of `source_text`; None means extraction failed
    pub extracted_code: Option<String>,

    /// Per-package resolution results, in declaration order
    pub dependency_log: Vec<DependencyRecord>,

    /// None when there was no code to run or the loop was cancelled first
    pub execution_outcome: Option<ExecutionOutcome>,

    /// Only set once the run completed
    pub validation_verdict: Option<Verdict>,

    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl Attempt {
    /// Start a new attempt for the given oracle response.
    pub fn new(index: u32, source_text: impl Into<String>) -> Self {
        Self {
            index,
            source_text: source_text.into(),
            extracted_code: None,
            dependency_log: Vec::new(),
            execution_outcome: None,
            validation_verdict: None,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// True when the run produced output and the validator accepted it
    pub fn is_success(&self) -> bool {
        matches!(self.execution_outcome, Some(ExecutionOutcome::RanWithOutput(_)))
            && self.validation_verdict.as_ref().is_some_and(Verdict::is_valid)
    }

    /// True when this attempt carries a crash or validation diagnostic
    pub fn has_diagnostic(&self) -> bool {
        self.failure_reason().is_some() && self.extracted_code.is_some()
    }

    /// One-line description of why this attempt did not succeed.
    pub fn failure_reason(&self) -> Option<String> {
        if self.extracted_code.is_none() {
            return Some("no fenced code block in response".to_string());
        }
        match (&self.execution_outcome, &self.validation_verdict) {
            (Some(ExecutionOutcome::Crashed(error)), _) => Some(format!("crashed: {}", first_line(error))),
            (Some(_), Some(Verdict::Invalid(reason))) => Some(format!("invalid output: {}", reason)),
            (None, _) => Some("not executed".to_string()),
            _ => None,
        }
    }

    /// Count of packages that could not be installed
    pub fn failed_dependencies(&self) -> usize {
        self.dependency_log
            .iter()
            .filter(|d| d.outcome == DependencyOutcome::InstallFailed)
            .count()
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt_with(outcome: Option<ExecutionOutcome>, verdict: Option<Verdict>) -> Attempt {
        let mut attempt = Attempt::new(0, "```python\nprint(1)\n```");
        attempt.extracted_code = Some("print(1)".to_string());
        attempt.execution_outcome = outcome;
        attempt.validation_verdict = verdict;
        attempt
    }

    #[test]
    fn test_from_run_crash() {
        let outcome = ExecutionOutcome::from_run(false, "ZeroDivisionError: division by zero");
        assert_eq!(outcome, ExecutionOutcome::Crashed("ZeroDivisionError: division by zero".to_string()));
        assert!(outcome.is_crash());
    }

    #[test]
    fn test_from_run_empty() {
        assert_eq!(ExecutionOutcome::from_run(true, ""), ExecutionOutcome::RanEmpty);
        assert_eq!(ExecutionOutcome::from_run(true, "  \n\t"), ExecutionOutcome::RanEmpty);
    }

    #[test]
    fn test_from_run_with_output() {
        let outcome = ExecutionOutcome::from_run(true, "hello\n");
        assert_eq!(outcome.output(), Some("hello\n"));
        assert_eq!(outcome.label(), "ran_with_output");
    }

    #[test]
    fn test_new_attempt_is_blank() {
        let attempt = Attempt::new(2, "raw");
        assert_eq!(attempt.index, 2);
        assert_eq!(attempt.source_text, "raw");
        assert!(attempt.extracted_code.is_none());
        assert!(attempt.dependency_log.is_empty());
        assert!(attempt.execution_outcome.is_none());
        assert!(attempt.validation_verdict.is_none());
    }

    #[test]
    fn test_is_success_requires_output_and_valid() {
        let ok = attempt_with(Some(ExecutionOutcome::RanWithOutput("x".repeat(80))), Some(Verdict::Valid));
        assert!(ok.is_success());

        let invalid = attempt_with(
            Some(ExecutionOutcome::RanWithOutput("short".to_string())),
            Some(Verdict::Invalid("output too short".to_string())),
        );
        assert!(!invalid.is_success());

        let empty = attempt_with(Some(ExecutionOutcome::RanEmpty), Some(Verdict::Valid));
        assert!(!empty.is_success());
    }

    #[test]
    fn test_failure_reason_variants() {
        let mut no_code = Attempt::new(0, "just prose");
        no_code.extracted_code = None;
        assert_eq!(no_code.failure_reason().unwrap(), "no fenced code block in response");
        assert!(!no_code.has_diagnostic());

        let crashed = attempt_with(
            Some(ExecutionOutcome::Crashed("\nNameError: name 'x' is not defined\n".to_string())),
            None,
        );
        assert_eq!(crashed.failure_reason().unwrap(), "crashed: NameError: name 'x' is not defined");
        assert!(crashed.has_diagnostic());

        let invalid = attempt_with(
            Some(ExecutionOutcome::RanWithOutput("No data found".to_string())),
            Some(Verdict::Invalid("output too short".to_string())),
        );
        assert_eq!(invalid.failure_reason().unwrap(), "invalid output: output too short");

        let ok = attempt_with(Some(ExecutionOutcome::RanWithOutput("x".repeat(80))), Some(Verdict::Valid));
        assert!(ok.failure_reason().is_none());
    }

    #[test]
    fn test_failed_dependencies() {
        let mut attempt = Attempt::new(0, "");
        attempt.dependency_log = vec![
            DependencyRecord::new("pandas", DependencyOutcome::FoundPreinstalled),
            DependencyRecord::new("nosuchpkg", DependencyOutcome::InstallFailed),
            DependencyRecord::new("requests", DependencyOutcome::Installed),
        ];
        assert_eq!(attempt.failed_dependencies(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ExecutionOutcome::Crashed("boom".to_string())).unwrap();
        assert_eq!(json["kind"], "crashed");
        assert_eq!(json["detail"], "boom");

        let json = serde_json::to_value(Verdict::Invalid("output too short".to_string())).unwrap();
        assert_eq!(json["kind"], "invalid");
        assert_eq!(json["reason"], "output too short");

        let json = serde_json::to_string(&DependencyOutcome::FoundPreinstalled).unwrap();
        assert_eq!(json, "\"found_preinstalled\"");
    }
}
