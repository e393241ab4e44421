//! Terminal result types for a healing loop run.

use serde::{Deserialize, Serialize};

use super::attempt::Attempt;

/// How a healing loop run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopStatus {
    /// The last attempt ran, printed output, and the validator accepted it
    Success { code: String, output: String },
    /// Retries ran out; `last_attempt` indexes the attempt holding the last diagnostic
    ExhaustedRetries { last_attempt: u32 },
    /// The first oracle response contained no code block
    NoCodeFound,
    /// Stopped by an external signal between transitions
    Cancelled,
}

impl LoopStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, LoopStatus::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoopStatus::Success { .. } => "success",
            LoopStatus::ExhaustedRetries { .. } => "exhausted_retries",
            LoopStatus::NoCodeFound => "no_code_found",
            LoopStatus::Cancelled => "cancelled",
        }
    }
}

/// Terminal outcome plus the full attempt history.
///
/// `attempts` holds between 1 and `max_retries + 1` entries. The one exception
/// is `Cancelled` raised before the first attempt starts, which carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopResult {
    pub status: LoopStatus,
    pub attempts: Vec<Attempt>,
}

impl LoopResult {
    pub fn new(status: LoopStatus, attempts: Vec<Attempt>) -> Self {
        Self { status, attempts }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// The attempt whose failure explains the terminal status, if any.
    pub fn diagnostic_attempt(&self) -> Option<&Attempt> {
        match self.status {
            LoopStatus::ExhaustedRetries { last_attempt } => self.attempts.get(last_attempt as usize),
            LoopStatus::Success { .. } => None,
            _ => self.attempts.last(),
        }
    }
}
