//! Progress events emitted while a healing loop runs.
//!
//! A presentation layer can subscribe to these to render attempt-by-attempt
//! progress before the final `LoopResult` is available.

use serde::{Deserialize, Serialize};

use super::attempt::{Attempt, DependencyRecord};
use super::outcome::LoopStatus;

/// States of the healing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Extracting,
    Resolving,
    Running,
    Validating,
    Fixing,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Extracting => "extracting",
            LoopState::Resolving => "resolving",
            LoopState::Running => "running",
            LoopState::Validating => "validating",
            LoopState::Fixing => "fixing",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Incremental progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoopEvent {
    AttemptStarted { index: u32 },
    StateEntered { index: u32, state: LoopState },
    DependencyResolved { index: u32, record: DependencyRecord },
    AttemptFinished { attempt: Box<Attempt> },
    Finished { status: LoopStatus, attempts: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attempt::DependencyOutcome;

    #[test]
    fn test_state_display() {
        assert_eq!(LoopState::Extracting.to_string(), "extracting");
        assert_eq!(LoopState::Fixing.to_string(), "fixing");
    }

    #[test]
    fn test_event_serialization() {
        let event = LoopEvent::DependencyResolved {
            index: 0,
            record: DependencyRecord::new("numpy", DependencyOutcome::Installed),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "dependency_resolved");
        assert_eq!(json["record"]["package_name"], "numpy");
        assert_eq!(json["record"]["outcome"], "installed");

        let event = LoopEvent::StateEntered {
            index: 1,
            state: LoopState::Running,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["state"], "running");
    }
}
