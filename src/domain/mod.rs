//! Domain types for codemend
//!
//! This module contains the value objects produced by a healing loop run:
//! - Attempt: one extract → resolve → run → validate cycle
//! - LoopResult / LoopStatus: terminal outcome plus attempt history
//! - LoopEvent / LoopState: incremental progress for presentation layers

pub mod attempt;
pub mod event;
pub mod outcome;

pub use attempt::{Attempt, DependencyOutcome, DependencyRecord, ExecutionOutcome, Verdict};
pub use event::{LoopEvent, LoopState};
pub use outcome::{LoopResult, LoopStatus};
