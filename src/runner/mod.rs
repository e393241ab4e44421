//! Healing loop runner
//!
//! - pipeline: one extract → resolve → run → validate attempt
//! - healing_loop: the retrying loop around the oracle
//! - signal: external cancellation

mod healing_loop;
mod pipeline;
mod signal;

pub use healing_loop::{
    DEFAULT_FIXER_ROLE, DEFAULT_MAX_RETRIES, DEFAULT_ORACLE_TIMEOUT_MS, DEFAULT_SYSTEM_ROLE, HealingLoop,
    HealingLoopConfig,
};
pub use pipeline::{AttemptPipeline, AttemptStep, NO_OUTPUT_REASON};
pub use signal::{CancelFlag, NoOpSignalChecker, SignalChecker};
