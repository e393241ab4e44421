//! Validation of sandboxed run output
//!
//! Decides whether a run that completed without faulting actually produced
//! a usable result.

pub mod output;

pub use output::{DEFAULT_MIN_CHARS, OutputValidator, OutputValidatorConfig, default_failure_phrases};
