//! codemend - a self-healing loop for LLM-generated code
//!
//! An oracle writes Python for a task; codemend extracts the code, installs
//! what it declares, runs it in a fresh interpreter, judges the output, and
//! on failure sends the diagnostic back to the oracle for a fix. The loop is
//! bounded by a retry ceiling.

pub mod config;
pub mod deps;
pub mod domain;
pub mod error;
pub mod extract;
pub mod llm;
pub mod prompt;
pub mod runner;
pub mod sandbox;
pub mod validation;

pub use error::{MendError, Result};
