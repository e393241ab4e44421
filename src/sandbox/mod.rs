//! Sandboxed execution of generated code.
//!
//! Provides the CodeRunner trait used by the healing loop and the
//! process-per-run PythonSandbox implementation.

mod runner;

pub use runner::{
    CodeRunner, PythonSandbox, RunReport, SandboxConfig, TIMEOUT_FAULT, summarize_fault, truncate_output,
};
