//! CLI module for codemend - command-line interface and output rendering.

pub mod commands;
pub mod report;

pub use commands::{Cli, Commands};
