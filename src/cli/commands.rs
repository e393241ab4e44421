//! CLI command definitions using clap.
//!
//! - run: drive the full healing loop for a task
//! - check: push one saved response through a single attempt
//! - validate: judge captured output with the output validator only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use codemend::config::ConfigOverrides;

/// codemend - run LLM-generated Python and heal it until it works
#[derive(Parser, Debug)]
#[command(name = "codemend")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override healing.max-retries
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Override llm.model
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Override sandbox.timeout-ms
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Config values given on the command line
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            max_retries: self.max_retries,
            model: self.model.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate code for a task and heal it until it produces a usable result
    Run {
        /// Task description sent to the oracle
        #[arg(required_unless_present = "task_file")]
        task: Option<String>,

        /// Read the task description from a file instead
        #[arg(long, conflicts_with = "task")]
        task_file: Option<PathBuf>,

        /// Print the final result as JSON
        #[arg(long)]
        json: bool,

        /// Append every finished attempt as one JSON line to this file
        #[arg(long)]
        trace: Option<PathBuf>,
    },

    /// Run one saved oracle response through a single attempt, no fixing
    Check {
        /// File holding the raw response text
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Judge captured program output with the output validator
    Validate {
        /// File to read; stdin when omitted
        file: Option<PathBuf>,
    },
}
