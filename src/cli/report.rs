//! Terminal rendering of loop progress and results, plus the JSONL trace.

use colored::*;
use eyre::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use codemend::domain::{Attempt, DependencyOutcome, ExecutionOutcome, LoopEvent, LoopResult, LoopStatus};
use codemend::llm::Usage;

const PREVIEW_LINES: usize = 8;

/// One progress line for an event, or None for events not shown.
pub fn render_event(event: &LoopEvent, verbose: bool) -> Option<String> {
    match event {
        LoopEvent::AttemptStarted { index } => Some(format!("Attempt {}", index + 1).cyan().bold().to_string()),
        LoopEvent::StateEntered { state, .. } if verbose => Some(format!("  {} {}", "→".dimmed(), state)),
        LoopEvent::StateEntered { .. } => None,
        LoopEvent::DependencyResolved { record, .. } => {
            let outcome = match record.outcome {
                DependencyOutcome::FoundPreinstalled => "already installed".dimmed(),
                DependencyOutcome::Installed => "installed".green(),
                DependencyOutcome::InstallFailed => "install failed".red(),
            };
            Some(format!("  package {}: {}", record.package_name, outcome))
        }
        LoopEvent::AttemptFinished { attempt } => Some(render_attempt_summary(attempt)),
        LoopEvent::Finished { .. } => None,
    }
}

fn render_attempt_summary(attempt: &Attempt) -> String {
    let elapsed = format!("({}ms)", attempt.duration_ms).dimmed();
    if attempt.is_success() {
        return format!("  {} {}", "✓ output accepted".green(), elapsed);
    }
    match attempt.failure_reason() {
        Some(reason) => format!("  {} {} {}", "✗".red(), reason, elapsed),
        None => format!("  {}", elapsed),
    }
}

/// Final summary block for a finished run.
pub fn render_result(result: &LoopResult) -> String {
    let mut out = String::new();
    let attempts = result.attempt_count();

    match &result.status {
        LoopStatus::Success { code, output } => {
            out.push_str(&format!("{} after {} attempt(s)\n", "Success".green().bold(), attempts));
            out.push_str(&format!("\n{}\n{}\n", "Code:".bold(), code));
            out.push_str(&format!("\n{}\n{}\n", "Output:".bold(), output.trim_end()));
        }
        LoopStatus::ExhaustedRetries { .. } => {
            out.push_str(&format!("{} after {} attempt(s)\n", "Gave up".red().bold(), attempts));
            if let Some(diagnostic) = result.diagnostic_attempt() {
                out.push_str(&render_diagnostic(diagnostic));
            }
        }
        LoopStatus::NoCodeFound => {
            out.push_str(&format!("{}: the response contained no code block\n", "No code found".red().bold()));
            if let Some(attempt) = result.last_attempt() {
                out.push_str(&format!("\n{}\n{}\n", "Response:".bold(), preview(&attempt.source_text)));
            }
        }
        LoopStatus::Cancelled => {
            out.push_str(&format!("{} after {} attempt(s)\n", "Cancelled".yellow().bold(), attempts));
        }
    }

    out
}

fn render_diagnostic(attempt: &Attempt) -> String {
    let mut out = format!(
        "\n{} (attempt {})\n",
        "Last failure".bold(),
        attempt.index + 1
    );
    if let Some(reason) = attempt.failure_reason() {
        out.push_str(&format!("{}\n", reason));
    }
    if let Some(ExecutionOutcome::RanWithOutput(captured)) = &attempt.execution_outcome {
        out.push_str(&format!("\n{}\n{}\n", "Output:".bold(), preview(captured)));
    }
    if let Some(code) = &attempt.extracted_code {
        out.push_str(&format!("\n{}\n{}\n", "Code:".bold(), code));
    }
    out
}

/// Token usage line for the oracle calls of a run
pub fn render_usage(usage: &Usage, model: &str) -> String {
    format!(
        "{} {} in / {} out (~${:.4})",
        "Tokens:".dimmed(),
        usage.input_tokens,
        usage.output_tokens,
        usage.cost_usd(model)
    )
}

fn preview(text: &str) -> String {
    let total = text.lines().count();
    let mut shown = text.lines().take(PREVIEW_LINES).collect::<Vec<_>>().join("\n");
    if total > PREVIEW_LINES {
        shown.push_str(&format!("\n... ({} more lines)", total - PREVIEW_LINES));
    }
    shown
}

/// Appends finished attempts to a JSON-lines file.
pub struct TraceWriter {
    file: File,
}

impl TraceWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("Failed to open trace file {}", path.display()))?;
        Ok(Self { file })
    }

    pub fn append(&mut self, attempt: &Attempt) -> Result<()> {
        let line = serde_json::to_string(attempt).context("Failed to serialize attempt")?;
        writeln!(self.file, "{}", line).context("Failed to write trace line")?;
        Ok(())
    }
}
