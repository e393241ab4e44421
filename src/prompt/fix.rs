//! Fixer prompt construction.
//!
//! When an attempt fails, the oracle gets back the code it wrote, what went
//! wrong with it, and a directive to answer with a corrected block only.

use crate::domain::{Attempt, ExecutionOutcome};

/// Signal text for runs that completed but produced nothing usable
pub const NO_USABLE_OUTPUT: &str = "ran but produced no usable output";

/// Builds fixer prompts from failed attempts.
#[derive(Debug, Clone)]
pub struct FixRequestBuilder {
    /// Code fence tag the oracle is asked to answer with
    pub language: String,

    /// Max lines of captured output quoted back to the oracle
    pub max_output_lines: usize,
}

impl Default for FixRequestBuilder {
    fn default() -> Self {
        Self {
            language: "python".to_string(),
            max_output_lines: 40,
        }
    }
}

impl FixRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_max_output_lines(mut self, max: usize) -> Self {
        self.max_output_lines = max;
        self
    }

    /// Prompt for a single failed attempt, with no memory of earlier ones.
    pub fn build(&self, previous: &Attempt) -> String {
        let mut output = String::new();

        output.push_str("The code below failed.\n\n");
        output.push_str("## Code\n\n");
        let code = previous.extracted_code.as_deref().unwrap_or("");
        let fence = fence_for(code);
        output.push_str(&format!("{}{}\n{}\n{}\n\n", fence, self.language, code, fence));

        output.push_str("## Problem\n\n");
        output.push_str(&self.format_signal(previous));
        output.push('\n');

        output.push_str("## Instructions\n\n");
        output.push_str(&format!(
            "Fix the code so it runs cleanly and prints a complete, meaningful result. \
             Reply with ONLY the corrected code in a single ```{} fenced block, with no explanation.\n",
            self.language
        ));

        output
    }

    /// Like `build`, with a rolling summary of every earlier failure.
    ///
    /// `history` is the full attempt list so far; its last entry is the attempt
    /// being fixed.
    pub fn build_with_history(&self, history: &[Attempt]) -> String {
        let Some(latest) = history.last() else {
            return String::new();
        };

        let summary = format_history(&history[..history.len() - 1]);
        if summary.is_empty() {
            return self.build(latest);
        }

        format!("{}\n{}", summary, self.build(latest))
    }

    fn format_signal(&self, attempt: &Attempt) -> String {
        match &attempt.execution_outcome {
            Some(ExecutionOutcome::Crashed(error)) => {
                let error = error.trim();
                let fence = fence_for(error);
                format!("The code crashed with:\n\n{}\n{}\n{}\n", fence, error, fence)
            }
            Some(outcome) => {
                let mut text = format!("The code {}", NO_USABLE_OUTPUT);
                if let Some(reason) = attempt.validation_verdict.as_ref().and_then(|v| v.reason()) {
                    text.push_str(&format!(" ({})", reason));
                }
                text.push_str(".\n");

                match outcome.output() {
                    Some(captured) => {
                        let captured = truncate_lines(captured.trim(), self.max_output_lines);
                        let fence = fence_for(&captured);
                        text.push_str(&format!("\nIt printed:\n\n{}\n{}\n{}\n", fence, captured, fence));
                    }
                    None => text.push_str("\nIt printed nothing.\n"),
                }
                text
            }
            None => "The code was never executed.\n".to_string(),
        }
    }
}

/// One line per earlier failed attempt, oldest first.
fn format_history(history: &[Attempt]) -> String {
    let failed: Vec<_> = history.iter().filter_map(|a| a.failure_reason().map(|r| (a.index, r))).collect();
    if failed.is_empty() {
        return String::new();
    }

    let mut output = String::from("## Earlier attempts\n\n");
    for (index, reason) in failed {
        output.push_str(&format!("- Attempt {}: {}\n", index + 1, reason));
    }
    output.push_str("\nDo not repeat these mistakes.\n");
    output
}

/// Backtick fence longer than any backtick run inside `text`
fn fence_for(text: &str) -> String {
    let longest = text
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn truncate_lines(text: &str, max_lines: usize) -> String {
    let total = text.lines().count();
    let mut result = text.lines().take(max_lines).collect::<Vec<_>>().join("\n");
    if total > max_lines {
        result.push_str(&format!("\n... ({} more lines)", total - max_lines));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Verdict;

    fn crashed(index: u32, code: &str, error: &str) -> Attempt {
        let mut attempt = Attempt::new(index, "response");
        attempt.extracted_code = Some(code.to_string());
        attempt.execution_outcome = Some(ExecutionOutcome::Crashed(error.to_string()));
        attempt
    }

    fn invalid(index: u32, code: &str, captured: Option<&str>, reason: &str) -> Attempt {
        let mut attempt = Attempt::new(index, "response");
        attempt.extracted_code = Some(code.to_string());
        attempt.execution_outcome = Some(match captured {
            Some(text) => ExecutionOutcome::RanWithOutput(text.to_string()),
            None => ExecutionOutcome::RanEmpty,
        });
        attempt.validation_verdict = Some(Verdict::Invalid(reason.to_string()));
        attempt
    }

    #[test]
    fn test_crash_prompt_contains_code_and_error() {
        let builder = FixRequestBuilder::new();
        let prompt = builder.build(&crashed(0, "print(1/0)", "ZeroDivisionError: division by zero (line 1)"));

        assert!(prompt.contains("```python\nprint(1/0)\n```"));
        assert!(prompt.contains("ZeroDivisionError: division by zero"));
        assert!(prompt.contains("ONLY the corrected code"));
        assert!(!prompt.contains(NO_USABLE_OUTPUT));
    }

    #[test]
    fn test_invalid_prompt_includes_captured_text() {
        let builder = FixRequestBuilder::new();
        let prompt = builder.build(&invalid(0, "print('no data found')", Some("no data found"), "output too short"));

        assert!(prompt.contains(NO_USABLE_OUTPUT));
        assert!(prompt.contains("(output too short)"));
        assert!(prompt.contains("It printed:\n\n```\nno data found\n```"));
    }

    #[test]
    fn test_code_containing_fences_gets_longer_fence() {
        let code = "DOC = \"\"\"\n```\nexample\n```\n\"\"\"\nprint(DOC)";
        let prompt = FixRequestBuilder::new().build(&crashed(0, code, "NameError: name 'x' is not defined"));

        assert!(prompt.contains(&format!("````python\n{}\n````\n", code)));
        // the error block has no backticks inside, so it keeps the short fence
        assert!(prompt.contains("```\nNameError: name 'x' is not defined\n```"));
    }

    #[test]
    fn test_fence_for() {
        assert_eq!(fence_for("print(1)"), "```");
        assert_eq!(fence_for("a ``` b"), "````");
        assert_eq!(fence_for("`````"), "``````");
    }

    #[test]
    fn test_empty_run_prompt() {
        let builder = FixRequestBuilder::new();
        let prompt = builder.build(&invalid(0, "x = 1", None, "no output produced"));

        assert!(prompt.contains(NO_USABLE_OUTPUT));
        assert!(prompt.contains("It printed nothing."));
    }

    #[test]
    fn test_long_output_is_truncated() {
        let builder = FixRequestBuilder::new().with_max_output_lines(3);
        let captured = (1..=10).map(|i| format!("row {}", i)).collect::<Vec<_>>().join("\n");
        let prompt = builder.build(&invalid(0, "code", Some(&captured), "matched failure phrase: empty"));

        assert!(prompt.contains("row 3"));
        assert!(!prompt.contains("row 4"));
        assert!(prompt.contains("... (7 more lines)"));
    }

    #[test]
    fn test_custom_language_tag() {
        let builder = FixRequestBuilder::new().with_language("py");
        let prompt = builder.build(&crashed(0, "pass", "SyntaxError"));
        assert!(prompt.contains("```py\npass\n```"));
        assert!(prompt.contains("single ```py fenced block"));
    }

    #[test]
    fn test_build_is_stateless() {
        let builder = FixRequestBuilder::new();
        let attempt = crashed(2, "import foo", "ModuleNotFoundError: No module named 'foo'");
        assert!(!builder.build(&attempt).contains("Earlier attempts"));
    }

    #[test]
    fn test_history_summarizes_prior_failures() {
        let builder = FixRequestBuilder::new();
        let history = vec![
            crashed(0, "a", "NameError: name 'x' is not defined"),
            invalid(1, "b", Some("empty"), "output too short"),
            crashed(2, "c", "KeyError: 'price'"),
        ];
        let prompt = builder.build_with_history(&history);

        assert!(prompt.starts_with("## Earlier attempts"));
        assert!(prompt.contains("- Attempt 1: crashed: NameError: name 'x' is not defined"));
        assert!(prompt.contains("- Attempt 2: invalid output: output too short"));
        // the latest attempt is the one being fixed, not part of the summary
        assert!(!prompt.contains("- Attempt 3"));
        assert!(prompt.contains("```python\nc\n```"));
    }

    #[test]
    fn test_history_with_single_attempt_matches_build() {
        let builder = FixRequestBuilder::new();
        let attempt = crashed(0, "a", "boom");
        assert_eq!(builder.build_with_history(std::slice::from_ref(&attempt)), builder.build(&attempt));
    }

    #[test]
    fn test_history_empty() {
        assert_eq!(FixRequestBuilder::new().build_with_history(&[]), "");
    }

    #[test]
    fn test_truncate_lines() {
        assert_eq!(truncate_lines("a\nb", 5), "a\nb");
        assert_eq!(truncate_lines("a\nb\nc", 2), "a\nb\n... (1 more lines)");
    }
}
