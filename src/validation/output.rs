//! Output validator - semantic checks on a completed run's stdout
//!
//! A run that exits cleanly can still be a non-answer: nothing printed, a
//! one-word reply, or a polite "no data found". These heuristics catch the
//! common cases; they are a filter, not a proof of correctness.

use crate::domain::Verdict;

/// Minimum trimmed length (in characters) of usable output
pub const DEFAULT_MIN_CHARS: usize = 50;

/// Phrases that signal a run produced no real result
pub fn default_failure_phrases() -> Vec<String> {
    [
        "no data found",
        "not found",
        "empty",
        "0 items",
        "no results",
        "لا توجد بيانات",
        "لم يتم العثور",
        "فارغ",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Configuration for the output validator
#[derive(Debug, Clone)]
pub struct OutputValidatorConfig {
    pub min_chars: usize,
    pub failure_phrases: Vec<String>,
}

impl Default for OutputValidatorConfig {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            failure_phrases: default_failure_phrases(),
        }
    }
}

impl OutputValidatorConfig {
    /// Set the minimum content length
    pub fn min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    /// Replace the failure phrase list
    pub fn failure_phrases(mut self, phrases: Vec<String>) -> Self {
        self.failure_phrases = phrases;
        self
    }
}

/// Judges whether captured output is a usable result
#[derive(Debug, Clone)]
pub struct OutputValidator {
    min_chars: usize,
    /// (as configured, lowercased) pairs
    phrases: Vec<(String, String)>,
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self::new(OutputValidatorConfig::default())
    }
}

impl OutputValidator {
    pub fn new(config: OutputValidatorConfig) -> Self {
        let phrases = config
            .failure_phrases
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                let lowered = p.to_lowercase();
                (p, lowered)
            })
            .collect();
        Self {
            min_chars: config.min_chars,
            phrases,
        }
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Length floor first, then the failure phrase scan.
    pub fn validate(&self, captured: &str) -> Verdict {
        let trimmed = captured.trim();
        if trimmed.chars().count() < self.min_chars {
            return Verdict::Invalid("output too short".to_string());
        }

        let lowered = trimmed.to_lowercase();
        if let Some((phrase, _)) = self.phrases.iter().find(|(_, needle)| lowered.contains(needle.as_str())) {
            return Verdict::Invalid(format!("matched failure phrase: {}", phrase));
        }

        Verdict::Valid
    }
}
