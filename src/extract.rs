//! Fenced code block extraction from free-form oracle output.
//!
//! The oracle is asked to answer with a single fenced block but is free to
//! ignore that. Extraction prefers a block tagged with the target language,
//! falls back to the first untagged block, and otherwise reports absence.

/// A fenced block found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    /// First word of the info string, lowercased; empty for untagged fences
    pub tag: String,
    pub body: String,
}

/// Scan `text` for closed ``` fences, in order of appearance.
///
/// A fence opens on a line starting with three backticks and closes on the
/// next line that starts with three backticks. Unclosed fences are ignored.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match open.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let tag = info
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .trim_start_matches('{')
                        .trim_start_matches('.')
                        .trim_end_matches('}')
                        .to_lowercase();
                    open = Some((tag, Vec::new()));
                }
            }
            Some((tag, mut body)) => {
                if trimmed.starts_with("```") {
                    blocks.push(FencedBlock {
                        tag,
                        body: body.join("\n"),
                    });
                } else {
                    body.push(line);
                    open = Some((tag, body));
                }
            }
        }
    }

    blocks
}

/// Pulls the code the oracle produced out of its response.
#[derive(Debug, Clone)]
pub struct CodeBlockExtractor {
    language: String,
    aliases: Vec<String>,
}

impl Default for CodeBlockExtractor {
    fn default() -> Self {
        Self::python()
    }
}

impl CodeBlockExtractor {
    /// Create an extractor for the given language tag
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into().to_lowercase(),
            aliases: Vec::new(),
        }
    }

    /// Extractor for Python responses, accepting `python` and `py` tags
    pub fn python() -> Self {
        Self::new("python").with_aliases(vec!["py".to_string()])
    }

    /// Additional tags treated as the target language
    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases.into_iter().map(|a| a.to_lowercase()).collect();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn is_target_tag(&self, tag: &str) -> bool {
        tag == self.language || self.aliases.iter().any(|a| a == tag)
    }

    /// Return the first language-tagged block, else the first untagged block.
    ///
    /// Blocks with only whitespace are skipped. Absence is a normal outcome.
    pub fn extract(&self, text: &str) -> Option<String> {
        let blocks: Vec<FencedBlock> = fenced_blocks(text)
            .into_iter()
            .filter(|b| !b.body.trim().is_empty())
            .collect();

        blocks
            .iter()
            .find(|b| self.is_target_tag(&b.tag))
            .or_else(|| blocks.iter().find(|b| b.tag.is_empty()))
            .map(|b| normalize_body(&b.body))
    }
}

/// Drop leading blank lines and trailing whitespace, keep indentation.
fn normalize_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().skip_while(|l| l.trim().is_empty()).collect();
    lines.join("\n").trim_end().to_string()
}
