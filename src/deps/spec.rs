//! Dependency declaration parsing.
//!
//! Generated code declares what it needs in comment lines such as
//!
//! ```text
//! # requires: pandas, matplotlib
//! # pip install requests beautifulsoup4  # for scraping
//! ```
//!
//! Each declared name becomes one `DependencySpec`, deduplicated across lines.

use std::collections::HashSet;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

/// Marker lines: `# requires:`, `# requirements:`, `# dependencies:`, `# deps:` or `# pip install`.
/// Group 1 is the word marker, group 2 the colon after `pip install`, group 3 the list.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*#[ \t]*(?:(requires|requirements|dependencies|deps)[ \t]*:|pip[ \t]+install\b[ \t]*(:)?)(.*)$",
    )
    .expect("marker regex is valid")
});

/// Whitespace around a version comparison operator, so `pandas >= 2.0` stays one token
static OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(===|==|>=|<=|!=|~=|<|>)\s*").expect("operator regex is valid"));

/// Valid distribution name after normalization
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("name regex is valid"));

/// Distributions whose import name differs from the package name
const IMPORT_ALIASES: &[(&str, &str)] = &[
    ("beautifulsoup4", "bs4"),
    ("scikit-learn", "sklearn"),
    ("pillow", "PIL"),
    ("opencv-python", "cv2"),
    ("pyyaml", "yaml"),
    ("python-dateutil", "dateutil"),
    ("google-generativeai", "google.generativeai"),
];

/// One declared package requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Normalized name: lowercase, trimmed, version specifier removed
    pub package_name: String,
    /// What gets passed to the installer (keeps any version specifier)
    pub requirement: String,
}

impl DependencySpec {
    /// Build a spec from a raw declaration token; None if it is not a package name.
    pub fn parse(token: &str) -> Option<Self> {
        let requirement = token.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
        if requirement.is_empty() || requirement.starts_with('-') {
            return None;
        }

        let package_name: String = requirement
            .chars()
            .take_while(|c| !matches!(c, '<' | '>' | '=' | '!' | '~' | ';' | '[' | '@'))
            .collect::<String>()
            .trim()
            .to_string();

        // A bare version such as `2.0` is not a package
        if !NAME_RE.is_match(&package_name) || !package_name.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        Some(Self {
            package_name,
            requirement,
        })
    }

    /// Module name used for the "already importable" probe
    pub fn import_name(&self) -> String {
        IMPORT_ALIASES
            .iter()
            .find(|(pkg, _)| *pkg == self.package_name)
            .map(|(_, module)| module.to_string())
            .unwrap_or_else(|| self.package_name.replace('-', "_"))
    }
}

/// Extract every declared dependency from `code`, first-seen order, no duplicates.
pub fn parse_declarations(code: &str) -> Vec<DependencySpec> {
    let mut seen = HashSet::new();
    let mut specs = Vec::new();

    for caps in MARKER_RE.captures_iter(code) {
        let Some(list) = caps.get(3) else { continue };
        // Anything after a further '#' is an inline comment
        let list = list.as_str().split('#').next().unwrap_or("");
        let list = OPERATOR_RE.replace_all(list, "$1");

        let tokens: Vec<&str> = list
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        // `# pip install` without a colon is often prose; take it only when it reads as a command line
        let bare_pip = caps.get(1).is_none() && caps.get(2).is_none();
        let command_like = |t: &&str| {
            t.starts_with(['-', '<', '>', '=', '!', '~']) || DependencySpec::parse(t).is_some()
        };
        if bare_pip && !tokens.iter().all(command_like) {
            debug!("Ignoring pip install comment that is not a package list: {}", list.trim());
            continue;
        }

        for token in tokens {
            if let Some(spec) = DependencySpec::parse(token) {
                if seen.insert(spec.package_name.clone()) {
                    specs.push(spec);
                }
            }
        }
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(code: &str) -> Vec<String> {
        parse_declarations(code).into_iter().map(|s| s.package_name).collect()
    }

    #[test]
    fn test_parse_requires_line() {
        let code = "# requires: pandas, numpy\nimport pandas\n";
        assert_eq!(names(code), vec!["pandas", "numpy"]);
    }

    #[test]
    fn test_parse_pip_install_line() {
        let code = "# pip install requests beautifulsoup4\n";
        assert_eq!(names(code), vec!["requests", "beautifulsoup4"]);
    }

    #[test]
    fn test_parse_mixed_delimiters() {
        let code = "# dependencies: pandas,numpy  matplotlib ,\tseaborn\n";
        assert_eq!(names(code), vec!["pandas", "numpy", "matplotlib", "seaborn"]);
    }

    #[test]
    fn test_parse_strips_inline_comment() {
        let code = "# requires: requests  # needed for the HTTP call\n";
        assert_eq!(names(code), vec!["requests"]);
    }

    #[test]
    fn test_parse_dedup_case_and_whitespace() {
        let code = "# requires: Pandas, numpy\n# deps:   pandas  \n# REQUIRES: PANDAS\n";
        assert_eq!(names(code), vec!["pandas", "numpy"]);
    }

    #[test]
    fn test_parse_no_declarations() {
        assert!(parse_declarations("import os\nprint(os.getcwd())\n").is_empty());
        assert!(parse_declarations("").is_empty());
    }

    #[test]
    fn test_plain_comment_is_not_a_marker() {
        let code = "# this requires a working network connection\nprint(1)\n";
        assert!(parse_declarations(code).is_empty());
    }

    #[test]
    fn test_version_specifier_kept_in_requirement() {
        let specs = parse_declarations("# requires: pandas>=2.0, requests==2.31.0\n");
        assert_eq!(specs[0].package_name, "pandas");
        assert_eq!(specs[0].requirement, "pandas>=2.0");
        assert_eq!(specs[1].package_name, "requests");
        assert_eq!(specs[1].requirement, "requests==2.31.0");
    }

    #[test]
    fn test_flags_and_garbage_are_dropped() {
        let code = "# pip install: -q --upgrade numpy ... \n";
        assert_eq!(names(code), vec!["numpy"]);

        let code = "# pip install -q --upgrade numpy\n";
        assert_eq!(names(code), vec!["numpy"]);
    }

    #[test]
    fn test_spaced_version_specifier_stays_with_package() {
        let specs = parse_declarations("# requires: pandas >= 2.0, numpy\n");
        let got: Vec<(&str, &str)> = specs
            .iter()
            .map(|s| (s.package_name.as_str(), s.requirement.as_str()))
            .collect();
        assert_eq!(got, vec![("pandas", "pandas>=2.0"), ("numpy", "numpy")]);

        let code = "# pip install requests == 2.31.0 rich\n";
        assert_eq!(names(code), vec!["requests", "rich"]);

        let specs = parse_declarations("# pip install pandas>=2.0,<3\n");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].requirement, "pandas>=2.0");
    }

    #[test]
    fn test_bare_version_is_not_a_package() {
        assert!(DependencySpec::parse("2.0").is_none());
        assert!(DependencySpec::parse("3.11.4").is_none());
        assert_eq!(names("# requires: numpy, 1.26\n"), vec!["numpy"]);
    }

    #[test]
    fn test_pip_install_prose_is_ignored() {
        assert!(parse_declarations("# pip install these packages first: pandas\n").is_empty());
        assert!(parse_declarations("# pip install whatever you need (see the README)\n").is_empty());
        // the colon form keeps its list
        assert_eq!(names("# pip install: pandas\n"), vec!["pandas"]);
    }

    #[test]
    fn test_indented_marker() {
        let code = "def main():\n    # requires: tabulate\n    pass\n";
        assert_eq!(names(code), vec!["tabulate"]);
    }

    #[test]
    fn test_import_name_aliases() {
        let spec = DependencySpec::parse("beautifulsoup4").unwrap();
        assert_eq!(spec.import_name(), "bs4");

        let spec = DependencySpec::parse("scikit-learn").unwrap();
        assert_eq!(spec.import_name(), "sklearn");

        let spec = DependencySpec::parse("typing-extensions").unwrap();
        assert_eq!(spec.import_name(), "typing_extensions");
    }

    #[test]
    fn test_spec_parse_rejects_empty() {
        assert!(DependencySpec::parse("").is_none());
        assert!(DependencySpec::parse("  ").is_none());
        assert!(DependencySpec::parse("-r").is_none());
    }
}
