//! Marker pattern compilation and line matching

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::model::MarkerKind;

/// A compiled marker matcher tagged with the kind it reports
#[derive(Debug, Clone)]
pub struct MarkerPattern {
    pub matcher: Regex,
    pub kind: MarkerKind,
}

/// One pattern hit on one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub kind: MarkerKind,
    /// Whole text matched by the pattern
    pub text: String,
    /// Text after the marker, still containing any due-date token
    pub description: String,
}

/// Comment openers recognised in front of a built-in marker
const COMMENT_OPENERS: &str = r"(?://|#|<!--)";

fn builtin_pattern(kind: MarkerKind) -> MarkerPattern {
    let source = format!(r"{}\s*({})\b\s*:?\s*(.*)", COMMENT_OPENERS, kind.keyword());
    // Built from constant fragments, so this cannot fail
    let matcher = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|e| unreachable!("built-in marker pattern {source} is invalid: {e}"));
    MarkerPattern { matcher, kind }
}

/// Default matchers for every built-in marker keyword
pub fn default_patterns() -> Vec<MarkerPattern> {
    MarkerKind::BUILTIN.iter().copied().map(builtin_pattern).collect()
}

/// Compile user-supplied pattern sources, skipping invalid ones
///
/// Each source is compiled case-insensitively and tagged [`MarkerKind::Custom`].
/// If it has capture groups, group 1 names the marker and group 2 the description.
pub fn compile_custom_patterns(sources: &[String]) -> Vec<MarkerPattern> {
    sources
        .iter()
        .filter_map(|source| match RegexBuilder::new(source).case_insensitive(true).build() {
            Ok(matcher) => Some(MarkerPattern {
                matcher,
                kind: MarkerKind::Custom,
            }),
            Err(e) => {
                warn!(pattern = %source, error = %e, "Invalid custom TODO pattern, skipping");
                None
            }
        })
        .collect()
}

/// The active pattern set: defaults followed by compiled custom patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<MarkerPattern>,
}

impl PatternSet {
    pub fn new(custom_sources: &[String]) -> Self {
        let mut patterns = default_patterns();
        let custom = compile_custom_patterns(custom_sources);
        debug!(custom = custom.len(), "PatternSet::new: compiled patterns");
        patterns.extend(custom);
        Self { patterns }
    }

    /// Recompile after a configuration change
    pub fn rebuild(&mut self, custom_sources: &[String]) {
        *self = Self::new(custom_sources);
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Evaluate every pattern against `line`, keeping the first hit of each
    pub fn match_line(&self, line: &str) -> Vec<LineMatch> {
        self.patterns.iter().filter_map(|p| p.first_match(line)).collect()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl MarkerPattern {
    /// First match of this pattern on `line`, if any
    pub fn first_match(&self, line: &str) -> Option<LineMatch> {
        let caps = self.matcher.captures(line)?;
        let whole = caps.get(0)?.as_str();

        let kind = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<MarkerKind>().ok())
            .unwrap_or(self.kind);

        let description = caps
            .get(2)
            .map(|m| strip_comment_closer(m.as_str()).trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| whole.to_string());

        Some(LineMatch {
            kind,
            text: whole.to_string(),
            description,
        })
    }
}

fn strip_comment_closer(text: &str) -> &str {
    let trimmed = text.trim_end();
    trimmed.strip_suffix("-->").unwrap_or(trimmed)
}
