//! Tokenizers.

use std::sync::Arc;

use regex::Regex;

use crate::error::{LexiclassError, Result};

/// Splits text into segments borrowed from the input.
pub trait Tokenizer: Send + Sync {
    /// Split `text` into segments, in order of appearance.
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str>;

    /// Name of this tokenizer.
    fn name(&self) -> &'static str;
}

/// Regex tokenizer.
///
/// In gaps mode the pattern describes separators and the text between
/// matches is emitted; otherwise the matches themselves are emitted.
/// Empty segments are dropped in both modes.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    pattern: Arc<Regex>,
    gaps: bool,
}

impl RegexTokenizer {
    /// Emit every match of `pattern`.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        Ok(RegexTokenizer {
            pattern: Arc::new(compile(pattern)?),
            gaps: false,
        })
    }

    /// Split on every match of `pattern`.
    pub fn with_gaps(pattern: &str) -> Result<Self> {
        Ok(RegexTokenizer {
            pattern: Arc::new(compile(pattern)?),
            gaps: true,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn gaps(&self) -> bool {
        self.gaps
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| LexiclassError::config(format!("Invalid regex pattern '{pattern}': {e}")))
}

impl Tokenizer for RegexTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if self.gaps {
            self.pattern
                .split(text)
                .filter(|segment| !segment.is_empty())
                .collect()
        } else {
            self.pattern
                .find_iter(text)
                .map(|m| m.as_str())
                .filter(|segment| !segment.is_empty())
                .collect()
        }
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

/// Splits on runs of ASCII whitespace, vertical tab included.
///
/// Other Unicode spaces such as U+00A0 stay inside tokens.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    pub fn new() -> Self {
        WhitespaceTokenizer
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split(|c: char| matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r'))
            .filter(|token| !token.is_empty())
            .collect()
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}
