//! Lemmatizers reduce a lower-cased token to a normalized form.

use serde::{Deserialize, Serialize};

pub trait Lemmatizer: Send + Sync {
    fn lemmatize(&self, word: &str) -> String;

    fn name(&self) -> &'static str;
}

/// Which lemmatizer a pipeline uses. Persisted with the pipeline snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LemmatizerKind {
    #[default]
    Identity,
    Suffix,
}

impl LemmatizerKind {
    pub fn build(self) -> Box<dyn Lemmatizer> {
        match self {
            LemmatizerKind::Identity => Box::new(IdentityLemmatizer),
            LemmatizerKind::Suffix => Box::new(SuffixLemmatizer::new()),
        }
    }
}

/// Returns the word unchanged.
#[derive(Debug, Clone, Default)]
pub struct IdentityLemmatizer;

impl Lemmatizer for IdentityLemmatizer {
    fn lemmatize(&self, word: &str) -> String {
        word.to_string()
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Strips the longest matching English inflection suffix.
///
/// Words of three characters or fewer are kept, and at least three
/// characters always remain.
#[derive(Debug, Clone)]
pub struct SuffixLemmatizer {
    // Longest first.
    suffixes: Vec<&'static str>,
}

impl SuffixLemmatizer {
    pub fn new() -> Self {
        let mut suffixes = vec![
            "ing", "ed", "es", "ies", "ied", "s", "ly", "ment", "ness", "tion", "sion",
        ];
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));

        SuffixLemmatizer { suffixes }
    }
}

impl Default for SuffixLemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lemmatizer for SuffixLemmatizer {
    fn lemmatize(&self, word: &str) -> String {
        let chars = word.chars().count();
        if chars <= 3 {
            return word.to_string();
        }

        for suffix in &self.suffixes {
            if chars >= suffix.len() + 3 && word.ends_with(suffix) {
                return word[..word.len() - suffix.len()].to_string();
            }
        }

        word.to_string()
    }

    fn name(&self) -> &'static str {
        "suffix"
    }
}
