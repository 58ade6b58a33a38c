//! TF-IDF vector space vectorizer.
//!
//! Vocabulary build splits each record with the configured pattern, keeps
//! segments whose character length is within
//! `[word_min_characters, word_max_characters]`, lower-cases and lemmatizes
//! them, drops tokens fully matching an exclusion pattern and counts each
//! remaining token at most once per record. Tokens seen in fewer than
//! `word_min_occurrences` records are pruned at the end.
//!
//! Vectorization splits on whitespace and keeps segments of at least
//! `word_min_characters` characters, without lower-casing or lemmatizing.
//! Feature `i` is `(freq_i / distinct_tokens) * ln(total_records / df_i)`.

use ahash::{AHashMap, AHashSet};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{Lemmatizer, LemmatizerKind, RegexTokenizer, Tokenizer, WhitespaceTokenizer};
use crate::codec;
use crate::error::{LexiclassError, Result};
use crate::record::{RawRecord, RawRecordSource};
use crate::vectorizer::{FeatureVectorizer, VectorizedRecord, VectorizerSnapshot};

pub const KIND: &str = "tfidf";

fn default_split_pattern() -> String {
    r"[^\p{L}\p{N}]+".to_string()
}

fn default_min_characters() -> usize {
    1
}

fn default_max_characters() -> usize {
    64
}

fn default_min_occurrences() -> u32 {
    1
}

/// Configuration for [`TfIdfVectorizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TfIdfConfig {
    /// Separator pattern used while building the vocabulary.
    #[serde(default = "default_split_pattern")]
    pub word_split_pattern: String,

    /// Tokens fully matching any of these are never counted.
    #[serde(default)]
    pub word_exclusion_patterns: Vec<String>,

    #[serde(default = "default_min_characters")]
    pub word_min_characters: usize,

    #[serde(default = "default_max_characters")]
    pub word_max_characters: usize,

    #[serde(default = "default_min_occurrences", alias = "word-min-occurrances")]
    pub word_min_occurrences: u32,

    #[serde(default)]
    pub lemmatizer: LemmatizerKind,
}

impl Default for TfIdfConfig {
    fn default() -> Self {
        TfIdfConfig {
            word_split_pattern: default_split_pattern(),
            word_exclusion_patterns: Vec::new(),
            word_min_characters: default_min_characters(),
            word_max_characters: default_max_characters(),
            word_min_occurrences: default_min_occurrences(),
            lemmatizer: LemmatizerKind::default(),
        }
    }
}

impl TfIdfConfig {
    pub fn from_value(value: &Value) -> Result<Self> {
        let config: TfIdfConfig = if value.is_null() {
            TfIdfConfig::default()
        } else {
            serde_json::from_value(value.clone())?
        };

        if config.word_min_characters > config.word_max_characters {
            return Err(LexiclassError::config(format!(
                "word-min-characters ({}) exceeds word-max-characters ({})",
                config.word_min_characters, config.word_max_characters
            )));
        }

        Ok(config)
    }
}

/// A vocabulary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub token: String,

    /// Number of build records containing the token at least once.
    pub document_frequency: u32,
}

#[derive(Serialize, Deserialize)]
struct TfIdfState {
    config: TfIdfConfig,
    labels: Vec<String>,
    words: Vec<Word>,
    total_processed_records: f64,
    built: bool,
}

pub struct TfIdfVectorizer {
    config: TfIdfConfig,
    labels: Vec<String>,
    // Feature index order.
    words: Vec<Word>,
    index: AHashMap<String, usize>,
    total_processed_records: f64,
    built: bool,
    splitter: RegexTokenizer,
    whitespace: WhitespaceTokenizer,
    exclusions: Vec<Regex>,
    lemmatizer: Box<dyn Lemmatizer>,
}

impl std::fmt::Debug for TfIdfVectorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfIdfVectorizer")
            .field("vocabulary_size", &self.words.len())
            .field("total_processed_records", &self.total_processed_records)
            .field("labels", &self.labels)
            .field("lemmatizer", &self.lemmatizer.name())
            .field("built", &self.built)
            .finish()
    }
}

impl TfIdfVectorizer {
    pub fn new(config: TfIdfConfig, labels: Vec<String>) -> Result<Self> {
        let splitter = RegexTokenizer::with_gaps(&config.word_split_pattern)?;
        let exclusions = config
            .word_exclusion_patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    LexiclassError::config(format!("Invalid exclusion pattern '{pattern}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let lemmatizer = config.lemmatizer.build();

        Ok(TfIdfVectorizer {
            config,
            labels,
            words: Vec::new(),
            index: AHashMap::new(),
            total_processed_records: 0.0,
            built: false,
            splitter,
            whitespace: WhitespaceTokenizer::new(),
            exclusions,
            lemmatizer,
        })
    }

    /// Restore from a payload produced by [`FeatureVectorizer::snapshot`].
    pub fn restore(payload: &[u8]) -> Result<Self> {
        let state: TfIdfState = codec::decode_payload(payload)?;

        let mut vectorizer = TfIdfVectorizer::new(state.config, state.labels)?;
        vectorizer.index = index_words(&state.words);
        vectorizer.words = state.words;
        vectorizer.total_processed_records = state.total_processed_records;
        vectorizer.built = state.built;
        Ok(vectorizer)
    }

    pub fn config(&self) -> &TfIdfConfig {
        &self.config
    }

    /// Vocabulary in feature-index order.
    pub fn vocabulary(&self) -> &[Word] {
        &self.words
    }

    pub fn document_frequency(&self, token: &str) -> Option<u32> {
        self.index.get(token).map(|&i| self.words[i].document_frequency)
    }

    pub fn total_processed_records(&self) -> f64 {
        self.total_processed_records
    }

    fn is_excluded(&self, token: &str) -> bool {
        self.exclusions.iter().any(|re| re.is_match(token))
    }

    /// Distinct normalized tokens of one record, in first-occurrence order.
    fn record_words(&self, text: &str) -> Vec<String> {
        let mut seen = AHashSet::new();
        let mut words = Vec::new();

        for segment in self.splitter.tokenize(text) {
            let length = segment.chars().count();
            if length < self.config.word_min_characters || length > self.config.word_max_characters
            {
                continue;
            }

            let word = self.lemmatizer.lemmatize(&segment.to_lowercase());
            if seen.insert(word.clone()) {
                words.push(word);
            }
        }

        words
    }
}

fn index_words(words: &[Word]) -> AHashMap<String, usize> {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| (word.token.clone(), i))
        .collect()
}

impl FeatureVectorizer for TfIdfVectorizer {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn build_vocabulary(&mut self, source: &mut dyn RawRecordSource) -> Result<()> {
        self.words.clear();
        self.index.clear();
        self.total_processed_records = 0.0;
        self.built = false;

        while source.has_more_records() {
            let Some(record) = source.next_record()? else {
                break;
            };
            self.total_processed_records += 1.0;

            for word in self.record_words(&record.text()) {
                if self.is_excluded(&word) {
                    continue;
                }

                match self.index.get(&word) {
                    Some(&i) => self.words[i].document_frequency += 1,
                    None => {
                        self.index.insert(word.clone(), self.words.len());
                        self.words.push(Word {
                            token: word,
                            document_frequency: 1,
                        });
                    }
                }
            }

            log::debug!(
                "pre-processed record {} ({} candidate words)",
                self.total_processed_records,
                self.words.len()
            );
        }

        let min_occurrences = self.config.word_min_occurrences;
        self.words
            .retain(|word| word.document_frequency >= min_occurrences);
        self.index = index_words(&self.words);
        self.built = true;

        log::info!(
            "vocabulary built from {} records: {} words",
            self.total_processed_records,
            self.words.len()
        );
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.built
    }

    fn vectorize(&self, record: &RawRecord) -> Result<VectorizedRecord> {
        if !self.built {
            return Err(LexiclassError::config(
                "vectorize called before the vocabulary was built",
            ));
        }
        if record.labels.len() != self.labels.len() {
            return Err(LexiclassError::data(format!(
                "record has {} labels, expected {}",
                record.labels.len(),
                self.labels.len()
            )));
        }

        let text = record.text();
        let mut frequencies: AHashMap<&str, u32> = AHashMap::new();
        for segment in self.whitespace.tokenize(&text) {
            if segment.chars().count() >= self.config.word_min_characters {
                *frequencies.entry(segment).or_insert(0) += 1;
            }
        }

        let distinct = frequencies.len() as f64;
        let mut features = vec![0.0; self.words.len()];
        for (token, frequency) in &frequencies {
            if let Some(&i) = self.index.get(*token) {
                let idf = (self.total_processed_records
                    / self.words[i].document_frequency as f64)
                    .ln();
                features[i] = (*frequency as f64 / distinct) * idf;
            }
        }

        Ok(VectorizedRecord::new(features, record.labels.clone()))
    }

    fn feature_count(&self) -> usize {
        self.words.len()
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn snapshot(&self) -> Result<VectorizerSnapshot> {
        let state = TfIdfState {
            config: self.config.clone(),
            labels: self.labels.clone(),
            words: self.words.clone(),
            total_processed_records: self.total_processed_records,
            built: self.built,
        };

        Ok(VectorizerSnapshot {
            kind: KIND.to_string(),
            payload: codec::encode_payload(&state)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::memory::MemoryRecordSource;

    fn labels() -> Vec<String> {
        vec!["pos".to_string(), "neg".to_string()]
    }

    fn source(rows: &[(&str, &str)]) -> MemoryRecordSource {
        MemoryRecordSource::from_texts(labels(), rows)
    }

    fn built(config: TfIdfConfig, rows: &[(&str, &str)]) -> TfIdfVectorizer {
        let mut vectorizer = TfIdfVectorizer::new(config, labels()).unwrap();
        vectorizer.build_vocabulary(&mut source(rows)).unwrap();
        vectorizer
    }

    #[test]
    fn test_duplicates_count_once_per_record() {
        let vectorizer = built(
            TfIdfConfig::default(),
            &[("apple apple apple pie", "pos"), ("apple tart", "neg")],
        );

        assert_eq!(vectorizer.document_frequency("apple"), Some(2));
        assert_eq!(vectorizer.document_frequency("pie"), Some(1));
        assert_eq!(vectorizer.total_processed_records(), 2.0);
    }

    #[test]
    fn test_min_occurrences_prunes_rare_words() {
        let config = TfIdfConfig {
            word_min_occurrences: 2,
            ..TfIdfConfig::default()
        };
        let vectorizer = built(
            config,
            &[("red apple", "pos"), ("green apple", "neg"), ("red pear", "pos")],
        );

        let tokens: Vec<&str> = vectorizer
            .vocabulary()
            .iter()
            .map(|w| w.token.as_str())
            .collect();
        assert_eq!(tokens, vec!["red", "apple"]);
        assert_eq!(vectorizer.feature_count(), 2);
    }

    #[test]
    fn test_length_bounds_lowercase_and_exclusions() {
        let config = TfIdfConfig {
            word_min_characters: 3,
            word_max_characters: 5,
            word_exclusion_patterns: vec!["\\d+".to_string(), "the".to_string()],
            ..TfIdfConfig::default()
        };
        let vectorizer = built(
            config,
            &[("The Cat sat on the enormous mat 123 them", "pos")],
        );

        let tokens: Vec<&str> = vectorizer
            .vocabulary()
            .iter()
            .map(|w| w.token.as_str())
            .collect();
        // "them" survives: exclusions are whole-token matches.
        assert_eq!(tokens, vec!["cat", "sat", "mat", "them"]);
    }

    #[test]
    fn test_vectorize_tfidf_values() {
        let vectorizer = built(
            TfIdfConfig::default(),
            &[("alpha beta", "pos"), ("alpha gamma", "neg"), ("delta", "pos")],
        );

        let record = RawRecord::one_hot("beta beta alpha zeta", 0, 2);
        let vector = vectorizer.vectorize(&record).unwrap();

        // distinct tokens: beta, alpha, zeta
        let beta = (2.0 / 3.0) * (3.0f64 / 1.0).ln();
        let alpha = (1.0 / 3.0) * (3.0f64 / 2.0).ln();
        assert_eq!(vector.features.len(), 4);
        assert!((vector.features[0] - alpha).abs() < 1e-12);
        assert!((vector.features[1] - beta).abs() < 1e-12);
        assert_eq!(vector.features[2], 0.0);
        assert_eq!(vector.features[3], 0.0);
        assert_eq!(vector.labels, vec![1.0, 0.0]);
    }

    #[test]
    fn test_vectorize_does_not_lowercase() {
        let vectorizer = built(TfIdfConfig::default(), &[("word", "pos"), ("other", "neg")]);

        let vector = vectorizer
            .vectorize(&RawRecord::one_hot("WORD", 0, 2))
            .unwrap();
        assert!(vector.features.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_vectorize_keeps_no_break_space_inside_tokens() {
        let vectorizer = built(TfIdfConfig::default(), &[("alpha beta", "pos"), ("alpha gamma", "neg")]);

        let vector = vectorizer
            .vectorize(&RawRecord::one_hot("alpha\u{00A0}beta beta", 0, 2))
            .unwrap();

        // tokens: "alpha\u{00A0}beta", "beta"
        assert_eq!(vector.features[0], 0.0);
        assert!((vector.features[1] - 0.5 * 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_vectorize_is_pure() {
        let vectorizer = built(
            TfIdfConfig::default(),
            &[("one two three", "pos"), ("two three four", "neg")],
        );
        let record = RawRecord::one_hot("three two two one", 1, 2);

        let first = vectorizer.vectorize(&record).unwrap();
        let second = vectorizer.vectorize(&record).unwrap();
        assert_eq!(
            first.features.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            second.features.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_vectorize_before_build_fails() {
        let vectorizer = TfIdfVectorizer::new(TfIdfConfig::default(), labels()).unwrap();
        let err = vectorizer
            .vectorize(&RawRecord::one_hot("x", 0, 2))
            .unwrap_err();
        assert!(matches!(err, LexiclassError::Config(_)));
    }

    #[test]
    fn test_empty_stream_yields_empty_vocabulary() {
        let vectorizer = built(TfIdfConfig::default(), &[]);
        assert!(vectorizer.is_built());
        assert_eq!(vectorizer.feature_count(), 0);

        let vector = vectorizer
            .vectorize(&RawRecord::one_hot("anything", 0, 2))
            .unwrap();
        assert!(vector.features.is_empty());
    }

    #[test]
    fn test_snapshot_restore() {
        let vectorizer = built(
            TfIdfConfig {
                lemmatizer: LemmatizerKind::Suffix,
                ..TfIdfConfig::default()
            },
            &[("running dogs", "pos"), ("dogs barking", "neg")],
        );
        let snapshot = vectorizer.snapshot().unwrap();
        assert_eq!(snapshot.kind, KIND);

        let restored = TfIdfVectorizer::restore(&snapshot.payload).unwrap();
        assert_eq!(restored.vocabulary(), vectorizer.vocabulary());
        assert_eq!(restored.labels(), vectorizer.labels());
        assert_eq!(restored.config().lemmatizer, LemmatizerKind::Suffix);

        let record = RawRecord::one_hot("dog runn dog", 0, 2);
        assert_eq!(
            restored.vectorize(&record).unwrap(),
            vectorizer.vectorize(&record).unwrap()
        );
    }

    #[test]
    fn test_config_from_value() {
        let value = serde_json::json!({
            "word-split-pattern": "\\s+",
            "word-min-characters": 2,
            "word-max-characters": 20,
            "word-min-occurrances": 3,
        });
        let config = TfIdfConfig::from_value(&value).unwrap();
        assert_eq!(config.word_min_occurrences, 3);
        assert_eq!(config.word_split_pattern, "\\s+");

        let bad = serde_json::json!({"word-min-characters": 9, "word-max-characters": 2});
        assert!(TfIdfConfig::from_value(&bad).is_err());

        assert_eq!(
            TfIdfConfig::from_value(&Value::Null).unwrap(),
            TfIdfConfig::default()
        );
    }

    #[test]
    fn test_invalid_patterns_are_config_errors() {
        let config = TfIdfConfig {
            word_exclusion_patterns: vec!["[".to_string()],
            ..TfIdfConfig::default()
        };
        assert!(matches!(
            TfIdfVectorizer::new(config, labels()),
            Err(LexiclassError::Config(_))
        ));
    }
}
