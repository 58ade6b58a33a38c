//! Text analysis used by feature pipelines.
//!
//! Tokenizers split record text into segments and lemmatizers normalize a
//! lower-cased segment before it enters the vocabulary.

pub mod lemmatizer;
pub mod tokenizer;

pub use lemmatizer::{IdentityLemmatizer, Lemmatizer, LemmatizerKind, SuffixLemmatizer};
pub use tokenizer::{RegexTokenizer, Tokenizer, WhitespaceTokenizer};
