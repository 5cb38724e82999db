//! Unicode-aware tokenizer for Vietnamese legal text.
//!
//! Provides text preprocessing for BM25 indexing:
//! - Unicode word segmentation (one token per syllable)
//! - Case folding (lowercasing)
//! - Stop word removal
//! - Optional syllable bigrams (`lao_động`) to approximate compound words
//!
//! No stemming: Vietnamese is isolating, and syllables carry no inflection.
//! Numbers are kept because article references ("Điều 139") and amounts are
//! among the strongest lexical signals in this corpus.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Tokenizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Remove common stop words.
    pub remove_stopwords: bool,
    /// Minimum token length, in characters.
    pub min_token_length: usize,
    /// Emit adjacent-syllable bigrams in addition to syllables.
    pub bigrams: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            remove_stopwords: true,
            min_token_length: 1,
            bigrams: true,
        }
    }
}

/// Syllable tokenizer with optional bigrams.
pub struct Tokenizer {
    config: TokenizerConfig,
    stopwords: HashSet<&'static str>,
}

impl Tokenizer {
    /// Create a new tokenizer with the given configuration.
    pub fn new(config: TokenizerConfig) -> Self {
        Self {
            config,
            stopwords: default_stopwords(),
        }
    }

    /// Tokenize text into processed syllables, followed by bigrams if enabled.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let syllables: Vec<String> = text
            .unicode_words()
            .filter_map(|word| self.process_token(word))
            .collect();

        if !self.config.bigrams || syllables.len() < 2 {
            return syllables;
        }

        let bigrams: Vec<String> = syllables
            .windows(2)
            .map(|pair| format!("{}_{}", pair[0], pair[1]))
            .collect();

        let mut tokens = syllables;
        tokens.extend(bigrams);
        tokens
    }

    /// Tokenize and return term frequencies.
    pub fn tokenize_with_tf(&self, text: &str) -> Vec<(String, usize)> {
        let mut tf: HashMap<String, usize> = HashMap::new();
        for token in self.tokenize(text) {
            *tf.entry(token).or_insert(0) += 1;
        }

        tf.into_iter().collect()
    }

    /// Whether a lowercase token is a stop word.
    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Process a single token through the pipeline.
    fn process_token(&self, word: &str) -> Option<String> {
        let lower = word.to_lowercase();

        if !lower.chars().any(|c| c.is_alphanumeric()) {
            return None;
        }

        if lower.chars().count() < self.config.min_token_length {
            return None;
        }

        if self.config.remove_stopwords && self.stopwords.contains(lower.as_str()) {
            return None;
        }

        Some(lower)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

/// Vietnamese function words that carry no retrieval signal.
///
/// Question particles ("không", "gì") are included: users phrase questions
/// with them, statutes almost never do.
fn default_stopwords() -> HashSet<&'static str> {
    [
        // Conjunctions
        "và", "hoặc", "nhưng", "mà", "thì", "nên", "vì", "bởi", "nếu", "hay",
        // Prepositions
        "của", "cho", "với", "trong", "ngoài", "trên", "dưới", "từ", "đến", "tại", "về", "theo",
        "ở", "vào", "ra", "bằng",
        // Determiners and classifiers
        "các", "những", "mọi", "mỗi", "một", "này", "đó", "kia", "ấy", "nào", "cái", "chiếc",
        // Copula and auxiliaries
        "là", "có", "được", "bị", "đã", "đang", "sẽ", "vẫn", "cũng", "rất", "lại", "thế", "vậy",
        // Pronouns
        "tôi", "bạn", "em", "anh", "chị", "mình", "họ", "chúng", "ta",
        // Question and discourse particles
        "gì", "sao", "ạ", "à", "nhé", "nhỉ", "không", "chưa", "hả",
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syllables_only() -> Tokenizer {
        Tokenizer::new(TokenizerConfig {
            bigrams: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_basic_tokenization() {
        let tokens = syllables_only().tokenize("Người lao động nghỉ thai sản");
        assert_eq!(tokens, vec!["người", "lao", "động", "nghỉ", "thai", "sản"]);
    }

    #[test]
    fn test_stopword_removal() {
        let tokens = syllables_only().tokenize("Quyền của người lao động và người sử dụng lao động");
        assert!(!tokens.iter().any(|t| t == "của" || t == "và"));
        assert!(tokens.contains(&"quyền".to_string()));
    }

    #[test]
    fn test_numbers_kept() {
        let tokens = syllables_only().tokenize("Điều 139 Bộ luật 45/2019/QH14");
        assert!(tokens.contains(&"139".to_string()));
        assert!(tokens.contains(&"2019".to_string()));
        assert!(tokens.contains(&"qh14".to_string()));
    }

    #[test]
    fn test_bigrams() {
        let tokens = Tokenizer::default().tokenize("trợ cấp thôi việc");
        assert!(tokens.contains(&"trợ_cấp".to_string()));
        assert!(tokens.contains(&"cấp_thôi".to_string()));
        assert!(tokens.contains(&"thôi_việc".to_string()));
        assert_eq!(tokens.len(), 4 + 3);
    }

    #[test]
    fn test_punctuation_ignored() {
        let tokens = syllables_only().tokenize("Khoản 2, Điều 46: ...");
        assert_eq!(tokens, vec!["khoản", "2", "điều", "46"]);
    }

    #[test]
    fn test_stopwords_disabled() {
        let tokenizer = Tokenizer::new(TokenizerConfig {
            remove_stopwords: false,
            bigrams: false,
            ..Default::default()
        });
        assert!(tokenizer.tokenize("quyền và nghĩa vụ").contains(&"và".to_string()));
    }

    #[test]
    fn test_term_frequencies() {
        let tf: HashMap<_, _> = syllables_only()
            .tokenize_with_tf("lương lương thưởng lương")
            .into_iter()
            .collect();
        assert_eq!(tf.get("lương"), Some(&3));
        assert_eq!(tf.get("thưởng"), Some(&1));
    }
}
