//! BM25 Inverted Index.
//!
//! Provides an inverted index optimized for BM25 scoring:
//! - Term → document postings with term frequencies
//! - Pre-computed document lengths and average length
//! - Query-time scoring with deterministic ordering

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use super::scorer::{bm25_term_score, idf, Bm25Params};
use super::tokenizer::{Tokenizer, TokenizerConfig};
use super::{Bm25Config, Bm25SearchResult};

/// Statistics for a single document in the index.
#[derive(Debug, Clone)]
struct DocumentStats {
    /// Number of tokens in the document.
    length: usize,
    /// Original document ID (chunk id).
    doc_id: String,
}

/// Posting entry: document index and term frequency.
#[derive(Debug, Clone)]
struct Posting {
    doc_idx: usize,
    term_freq: usize,
}

/// BM25 Inverted Index.
pub struct Bm25Index {
    params: Bm25Params,
    tokenizer: Tokenizer,
    /// Term → (document frequency, postings).
    inverted_index: HashMap<String, (usize, Vec<Posting>)>,
    documents: Vec<DocumentStats>,
    avg_doc_len: f32,
    total_tokens: usize,
}

impl std::fmt::Debug for Bm25Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25Index")
            .field("documents", &self.documents.len())
            .field("vocabulary", &self.inverted_index.len())
            .finish()
    }
}

impl Bm25Index {
    /// Create a new empty BM25 index.
    pub fn new(config: &Bm25Config) -> Self {
        Self {
            params: Bm25Params {
                k1: config.k1,
                b: config.b,
            },
            tokenizer: Tokenizer::new(TokenizerConfig {
                remove_stopwords: config.remove_stopwords,
                min_token_length: config.min_token_length,
                bigrams: config.bigrams,
            }),
            inverted_index: HashMap::new(),
            documents: Vec::new(),
            avg_doc_len: 0.0,
            total_tokens: 0,
        }
    }

    /// Build an index from (doc_id, text) pairs, tokenizing in parallel.
    pub fn build<S1, S2>(config: &Bm25Config, documents: Vec<(S1, S2)>) -> Self
    where
        S1: Into<String> + Send,
        S2: AsRef<str> + Send + Sync,
    {
        let mut index = Self::new(config);

        let tokenized: Vec<(String, Vec<(String, usize)>, usize)> = documents
            .into_par_iter()
            .map(|(doc_id, text)| {
                let tf = index.tokenizer.tokenize_with_tf(text.as_ref());
                let len: usize = tf.iter().map(|(_, n)| n).sum();
                (doc_id.into(), tf, len)
            })
            .collect();

        for (doc_id, term_freqs, doc_len) in tokenized {
            index.insert(doc_id, term_freqs, doc_len);
        }

        debug!(
            "Built BM25 index: {} documents, {} terms",
            index.documents.len(),
            index.inverted_index.len()
        );
        index
    }

    fn insert(&mut self, doc_id: String, term_freqs: Vec<(String, usize)>, doc_len: usize) {
        let doc_idx = self.documents.len();
        self.documents.push(DocumentStats {
            length: doc_len,
            doc_id,
        });

        for (term, tf) in term_freqs {
            let entry = self.inverted_index.entry(term).or_insert((0, Vec::new()));
            entry.0 += 1;
            entry.1.push(Posting {
                doc_idx,
                term_freq: tf,
            });
        }

        self.total_tokens += doc_len;
        self.avg_doc_len = self.total_tokens as f32 / self.documents.len() as f32;
    }

    /// Search the index for documents matching the query.
    ///
    /// Results are sorted by BM25 score descending. Equal scores keep
    /// insertion order, so identical inputs always give identical output.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Bm25SearchResult> {
        if self.documents.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut query_tokens = self.tokenizer.tokenize(query);
        query_tokens.sort();
        query_tokens.dedup();

        let num_docs = self.documents.len();
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in &query_tokens {
            let Some((df, postings)) = self.inverted_index.get(term) else {
                continue;
            };
            let idf_val = idf(num_docs, *df);

            for posting in postings {
                let doc_stats = &self.documents[posting.doc_idx];
                let term_score = bm25_term_score(
                    posting.term_freq,
                    doc_stats.length,
                    self.avg_doc_len,
                    idf_val,
                    &self.params,
                );
                *scores.entry(posting.doc_idx).or_insert(0.0) += term_score;
            }
        }

        let mut scored_docs: Vec<(usize, f32)> = scores.into_iter().collect();
        scored_docs.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        scored_docs
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(rank, (doc_idx, score))| Bm25SearchResult {
                doc_id: self.documents[doc_idx].doc_id.clone(),
                score,
                rank: rank + 1,
            })
            .collect()
    }

    /// Get the number of documents in the index.
    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    /// Get the number of unique terms in the vocabulary.
    pub fn vocabulary_size(&self) -> usize {
        self.inverted_index.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
