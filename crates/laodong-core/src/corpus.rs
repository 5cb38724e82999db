//! Read-only chunk corpus.
//!
//! The corpus file is JSONL, one chunk per line:
//!
//! ```json
//! {"id": "blld-139-1", "provision": {"id": "blld-139", "sourceCode": "45/2019/QH14", "article": "139"}, "text": "...", "vector": [0.1, 0.2]}
//! ```
//!
//! Chunks of the same provision share one [`Provision`] allocation. The corpus
//! serves passage text and citation metadata ([`ChunkLookup`]) and seeds the
//! in-process BM25 and vector indexes at startup.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use laodong_db::vector::VectorRecord;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::capabilities::ChunkLookup;
use crate::errors::{LaodongError, LaodongResult};
use crate::types::{Chunk, ChunkId, Provision};

/// One corpus line as stored on disk.
#[derive(Debug, Deserialize)]
struct ChunkRecord {
    id: String,
    provision: Provision,
    #[serde(default)]
    text: String,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

/// In-memory chunk and provision catalog.
#[derive(Debug, Default)]
pub struct Corpus {
    path: Option<PathBuf>,
    chunks: Vec<Arc<Chunk>>,
    by_id: HashMap<ChunkId, usize>,
    vectors: Vec<Option<Vec<f32>>>,
    provisions: usize,
}

impl Corpus {
    /// Load a JSONL corpus file.
    ///
    /// Blank lines are skipped. Duplicate chunk ids keep their first line.
    ///
    /// # Errors
    ///
    /// - [`LaodongError::CorpusIo`] if the file cannot be read
    /// - [`LaodongError::CorpusParse`] on the first malformed line
    /// - [`LaodongError::CorpusEmpty`] if no chunk was found
    pub fn load(path: &Path) -> LaodongResult<Self> {
        let file = File::open(path).map_err(|e| LaodongError::CorpusIo {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut corpus = Self {
            path: Some(path.to_path_buf()),
            ..Default::default()
        };
        let mut provisions: HashMap<String, Arc<Provision>> = HashMap::new();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| LaodongError::CorpusIo {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let record: ChunkRecord =
                serde_json::from_str(&line).map_err(|e| LaodongError::CorpusParse {
                    path: path.to_path_buf(),
                    message: format!("line {}: {}", line_no + 1, e),
                })?;
            corpus.insert(record, &mut provisions);
        }

        if corpus.is_empty() {
            return Err(LaodongError::CorpusEmpty {
                path: path.to_path_buf(),
            });
        }

        corpus.provisions = provisions.len();
        info!(
            "Loaded corpus {}: {} chunks, {} provisions, vectors: {}",
            path.display(),
            corpus.chunks.len(),
            corpus.provisions,
            corpus.has_vectors()
        );
        Ok(corpus)
    }

    /// Build a corpus from chunks already in memory.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let mut corpus = Self::default();
        let mut provision_ids = std::collections::HashSet::new();
        for chunk in chunks {
            if corpus.by_id.contains_key(&chunk.id) {
                continue;
            }
            provision_ids.insert(chunk.provision.id.clone());
            corpus.by_id.insert(chunk.id.clone(), corpus.chunks.len());
            corpus.chunks.push(Arc::new(chunk));
            corpus.vectors.push(None);
        }
        corpus.provisions = provision_ids.len();
        corpus
    }

    fn insert(&mut self, record: ChunkRecord, provisions: &mut HashMap<String, Arc<Provision>>) {
        let id = ChunkId::new(record.id);
        if self.by_id.contains_key(&id) {
            warn!("Duplicate chunk id `{}` in corpus, keeping first", id);
            return;
        }

        let provision = provisions
            .entry(record.provision.id.clone())
            .or_insert_with(|| Arc::new(record.provision))
            .clone();

        let text = if record.text.is_empty() {
            provision.text.clone()
        } else {
            record.text
        };

        self.by_id.insert(id.clone(), self.chunks.len());
        self.chunks.push(Arc::new(Chunk {
            id,
            provision,
            text,
        }));
        self.vectors.push(record.vector);
    }

    /// Source file, when loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.iter()
    }

    /// Number of distinct provisions.
    pub fn provision_count(&self) -> usize {
        self.provisions
    }

    /// Whether any chunk carries a precomputed vector.
    pub fn has_vectors(&self) -> bool {
        self.vectors.iter().any(Option::is_some)
    }

    /// Vectors for the in-memory dense index. Chunks without a vector are skipped.
    pub fn vector_records(&self) -> Vec<VectorRecord> {
        let records: Vec<VectorRecord> = self
            .chunks
            .iter()
            .zip(&self.vectors)
            .filter_map(|(chunk, vector)| {
                vector
                    .as_ref()
                    .map(|v| VectorRecord::new(chunk.id.as_str(), v.clone()))
            })
            .collect();

        let missing = self.chunks.len() - records.len();
        if missing > 0 && !records.is_empty() {
            warn!("{} chunks have no vector and are invisible to dense search", missing);
        }
        records
    }

    /// (chunk id, text) pairs for building the BM25 index.
    pub fn sparse_documents(&self) -> Vec<(String, String)> {
        debug!("Preparing {} documents for BM25", self.chunks.len());
        self.chunks
            .iter()
            .map(|c| (c.id.to_string(), c.text.clone()))
            .collect()
    }
}

impl ChunkLookup for Corpus {
    fn chunk(&self, id: &str) -> Option<Arc<Chunk>> {
        self.by_id.get(id).map(|&idx| Arc::clone(&self.chunks[idx]))
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }
}
