//! Citation list for a grounded answer.
//!
//! One citation per provision, keyed by (source code, article, chapter), so
//! two chunks of the same article are cited once at the better score.

use std::collections::HashMap;

use crate::capabilities::ChunkLookup;
use crate::types::{Citation, RerankedResult};

/// Build citations from the final passage set, best score first.
///
/// Chunks missing from the lookup are skipped. Equal scores keep passage order.
pub fn build_citations(results: &[RerankedResult], chunks: &dyn ChunkLookup) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::with_capacity(results.len());
    let mut by_key: HashMap<(String, String, Option<String>), usize> = HashMap::new();

    for result in results {
        let Some(chunk) = chunks.chunk(result.chunk_id.as_str()) else {
            continue;
        };
        let provision = &chunk.provision;
        let key = (
            provision.source_code.clone(),
            provision.article.clone(),
            provision.chapter.clone(),
        );

        match by_key.get(&key) {
            Some(&idx) => {
                if result.score > citations[idx].score {
                    citations[idx].score = result.score;
                    citations[idx].chunk_id = result.chunk_id.clone();
                }
            }
            None => {
                by_key.insert(key, citations.len());
                citations.push(Citation {
                    provision_id: provision.id.clone(),
                    source_code: provision.source_code.clone(),
                    article: provision.article.clone(),
                    article_title: provision.article_title.clone(),
                    chapter: provision.chapter.clone(),
                    chunk_id: result.chunk_id.clone(),
                    score: result.score,
                });
            }
        }
    }

    citations.sort_by(|a, b| b.score.total_cmp(&a.score));
    citations
}
