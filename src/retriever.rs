//! Retrieval: search, filter, dedup, rank, and context assembly.
//!
//! The retriever overfetches from the vector store, drops candidates below
//! the relevance floor, collapses near-duplicate chunks from the same
//! source, truncates to the configured top-K, and assembles a bounded
//! context string with citation markers.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::AssistantConfig;
use crate::document::{RetrievalResult, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::vectorstore::VectorStore;

/// Executes similarity search and turns raw candidates into a ranked,
/// deduplicated, bounded [`RetrievalResult`].
pub struct Retriever {
    config: AssistantConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(
        config: AssistantConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { config, embedding_provider, vector_store }
    }

    /// Retrieve context for an (already enhanced, working-language) query.
    ///
    /// An empty result means nothing scored above the threshold; callers
    /// must surface that as a no-relevant-content outcome rather than
    /// generating from an empty context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pipeline`] if embedding or search fails, or if the
    /// query embedding's dimensionality does not match the configured
    /// embedding model (an ingestion/query model mismatch).
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            Error::Pipeline(format!("query embedding failed: {e}"))
        })?;
        if embedding.len() != self.config.embedding_dimensions {
            // Model mismatch between ingestion and query time is a
            // correctness bug, not a quality regression.
            return Err(Error::Pipeline(format!(
                "embedding model mismatch: expected {} dimensions, got {}",
                self.config.embedding_dimensions,
                embedding.len()
            )));
        }

        let fetch = self.config.top_k * self.config.overfetch_factor;
        let candidates = self
            .vector_store
            .search(&self.config.collection, &embedding, fetch)
            .await
            .map_err(|e| {
                error!(collection = %self.config.collection, error = %e, "vector store search failed");
                Error::Pipeline(format!(
                    "search failed in collection '{}': {e}",
                    self.config.collection
                ))
            })?;

        let hits = select_hits(
            candidates,
            self.config.score_threshold,
            self.config.dedup_overlap,
            self.config.top_k,
        );
        let context = assemble_context(&hits, self.config.context_char_budget);
        if context.is_empty() && !hits.is_empty() {
            // The budget cannot hold even the top-scored chunk; generating
            // from an empty context would fabricate an answer.
            warn!(
                hit_count = hits.len(),
                budget = self.config.context_char_budget,
                "context budget too small for any hit, reporting no relevant content"
            );
            return Ok(RetrievalResult { hits: Vec::new(), context });
        }

        info!(hit_count = hits.len(), context_len = context.len(), "retrieval completed");
        Ok(RetrievalResult { hits, context })
    }
}

/// Filter by threshold, deduplicate, and truncate to `top_k`.
///
/// Candidates must arrive in descending score order (the vector store
/// contract); the greedy pass then prefers the higher-scored of any
/// duplicate pair. A candidate is a duplicate when it shares a source with
/// an already-kept hit and their word-overlap ratio exceeds `dedup_overlap`.
pub(crate) fn select_hits(
    candidates: Vec<ScoredChunk>,
    score_threshold: f32,
    dedup_overlap: f32,
    top_k: usize,
) -> Vec<ScoredChunk> {
    let mut hits: Vec<ScoredChunk> = Vec::with_capacity(top_k);
    for candidate in candidates {
        if candidate.score < score_threshold {
            continue;
        }
        let duplicate = hits.iter().any(|kept| {
            kept.chunk.source == candidate.chunk.source
                && text_overlap(&kept.chunk.text, &candidate.chunk.text) > dedup_overlap
        });
        if duplicate {
            continue;
        }
        hits.push(candidate);
        if hits.len() == top_k {
            break;
        }
    }
    hits
}

/// Word-level overlap ratio between two texts (intersection over the
/// smaller word set). 1.0 for identical sets; 0.0 when either is empty.
pub(crate) fn text_overlap(a: &str, b: &str) -> f32 {
    let words_a: HashSet<String> =
        a.to_lowercase().split_whitespace().map(String::from).collect();
    let words_b: HashSet<String> =
        b.to_lowercase().split_whitespace().map(String::from).collect();
    let smaller = words_a.len().min(words_b.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    shared as f32 / smaller as f32
}

/// Concatenate hits into a context string with citation markers, never
/// exceeding `char_budget`. Hits arrive in descending score order, so
/// stopping at the first overflow drops the lowest-scored chunks first.
pub(crate) fn assemble_context(hits: &[ScoredChunk], char_budget: usize) -> String {
    let mut context = String::new();
    for hit in hits {
        let marker = match hit.chunk.page() {
            Some(page) => format!("[Source: {}, page {page}]", hit.chunk.source),
            None => format!("[Source: {}]", hit.chunk.source),
        };
        let entry_len = marker.chars().count() + 1 + hit.chunk.text.chars().count();
        let separator_len = if context.is_empty() { 0 } else { 2 };
        if context.chars().count() + separator_len + entry_len > char_budget {
            break;
        }
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(&marker);
        context.push('\n');
        context.push_str(&hit.chunk.text);
    }
    context
}
