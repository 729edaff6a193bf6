//! Data types for documents, chunks, and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document (title, URL, ...).
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

/// A segment of a [`Document`] with its vector embedding.
///
/// Chunks are created at ingestion time and immutable thereafter. Every chunk
/// belongs to exactly one source document; text overlap exists only between
/// neighboring chunks of the same source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable, content-derived identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus
    /// chunk-specific fields (e.g. `chunk_index`, `page`).
    pub metadata: HashMap<String, String>,
    /// The originating document or page identifier, used for citation.
    pub source: String,
}

impl Chunk {
    /// The page number recorded at ingestion time, if any.
    pub fn page(&self) -> Option<&str> {
        self.metadata.get("page").map(String::as_str)
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// The outcome of a retrieval pass: ranked hits plus the assembled context.
///
/// Invariants upheld by the retriever:
/// - `hits` are ordered by non-increasing score;
/// - no two hits from the same source overlap beyond the configured
///   duplicate threshold;
/// - `context` never exceeds the configured character budget;
/// - every hit is attributable to a source for citation display.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    /// Deduplicated hits in descending score order.
    pub hits: Vec<ScoredChunk>,
    /// The bounded context string with source citation markers.
    pub context: String,
}

impl RetrievalResult {
    /// True when nothing scored above the relevance floor.
    ///
    /// Callers must surface this as an explicit no-relevant-content outcome
    /// rather than generating from an empty context.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Citations for the hits, in rank order.
    pub fn citations(&self) -> Vec<Citation> {
        self.hits
            .iter()
            .map(|hit| Citation {
                source: hit.chunk.source.clone(),
                page: hit.chunk.page().map(str::to_string),
                score: hit.score,
            })
            .collect()
    }
}

/// A user-facing reference to a retrieved source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// The originating document or page identifier.
    pub source: String,
    /// Page number within the source, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Relevance score of the cited chunk.
    pub score: f32,
}
