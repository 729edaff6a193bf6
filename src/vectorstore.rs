//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, ScoredChunk};
use crate::error::Result;

/// A storage backend for chunk embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s. Collections are
/// created with a fixed dimensionality; upserts and searches with a vector
/// of a different length must be rejected, since they indicate an
/// embedding-model mismatch between ingestion and query time.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection with the given dimensionality. No-op if it
    /// already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Search for the `k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score.
    async fn search(&self, collection: &str, embedding: &[f32], k: usize)
        -> Result<Vec<ScoredChunk>>;
}
