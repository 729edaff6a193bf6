//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps collections in a `HashMap` behind a
//! `tokio::sync::RwLock`: reads (searches) run concurrently, while batch
//! ingestion takes the write guard and excludes readers for the duration of
//! the upsert. Suitable for development, testing, and small corpora.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, ScoredChunk};
use crate::error::{Error, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

struct Collection {
    dimensions: usize,
    chunks: HashMap<String, Chunk>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Each collection records the dimensionality it was created with; upserts
/// and searches with mismatched vector lengths are rejected.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn missing_collection(name: &str) -> Error {
    Error::VectorStore {
        backend: BACKEND.to_string(),
        message: format!("collection '{name}' does not exist"),
    }
}

fn dimension_mismatch(expected: usize, got: usize) -> Error {
    Error::VectorStore {
        backend: BACKEND.to_string(),
        message: format!("embedding dimension mismatch: collection expects {expected}, got {got}"),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, chunks: HashMap::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store =
            collections.get_mut(collection).ok_or_else(|| missing_collection(collection))?;
        for chunk in chunks {
            if chunk.embedding.len() != store.dimensions {
                return Err(dimension_mismatch(store.dimensions, chunk.embedding.len()));
            }
            store.chunks.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store =
            collections.get_mut(collection).ok_or_else(|| missing_collection(collection))?;
        for id in ids {
            store.chunks.remove(*id);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing_collection(collection))?;
        if embedding.len() != store.dimensions {
            return Err(dimension_mismatch(store.dimensions, embedding.len()));
        }

        let mut scored: Vec<ScoredChunk> = store
            .chunks
            .values()
            .map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(&chunk.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: format!("text for {id}"),
            embedding,
            metadata: HashMap::new(),
            source: "doc".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimensions() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 3).await.unwrap();
        let err = store.upsert("docs", &[chunk("a", vec![1.0, 0.0])]).await;
        assert!(matches!(err, Err(Error::VectorStore { .. })));
    }

    #[tokio::test]
    async fn search_rejects_wrong_dimensions() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 3).await.unwrap();
        let err = store.search("docs", &[1.0, 0.0], 5).await;
        assert!(matches!(err, Err(Error::VectorStore { .. })));
    }

    #[tokio::test]
    async fn search_orders_by_descending_similarity() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                &[
                    chunk("near", vec![1.0, 0.1]),
                    chunk("far", vec![0.0, 1.0]),
                    chunk("mid", vec![0.7, 0.7]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("docs", &[1.0, 0.0], 3).await.unwrap();
        assert_eq!(results[0].chunk.id, "near");
        assert_eq!(results[2].chunk.id, "far");
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }
}
