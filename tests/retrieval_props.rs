//! Property tests for retrieval ordering, deduplication, and context
//! assembly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use petro_rag::{
    AssistantConfig, Chunk, EmbeddingProvider, InMemoryVectorStore, Retriever, VectorStore,
};
use proptest::prelude::*;

const DIM: usize = 16;

/// An embedder that returns a fixed vector for every input, so the store's
/// similarity ordering is driven entirely by the generated chunk embeddings.
struct FixedEmbedder(Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, _text: &str) -> petro_rag::Result<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a chunk with a normalized embedding and one of four sources, so
/// same-source duplicate candidates actually occur.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", "[a-z ]{5,40}", 0usize..4, arb_normalized_embedding(dim)).prop_map(
        |(id, text, source_idx, embedding)| Chunk {
            id,
            text,
            embedding,
            metadata: HashMap::new(),
            source: format!("doc_{source_idx}"),
        },
    )
}

/// Word-overlap ratio as the duplicate-detection property defines it:
/// intersection over the smaller word set.
fn overlap_ratio(a: &str, b: &str) -> f32 {
    let wa: HashSet<&str> = a.split_whitespace().collect();
    let wb: HashSet<&str> = b.split_whitespace().collect();
    let smaller = wa.len().min(wb.len());
    if smaller == 0 {
        return 0.0;
    }
    wa.intersection(&wb).count() as f32 / smaller as f32
}

/// *For any* stored chunk set, query vector, and tuning values, retrieval
/// SHALL return at most `top_k` hits ordered by non-increasing score, all at
/// or above the threshold, with no same-source pair overlapping beyond the
/// duplicate threshold, and an assembled context within the character
/// budget.
mod prop_retrieval_invariants {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn ordering_dedup_and_budget_hold(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..24),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..8,
            threshold in 0.0f32..0.9,
            budget in 50usize..2000,
        ) {
            let config = AssistantConfig::builder()
                .embedding_dimensions(DIM)
                .top_k(top_k)
                .score_threshold(threshold)
                .context_char_budget(budget)
                .build()
                .unwrap();
            let dedup_overlap = config.dedup_overlap;
            let collection = config.collection.clone();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(async {
                let store = Arc::new(InMemoryVectorStore::new());
                store.create_collection(&collection, DIM).await.unwrap();

                // Deduplicate generated chunks by id to avoid upsert overwriting.
                let mut by_id: HashMap<String, Chunk> = HashMap::new();
                for chunk in &chunks {
                    by_id.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
                }
                let unique: Vec<Chunk> = by_id.into_values().collect();
                store.upsert(&collection, &unique).await.unwrap();

                let retriever =
                    Retriever::new(config, Arc::new(FixedEmbedder(query.clone())), store);
                retriever.retrieve("any query").await.unwrap()
            });

            prop_assert!(result.hits.len() <= top_k);

            for window in result.hits.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "hits not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }

            for hit in &result.hits {
                prop_assert!(hit.score >= threshold);
            }

            for (i, a) in result.hits.iter().enumerate() {
                for b in &result.hits[i + 1..] {
                    if a.chunk.source == b.chunk.source {
                        prop_assert!(
                            overlap_ratio(&a.chunk.text, &b.chunk.text) <= dedup_overlap,
                            "same-source duplicates survived dedup",
                        );
                    }
                }
            }

            prop_assert!(result.context.chars().count() <= budget);

            if result.hits.is_empty() {
                prop_assert!(result.is_empty());
                prop_assert!(result.context.is_empty());
            }
        }
    }
}
