//! End-to-end scenario tests for the assistant pipeline, using deterministic
//! test doubles for the generative model and the embedding provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use petro_rag::{
    AskRequest, Assistant, AssistantConfig, Chunk, Document, EmbeddingProvider, Error,
    InMemoryVectorStore, Notice, Outcome, TextTransform, VectorStore,
};

/// Bag-of-words embedder over a small fixed vocabulary. Deterministic, and
/// cosine similarity behaves sensibly: texts sharing vocabulary words score
/// high, disjoint texts score zero.
struct KeywordEmbedder;

const VOCAB: &[&str] = &[
    "hydraulic",
    "fracturing",
    "proppant",
    "injection",
    "shale",
    "gas",
    "well",
    "drilling",
    "bit",
    "metallurgy",
];

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> petro_rag::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
        Ok(VOCAB
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect())
    }

    fn dimensions(&self) -> usize {
        VOCAB.len()
    }
}

const ARABIC_QUESTION: &str = "ما هو التكسير الهيدروليكي؟";
const ARABIC_ANSWER: &str = "التكسير الهيدروليكي هو تقنية تحفيز الآبار";
const ENGLISH_ANSWER: &str =
    "Hydraulic fracturing is a well stimulation technique used in shale gas production.";

/// A scripted model: routes on the prompt template each pipeline stage uses.
struct ScriptedModel;

#[async_trait]
impl TextTransform for ScriptedModel {
    async fn complete(&self, prompt: &str) -> petro_rag::Result<String> {
        if prompt.contains("Translate this Arabic text to English") {
            Ok("What is hydraulic fracturing?".to_string())
        } else if prompt.contains("Translate this English text to Arabic") {
            Ok(ARABIC_ANSWER.to_string())
        } else if prompt.contains("Enhanced query:") {
            Ok("general conversation question".to_string())
        } else if prompt.contains("Answer:") {
            Ok(ENGLISH_ANSWER.to_string())
        } else {
            Err(Error::Pipeline(format!("unexpected prompt: {prompt}")))
        }
    }
}

/// A model whose completions always fail, for degraded-service paths.
struct DownModel;

#[async_trait]
impl TextTransform for DownModel {
    async fn complete(&self, _prompt: &str) -> petro_rag::Result<String> {
        Err(Error::ServiceDegraded {
            service: "generation".to_string(),
            attempts: 1,
            message: "connection refused".to_string(),
        })
    }
}

fn test_config() -> AssistantConfig {
    AssistantConfig::builder()
        .embedding_dimensions(VOCAB.len())
        .score_threshold(0.1)
        .retry_base_delay_ms(1)
        .build()
        .unwrap()
}

fn doc(id: &str, text: &str) -> Document {
    Document {
        id: id.to_string(),
        text: text.to_string(),
        metadata: HashMap::new(),
        source_uri: None,
    }
}

async fn assistant_with(config: AssistantConfig, model: Arc<dyn TextTransform>) -> Assistant {
    let assistant = Assistant::builder()
        .config(config)
        .embedding_provider(Arc::new(KeywordEmbedder))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .model(model)
        .build()
        .await
        .unwrap();

    assistant
        .ingest(&[
            doc(
                "frack_manual.pdf",
                "The hydraulic fracturing technique relies on proppant injection to keep \
                 fractures open in shale gas reservoirs.",
            ),
            doc("drill_handbook.pdf", "Drilling bit metallurgy determines wear resistance."),
        ])
        .await
        .unwrap();

    assistant
}

#[tokio::test]
async fn fracking_query_ranks_the_fracturing_chunk_first() {
    let assistant = assistant_with(test_config(), Arc::new(ScriptedModel)).await;
    let response = assistant.ask(&AskRequest::new("what is fracking?")).await.unwrap();

    match response.outcome {
        Outcome::Answered { answer, citations } => {
            assert_eq!(answer, ENGLISH_ANSWER);
            assert_eq!(citations[0].source, "frack_manual.pdf");
            assert!(citations.windows(2).all(|w| w[0].score >= w[1].score));
            assert!(citations.iter().all(|c| c.source != "drill_handbook.pdf"));
        }
        other => panic!("expected an answer, got {other:?}"),
    }
    assert_eq!(response.language, "en");
    assert!(!response.rtl);
    assert!(response.notices.is_empty());
}

#[tokio::test]
async fn arabic_question_round_trips_with_rtl_flag() {
    let assistant = assistant_with(test_config(), Arc::new(ScriptedModel)).await;
    let response = assistant.ask(&AskRequest::new(ARABIC_QUESTION)).await.unwrap();

    assert_eq!(response.language, "ar");
    assert!(response.rtl);
    match response.outcome {
        Outcome::Answered { answer, .. } => assert_eq!(answer, ARABIC_ANSWER),
        other => panic!("expected an answer, got {other:?}"),
    }
}

#[tokio::test]
async fn nothing_above_threshold_is_an_explicit_non_answer() {
    let config = AssistantConfig::builder()
        .embedding_dimensions(VOCAB.len())
        .score_threshold(0.99)
        .retry_base_delay_ms(1)
        .build()
        .unwrap();
    let assistant = assistant_with(config, Arc::new(ScriptedModel)).await;

    let response = assistant.ask(&AskRequest::new("proppant drilling shale bit gas")).await.unwrap();
    assert!(matches!(response.outcome, Outcome::NoRelevantContent));
}

#[tokio::test]
async fn context_budget_below_any_chunk_is_a_non_answer() {
    let config = AssistantConfig::builder()
        .embedding_dimensions(VOCAB.len())
        .score_threshold(0.1)
        .context_char_budget(10)
        .retry_base_delay_ms(1)
        .build()
        .unwrap();
    let assistant = assistant_with(config, Arc::new(ScriptedModel)).await;

    // Hits exist above the threshold, but none fits the budget; answering
    // would mean generating from an empty context.
    let response = assistant.ask(&AskRequest::new("what is fracking?")).await.unwrap();
    assert!(matches!(response.outcome, Outcome::NoRelevantContent));
}

#[tokio::test]
async fn unsupported_language_falls_back_with_a_notice() {
    let assistant = assistant_with(test_config(), Arc::new(ScriptedModel)).await;
    let response = assistant.ask(&AskRequest::new("これは日本語の質問です")).await.unwrap();

    assert_eq!(response.language, "en");
    assert!(response.notices.contains(&Notice::UnsupportedLanguage));
    // Nothing in the corpus matches, so this is a graceful non-answer.
    assert!(matches!(response.outcome, Outcome::NoRelevantContent));
}

#[tokio::test]
async fn overlapping_chunks_from_one_source_collapse_in_the_response() {
    let config = test_config();
    let store = Arc::new(InMemoryVectorStore::new());
    store.create_collection(&config.collection, VOCAB.len()).await.unwrap();

    let embedder = KeywordEmbedder;
    let texts = [
        "hydraulic fracturing uses proppant injection in shale gas wells",
        "fracturing uses proppant injection in shale gas wells today",
    ];
    let mut chunks = Vec::new();
    for (i, text) in texts.iter().enumerate() {
        chunks.push(Chunk {
            id: format!("c{i}"),
            text: text.to_string(),
            embedding: embedder.embed(text).await.unwrap(),
            metadata: HashMap::new(),
            source: "frack_manual.pdf".to_string(),
        });
    }
    store.upsert(&config.collection, &chunks).await.unwrap();

    let assistant = Assistant::builder()
        .config(config)
        .embedding_provider(Arc::new(KeywordEmbedder))
        .vector_store(store)
        .model(Arc::new(ScriptedModel))
        .build()
        .await
        .unwrap();

    let response = assistant.ask(&AskRequest::new("what is fracking?")).await.unwrap();
    match response.outcome {
        Outcome::Answered { citations, .. } => {
            assert_eq!(citations.len(), 1, "near-duplicate chunks should collapse");
        }
        other => panic!("expected an answer, got {other:?}"),
    }
}

#[tokio::test]
async fn two_concurrent_queries_against_quota_one_yield_one_answer() {
    let assistant = Arc::new(assistant_with(test_config(), Arc::new(ScriptedModel)).await);

    let a = {
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move { assistant.ask(&AskRequest::new("what is fracking?")).await })
    };
    let b = {
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move { assistant.ask(&AskRequest::new("what is fracking?")).await })
    };

    let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
    let answered =
        outcomes.iter().filter(|r| matches!(r.outcome, Outcome::Answered { .. })).count();
    let rejected =
        outcomes.iter().filter(|r| matches!(r.outcome, Outcome::QuotaExceeded)).count();
    assert_eq!(answered, 1);
    assert_eq!(rejected, 1);
}

#[tokio::test]
async fn generation_outage_surfaces_as_service_degraded() {
    // Quota disabled so the table-driven enhancement path reaches generation.
    let config = AssistantConfig::builder()
        .embedding_dimensions(VOCAB.len())
        .score_threshold(0.1)
        .enable_limits(false)
        .retry_base_delay_ms(1)
        .build()
        .unwrap();
    let assistant = assistant_with(config, Arc::new(DownModel)).await;

    let err = assistant.ask(&AskRequest::new("what is fracking?")).await.unwrap_err();
    match err {
        Error::ServiceDegraded { service, attempts, .. } => {
            assert_eq!(service, "generation");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected ServiceDegraded, got {other}"),
    }
}

#[tokio::test]
async fn builder_rejects_missing_fields_and_dimension_mismatch() {
    let err = Assistant::builder().build().await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let config = AssistantConfig::builder().embedding_dimensions(999).build().unwrap();
    let err = Assistant::builder()
        .config(config)
        .embedding_provider(Arc::new(KeywordEmbedder))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .model(Arc::new(ScriptedModel))
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
