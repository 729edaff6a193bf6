//! The assistant pipeline orchestrator.
//!
//! [`Assistant`] wires the full question-answering flow: language detection
//! and inbound translation, quota gating, query enhancement, retrieval, and
//! answer generation with outbound translation. Construct one via
//! [`Assistant::builder()`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::chunking::TextSplitter;
use crate::config::AssistantConfig;
use crate::document::{Chunk, Citation, Document};
use crate::embedding::EmbeddingProvider;
use crate::enhancer::QueryEnhancer;
use crate::error::{Error, Result};
use crate::language::{is_rtl, LanguageBridge};
use crate::model::TextTransform;
use crate::quota::{QuotaDecision, QuotaPolicy, QuotaStore, UsageTracker, ANONYMOUS_USER};
use crate::retriever::Retriever;
use crate::terms;
use crate::vectorstore::VectorStore;

/// A user question, with an optional registered identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question text, in any supported language.
    pub question: String,
    /// Registered user identity; anonymous when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AskRequest {
    /// An anonymous question.
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), user_id: None }
    }

    /// Attach a registered user identity.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// A non-error condition the caller should surface to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// The detected language is outside the supported set; the default
    /// language was used instead.
    UnsupportedLanguage,
}

/// How the question was resolved.
///
/// Quota exhaustion and empty retrieval are expected outcomes, not errors
/// (those are reserved for degraded services and broken configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// An answer was generated from retrieved context.
    Answered {
        /// The answer text, in the response language.
        answer: String,
        /// Cited sources in rank order.
        citations: Vec<Citation>,
    },
    /// Nothing in the store scored above the relevance floor. The caller
    /// should respond with a graceful non-answer, never a fabricated one.
    NoRelevantContent,
    /// The user's daily quota is exhausted.
    QuotaExceeded,
}

/// The structured response to an [`AskRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// How the question was resolved.
    pub outcome: Outcome,
    /// The language of the response text.
    pub language: String,
    /// Display-direction flag for right-to-left scripts. The text itself is
    /// never reordered.
    pub rtl: bool,
    /// Non-error conditions the UI should surface.
    pub notices: Vec<Notice>,
    /// Quota units the user has left today.
    pub remaining_quota: u32,
}

/// The assistant pipeline orchestrator.
pub struct Assistant {
    config: AssistantConfig,
    bridge: LanguageBridge,
    enhancer: QueryEnhancer,
    retriever: Retriever,
    tracker: UsageTracker,
    model: Arc<dyn TextTransform>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    splitter: TextSplitter,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant").finish_non_exhaustive()
    }
}

impl Assistant {
    /// Create a new [`AssistantBuilder`].
    pub fn builder() -> AssistantBuilder {
        AssistantBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Ingest documents: chunk, embed, and store.
    ///
    /// Returns the chunks that were stored. The vector store's write path
    /// excludes concurrent reads for the duration of each upsert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pipeline`] on the first document that fails,
    /// including the document ID in the error message.
    pub async fn ingest(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        self.vector_store
            .create_collection(&self.config.collection, self.config.embedding_dimensions)
            .await?;

        let mut all_chunks = Vec::new();
        for document in documents {
            let mut chunks = self.splitter.split(document);
            if chunks.is_empty() {
                info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
                continue;
            }

            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
                Error::Pipeline(format!("embedding failed for document '{}': {e}", document.id))
            })?;
            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }

            self.vector_store.upsert(&self.config.collection, &chunks).await.map_err(|e| {
                error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
                Error::Pipeline(format!("upsert failed for document '{}': {e}", document.id))
            })?;

            info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
            all_chunks.extend(chunks);
        }
        Ok(all_chunks)
    }

    /// Answer a question.
    ///
    /// Control flow: detect and translate in, gate on quota, enhance,
    /// retrieve, generate, translate out. Quota is consumed at
    /// classification time and not refunded if a later stage fails.
    ///
    /// # Errors
    ///
    /// Per-request failures only: [`Error::TranslationUnavailable`] or
    /// [`Error::ServiceDegraded`] after retry exhaustion, or
    /// [`Error::Pipeline`] for embedding/search failures.
    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        let user_id = request.user_id.as_deref().unwrap_or(ANONYMOUS_USER);
        let working = self.config.default_language.clone();

        // 1. Detect the input language and bring the question into the
        //    working language.
        let detection = self.bridge.detect(&request.question);
        let mut notices = Vec::new();
        if detection.unsupported_fallback {
            notices.push(Notice::UnsupportedLanguage);
        }
        let question = self
            .bridge
            .translate(&request.question, &detection.language, &working)
            .await?;

        // 2. Gate on quota. Classification shares the enhancer's vocabulary,
        //    so "counts against quota" and "gets expanded" agree.
        let domain_related = terms::is_domain_related(&question);
        let decision = self.tracker.check_and_consume(user_id, domain_related).await?;
        let remaining = match decision {
            QuotaDecision::Exhausted => {
                info!(user = user_id, "quota exceeded");
                return Ok(AskResponse {
                    outcome: Outcome::QuotaExceeded,
                    language: detection.language.clone(),
                    rtl: is_rtl(&detection.language),
                    notices,
                    remaining_quota: 0,
                });
            }
            QuotaDecision::Allowed { remaining } => remaining,
            QuotaDecision::NotCounted => self.tracker.remaining(user_id).await,
        };

        // 3. Enhance and retrieve.
        let enhanced = self.enhancer.enhance(&question).await;
        let retrieval = self.retriever.retrieve(&enhanced).await?;
        if retrieval.is_empty() {
            info!(user = user_id, "no relevant content above threshold");
            return Ok(AskResponse {
                outcome: Outcome::NoRelevantContent,
                language: detection.language.clone(),
                rtl: is_rtl(&detection.language),
                notices,
                remaining_quota: remaining,
            });
        }

        // 4. Generate in the working language, then translate back.
        let prompt = answer_prompt(&retrieval.context, &question);
        let answer = self.complete_with_retry(&prompt).await?;
        let answer = self.bridge.translate(&answer, &working, &detection.language).await?;

        Ok(AskResponse {
            outcome: Outcome::Answered { answer, citations: retrieval.citations() },
            language: detection.language.clone(),
            rtl: is_rtl(&detection.language),
            notices,
            remaining_quota: remaining,
        })
    }

    /// Generation with the same bounded-backoff policy as translation.
    async fn complete_with_retry(&self, prompt: &str) -> Result<String> {
        let mut delay = self.config.retry_base_delay();
        let mut last_message = String::new();
        for attempt in 1..=self.config.max_retries {
            match self.model.complete(prompt).await {
                Ok(answer) => return Ok(answer),
                Err(e) => {
                    last_message = e.to_string();
                    if attempt < self.config.max_retries {
                        warn!(attempt, error = %e, "generation attempt failed, retrying");
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }
        Err(Error::ServiceDegraded {
            service: "generation".to_string(),
            attempts: self.config.max_retries,
            message: last_message,
        })
    }
}

fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a petroleum engineering expert. Answer the user's question using \
         the provided context from petroleum engineering documents.\n\n\
         Context from documents:\n{context}\n\nUser Question: {question}\n\n\
         Provide a comprehensive answer based on the context. If the context \
         doesn't contain enough information, mention what you know and suggest \
         where to find more details.\n\nAnswer:"
    )
}

/// Builder for constructing an [`Assistant`].
///
/// All fields are required except the quota store, which defaults to the
/// in-memory store. Call [`build()`](AssistantBuilder::build) to validate
/// and produce the assistant.
#[derive(Default)]
pub struct AssistantBuilder {
    config: Option<AssistantConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    model: Option<Arc<dyn TextTransform>>,
    quota_store: Option<Box<dyn QuotaStore>>,
}

impl AssistantBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: AssistantConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider. Must be the same model the corpus was
    /// ingested with.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the generative model used for enhancement, translation, and
    /// answer generation.
    pub fn model(mut self, model: Arc<dyn TextTransform>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the quota store. Defaults to the in-memory store.
    pub fn quota_store(mut self, store: Box<dyn QuotaStore>) -> Self {
        self.quota_store = Some(store);
        self
    }

    /// Build the [`Assistant`], validating that all required fields are set
    /// and loading quota records from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required field is missing, or if the
    /// embedding provider's dimensionality disagrees with the configuration.
    /// Returns [`Error::QuotaStore`] if quota records cannot be loaded.
    pub async fn build(self) -> Result<Assistant> {
        let config =
            self.config.ok_or_else(|| Error::Config("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| Error::Config("embedding_provider is required".to_string()))?;
        let vector_store =
            self.vector_store.ok_or_else(|| Error::Config("vector_store is required".to_string()))?;
        let model = self.model.ok_or_else(|| Error::Config("model is required".to_string()))?;

        if embedding_provider.dimensions() != config.embedding_dimensions {
            return Err(Error::Config(format!(
                "embedding provider produces {} dimensions but config expects {}",
                embedding_provider.dimensions(),
                config.embedding_dimensions
            )));
        }

        let quota_store =
            self.quota_store.unwrap_or_else(|| Box::new(crate::quota::InMemoryQuotaStore));
        let tracker = UsageTracker::new(
            QuotaPolicy {
                anonymous_daily: config.anonymous_daily_quota,
                registered_daily: config.registered_daily_quota,
                enabled: config.enable_limits,
            },
            quota_store,
        )
        .await?;

        let bridge = LanguageBridge::new(
            Arc::clone(&model),
            config.default_language.clone(),
            config.supported_languages.clone(),
            config.max_retries,
            config.retry_base_delay(),
        );
        let enhancer = QueryEnhancer::new(Arc::clone(&model), config.max_enhanced_chars);
        let retriever = Retriever::new(
            config.clone(),
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store),
        );
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap);

        Ok(Assistant {
            config,
            bridge,
            enhancer,
            retriever,
            tracker,
            model,
            embedding_provider,
            vector_store,
            splitter,
        })
    }
}
