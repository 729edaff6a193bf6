//! Retrieval and query-enhancement core for a petroleum engineering
//! document assistant.
//!
//! The crate answers natural-language questions over an embedded document
//! corpus. A question flows through the [`Assistant`] pipeline:
//!
//! 1. **Language bridge** — detect the input language and translate
//!    non-working-language questions in (and answers back out).
//! 2. **Usage tracker** — classify domain relevance and gate on the user's
//!    daily quota.
//! 3. **Query enhancer** — expand the question with domain synonyms from a
//!    curated term table, with a generative fallback.
//! 4. **Retriever** — similarity search with overfetch, relevance-floor
//!    filtering, near-duplicate collapse, and bounded, cited context
//!    assembly.
//! 5. **Generation** — answer from the assembled context.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use petro_rag::{Assistant, AssistantConfig, AskRequest, InMemoryVectorStore, OllamaClient};
//!
//! let config = AssistantConfig::from_env()?;
//! let client = Arc::new(OllamaClient::new(
//!     &config.ollama_base_url,
//!     &config.llm_model,
//!     &config.embedding_model,
//!     config.embedding_dimensions,
//!     config.request_timeout(),
//! )?);
//!
//! let assistant = Assistant::builder()
//!     .config(config)
//!     .embedding_provider(client.clone())
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .model(client)
//!     .build()
//!     .await?;
//!
//! assistant.ingest(&documents).await?;
//! let response = assistant.ask(&AskRequest::new("What is fracking?")).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod enhancer;
pub mod error;
pub mod inmemory;
pub mod language;
pub mod model;
pub mod pipeline;
pub mod quota;
pub mod retriever;
pub mod terms;
pub mod vectorstore;

pub use chunking::TextSplitter;
pub use config::{AssistantConfig, AssistantConfigBuilder};
pub use document::{Chunk, Citation, Document, RetrievalResult, ScoredChunk};
pub use embedding::EmbeddingProvider;
pub use enhancer::QueryEnhancer;
pub use error::{Error, Result};
pub use inmemory::InMemoryVectorStore;
pub use language::{Detection, LanguageBridge};
pub use model::{OllamaClient, TextTransform};
pub use pipeline::{AskRequest, AskResponse, Assistant, AssistantBuilder, Notice, Outcome};
pub use quota::{
    InMemoryQuotaStore, JsonFileQuotaStore, QuotaDecision, QuotaPolicy, QuotaStore, UsageTracker,
    UserClass, UserRecord, ANONYMOUS_USER,
};
pub use retriever::Retriever;
pub use vectorstore::VectorStore;
