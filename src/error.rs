//! Error types for the `petro-rag` crate.

use thiserror::Error;

/// Errors that can occur while answering a question.
///
/// Quota exhaustion and empty retrieval are *not* errors — they are expected
/// outcomes surfaced through [`Outcome`](crate::pipeline::Outcome) so callers
/// can render them. Only [`Error::Config`] is fatal to the process; every
/// other variant degrades a single request.
#[derive(Debug, Error)]
pub enum Error {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A transient external service kept failing after bounded retries.
    ///
    /// Distinct from a generic pipeline error so the caller can render a
    /// "service degraded, try again" response.
    #[error("Service degraded ({service}) after {attempts} attempts: {message}")]
    ServiceDegraded {
        /// The external service that failed (e.g. "generation").
        service: String,
        /// How many attempts were made before giving up.
        attempts: u32,
        /// A description of the last failure.
        message: String,
    },

    /// Translation failed after retry exhaustion.
    ///
    /// Returning the untranslated text instead would silently corrupt search
    /// relevance, so the request fails with this error.
    #[error("Translation unavailable ({from} -> {to}) after {attempts} attempts")]
    TranslationUnavailable {
        /// Source language code.
        from: String,
        /// Target language code.
        to: String,
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// An error in the user quota store.
    #[error("Quota store error: {0}")]
    QuotaStore(String),

    /// A configuration validation error. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// A convenience result type for petro-rag operations.
pub type Result<T> = std::result::Result<T, Error>;
