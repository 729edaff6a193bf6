//! Configuration for the assistant pipeline.
//!
//! All settings are read once at startup; there is no hot reload. Invalid
//! configuration is [`Error::Config`] and fatal to the process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration parameters for the assistant pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantConfig {
    /// The language retrieval and generation internally operate in.
    pub default_language: String,
    /// Languages the bridge will detect and translate; must contain
    /// `default_language`.
    pub supported_languages: Vec<String>,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to return from retrieval.
    pub top_k: usize,
    /// Overfetch multiplier applied to `top_k` when searching, to compensate
    /// for post-filtering losses.
    pub overfetch_factor: usize,
    /// Minimum similarity score for results (the relevance floor).
    pub score_threshold: f32,
    /// Word-overlap ratio above which two same-source chunks are considered
    /// duplicates.
    pub dedup_overlap: f32,
    /// Maximum total characters in the assembled context.
    pub context_char_budget: usize,
    /// Maximum length of an enhanced query in characters.
    pub max_enhanced_chars: usize,
    /// Daily quota for anonymous users.
    pub anonymous_daily_quota: u32,
    /// Daily quota for registered users.
    pub registered_daily_quota: u32,
    /// Master switch for quota enforcement.
    pub enable_limits: bool,
    /// Maximum attempts for translation and generation calls.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds. Doubles on each
    /// retry.
    pub retry_base_delay_ms: u64,
    /// Timeout applied to every external model call, in seconds.
    pub request_timeout_secs: u64,
    /// Base URL of the Ollama server.
    pub ollama_base_url: String,
    /// Generative model identifier (enhancement, translation, generation).
    pub llm_model: String,
    /// Embedding model identifier. Must match the model used at ingestion
    /// time; a mismatch is a correctness bug, not a quality regression.
    pub embedding_model: String,
    /// Dimensionality of the configured embedding model.
    pub embedding_dimensions: usize,
    /// Vector store collection holding the document chunks.
    pub collection: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            supported_languages: vec!["en", "ar", "fr", "de"]
                .into_iter()
                .map(String::from)
                .collect(),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            overfetch_factor: 3,
            score_threshold: 0.25,
            dedup_overlap: 0.6,
            context_char_budget: 4000,
            max_enhanced_chars: 512,
            anonymous_daily_quota: 1,
            registered_daily_quota: 20,
            enable_limits: true,
            max_retries: 3,
            retry_base_delay_ms: 250,
            request_timeout_secs: 60,
            ollama_base_url: "http://localhost:11434".to_string(),
            llm_model: "llama3.2:latest".to_string(),
            embedding_model: "mxbai-embed-large".to_string(),
            embedding_dimensions: 1024,
            collection: "petroleum_docs".to_string(),
        }
    }
}

impl AssistantConfig {
    /// Create a new builder for constructing an [`AssistantConfig`].
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder::default()
    }

    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables: `OLLAMA_BASE_URL`, `OLLAMA_LLM_MODEL`,
    /// `OLLAMA_EMBEDDING_MODEL`, `EMBEDDING_DIMENSIONS`, `DEFAULT_LANGUAGE`,
    /// `ENABLE_USER_LIMITS`, `ANONYMOUS_DAILY_QUOTA`,
    /// `REGISTERED_DAILY_QUOTA`, `TOP_K`, `SCORE_THRESHOLD`,
    /// `CONTEXT_CHAR_BUDGET`, `MAX_RETRIES`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but unparsable, or if
    /// the resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            builder = builder.ollama_base_url(url);
        }
        if let Ok(model) = std::env::var("OLLAMA_LLM_MODEL") {
            builder = builder.llm_model(model);
        }
        if let Ok(model) = std::env::var("OLLAMA_EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Ok(lang) = std::env::var("DEFAULT_LANGUAGE") {
            builder = builder.default_language(lang);
        }
        if let Ok(v) = std::env::var("EMBEDDING_DIMENSIONS") {
            builder = builder.embedding_dimensions(parse_env("EMBEDDING_DIMENSIONS", &v)?);
        }
        if let Ok(v) = std::env::var("ENABLE_USER_LIMITS") {
            builder = builder.enable_limits(v.eq_ignore_ascii_case("true"));
        }
        if let Ok(v) = std::env::var("ANONYMOUS_DAILY_QUOTA") {
            builder = builder.anonymous_daily_quota(parse_env("ANONYMOUS_DAILY_QUOTA", &v)?);
        }
        if let Ok(v) = std::env::var("REGISTERED_DAILY_QUOTA") {
            builder = builder.registered_daily_quota(parse_env("REGISTERED_DAILY_QUOTA", &v)?);
        }
        if let Ok(v) = std::env::var("TOP_K") {
            builder = builder.top_k(parse_env("TOP_K", &v)?);
        }
        if let Ok(v) = std::env::var("SCORE_THRESHOLD") {
            builder = builder.score_threshold(parse_env("SCORE_THRESHOLD", &v)?);
        }
        if let Ok(v) = std::env::var("CONTEXT_CHAR_BUDGET") {
            builder = builder.context_char_budget(parse_env("CONTEXT_CHAR_BUDGET", &v)?);
        }
        if let Ok(v) = std::env::var("MAX_RETRIES") {
            builder = builder.max_retries(parse_env("MAX_RETRIES", &v)?);
        }

        builder.build()
    }

    /// Base delay for exponential backoff.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Timeout for external model calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `lang` is in the supported set.
    pub fn is_supported_language(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {name}: '{value}'")))
}

/// Builder for constructing a validated [`AssistantConfig`].
#[derive(Debug, Clone, Default)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    /// Set the working/default language.
    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.config.default_language = lang.into();
        self
    }

    /// Set the supported language set.
    pub fn supported_languages(mut self, langs: Vec<String>) -> Self {
        self.config.supported_languages = langs;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to return from retrieval.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the overfetch multiplier applied to `top_k` when searching.
    pub fn overfetch_factor(mut self, factor: usize) -> Self {
        self.config.overfetch_factor = factor;
        self
    }

    /// Set the minimum similarity score for retrieval results.
    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.config.score_threshold = threshold;
        self
    }

    /// Set the duplicate word-overlap threshold.
    pub fn dedup_overlap(mut self, overlap: f32) -> Self {
        self.config.dedup_overlap = overlap;
        self
    }

    /// Set the maximum total characters in the assembled context.
    pub fn context_char_budget(mut self, budget: usize) -> Self {
        self.config.context_char_budget = budget;
        self
    }

    /// Set the maximum length of an enhanced query in characters.
    pub fn max_enhanced_chars(mut self, max: usize) -> Self {
        self.config.max_enhanced_chars = max;
        self
    }

    /// Set the daily quota for anonymous users.
    pub fn anonymous_daily_quota(mut self, quota: u32) -> Self {
        self.config.anonymous_daily_quota = quota;
        self
    }

    /// Set the daily quota for registered users.
    pub fn registered_daily_quota(mut self, quota: u32) -> Self {
        self.config.registered_daily_quota = quota;
        self
    }

    /// Enable or disable quota enforcement.
    pub fn enable_limits(mut self, enable: bool) -> Self {
        self.config.enable_limits = enable;
        self
    }

    /// Set the maximum attempts for translation and generation calls.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the base backoff delay in milliseconds.
    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    /// Set the external call timeout in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the Ollama base URL.
    pub fn ollama_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.ollama_base_url = url.into();
        self
    }

    /// Set the generative model identifier.
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = model.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    /// Set the vector store collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Build the [`AssistantConfig`], validating that parameters are
    /// consistent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `overfetch_factor == 0`
    /// - `dedup_overlap` is outside `(0, 1]`
    /// - `context_char_budget == 0` or `max_enhanced_chars == 0`
    /// - `max_retries == 0`
    /// - the supported set does not contain the default language
    /// - `embedding_dimensions == 0`
    pub fn build(self) -> Result<AssistantConfig> {
        let config = self.config;
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(Error::Config("top_k must be greater than zero".to_string()));
        }
        if config.overfetch_factor == 0 {
            return Err(Error::Config("overfetch_factor must be greater than zero".to_string()));
        }
        if !(config.dedup_overlap > 0.0 && config.dedup_overlap <= 1.0) {
            return Err(Error::Config(format!(
                "dedup_overlap ({}) must be in (0, 1]",
                config.dedup_overlap
            )));
        }
        if config.context_char_budget == 0 {
            return Err(Error::Config("context_char_budget must be greater than zero".to_string()));
        }
        if config.max_enhanced_chars == 0 {
            return Err(Error::Config("max_enhanced_chars must be greater than zero".to_string()));
        }
        if config.max_retries == 0 {
            return Err(Error::Config("max_retries must be greater than zero".to_string()));
        }
        if config.embedding_dimensions == 0 {
            return Err(Error::Config("embedding_dimensions must be greater than zero".to_string()));
        }
        if !config.is_supported_language(&config.default_language) {
            return Err(Error::Config(format!(
                "supported_languages must contain the default language '{}'",
                config.default_language
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = AssistantConfig::builder().build().unwrap();
        assert_eq!(config, AssistantConfig::default());
    }

    #[test]
    fn rejects_overlap_not_less_than_chunk_size() {
        let err = AssistantConfig::builder().chunk_size(100).chunk_overlap(100).build();
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = AssistantConfig::builder().top_k(0).build();
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_default_language_outside_supported_set() {
        let err = AssistantConfig::builder()
            .default_language("es")
            .supported_languages(vec!["en".to_string(), "fr".to_string()])
            .build();
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_dedup_overlap() {
        assert!(AssistantConfig::builder().dedup_overlap(0.0).build().is_err());
        assert!(AssistantConfig::builder().dedup_overlap(1.5).build().is_err());
    }
}
