//! Query enhancement.
//!
//! Expands a short or ambiguous query into a richer search string. The
//! curated domain-term table is tried first; when nothing matches, a
//! generative rewrite fills in. Either way the original query is never
//! dropped — enhancement only adds — and the output is capped so downstream
//! embedding cost stays bounded.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::TextTransform;
use crate::terms;

/// Expands user queries with domain synonyms and technical terms.
pub struct QueryEnhancer {
    model: Arc<dyn TextTransform>,
    max_chars: usize,
}

impl QueryEnhancer {
    /// Create a new enhancer with the given generative fallback and output
    /// length cap.
    pub fn new(model: Arc<dyn TextTransform>, max_chars: usize) -> Self {
        Self { model, max_chars }
    }

    /// Enhance a raw working-language query.
    ///
    /// Guarantees: the result contains the original query verbatim, and its
    /// character length never exceeds the configured cap unless the raw
    /// query itself does. Model failure is non-fatal; the raw query is
    /// returned unchanged and a warning is logged.
    pub async fn enhance(&self, raw: &str) -> String {
        let expansions = terms::expansions_for(raw);
        if !expansions.is_empty() {
            let enhanced = append_capped(raw, &expansions, self.max_chars);
            debug!(original = raw, enhanced = %enhanced, "table-driven enhancement");
            return enhanced;
        }

        match self.model.complete(&rewrite_prompt(raw)).await {
            Ok(rewritten) if !rewritten.is_empty() => {
                let enhanced = ensure_superset(raw, &rewritten, self.max_chars);
                debug!(original = raw, enhanced = %enhanced, "generative enhancement");
                enhanced
            }
            Ok(_) => raw.to_string(),
            Err(e) => {
                warn!(error = %e, "query enhancement failed, using raw query");
                raw.to_string()
            }
        }
    }
}

fn rewrite_prompt(query: &str) -> String {
    format!(
        "You are a petroleum engineering expert. Enhance this query for better \
         petroleum knowledge retrieval by adding technical synonyms and related \
         concepts.\n\nReturn ONLY the enhanced query text, no explanations.\n\n\
         Query: {query}\n\nEnhanced query:"
    )
}

/// Append expansions after the original, stopping before the first expansion
/// that would push the result past `max_chars`.
fn append_capped(raw: &str, expansions: &[&str], max_chars: usize) -> String {
    let mut out = raw.to_string();
    for expansion in expansions {
        // +2 for the ", " separator
        if out.chars().count() + expansion.chars().count() + 2 > max_chars {
            break;
        }
        out.push_str(", ");
        out.push_str(expansion);
    }
    out
}

/// Make a generative rewrite honor the superset and length guarantees.
///
/// The rewrite is used as-is when it already contains the original query;
/// otherwise the original is prepended. If the result would exceed the cap,
/// the raw query wins — truncating could cut the original apart.
fn ensure_superset(raw: &str, rewritten: &str, max_chars: usize) -> String {
    let out = if rewritten.to_lowercase().contains(&raw.to_lowercase()) {
        rewritten.to_string()
    } else {
        format!("{raw}, {rewritten}")
    };
    if out.chars().count() <= max_chars {
        out
    } else {
        raw.to_string()
    }
}
