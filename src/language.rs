//! Language detection and round-trip translation.
//!
//! Detection is a lightweight statistical classifier: Arabic is recognized
//! by Unicode script share, Latin-script languages by stopword frequency
//! with a confidence margin. Short or ambiguous input defaults to the
//! working language. Translation goes through the generative model with
//! bounded exponential backoff; exhaustion fails the request rather than
//! silently passing untranslated text downstream.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::TextTransform;

/// Minimum alphabetic characters before detection is attempted.
const MIN_DETECT_CHARS: usize = 4;

/// Fraction of alphabetic characters that must be Arabic script.
const ARABIC_SHARE: f32 = 0.5;

/// Stopword sets for the Latin-script supported languages. Function words
/// only, chosen to be mutually distinctive.
const LATIN_STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &["the", "is", "are", "what", "how", "of", "and", "to", "in", "a", "for", "does", "it"],
    ),
    (
        "fr",
        &["le", "la", "les", "est", "que", "qu'est-ce", "de", "des", "et", "un", "une", "pour", "comment"],
    ),
    (
        "de",
        &["der", "die", "das", "ist", "was", "wie", "und", "ein", "eine", "für", "von", "werden"],
    ),
];

/// Human-readable names used in translation prompts.
fn language_name(code: &str) -> &'static str {
    match code {
        "en" => "English",
        "ar" => "Arabic",
        "fr" => "French",
        "de" => "German",
        _ => "Unknown",
    }
}

/// What detection concluded about the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// The language code the pipeline will use for the response.
    pub language: String,
    /// True when the detected language was outside the supported set and the
    /// default was substituted; callers attach a user-visible notice.
    pub unsupported_fallback: bool,
}

/// Whether a language is written right-to-left.
///
/// The flag travels to the presentation layer; text is never reordered here.
pub fn is_rtl(language: &str) -> bool {
    language == "ar"
}

/// Detects input language and translates between the user's language and the
/// pipeline's working language.
pub struct LanguageBridge {
    model: Arc<dyn TextTransform>,
    default_language: String,
    supported: Vec<String>,
    max_retries: u32,
    base_delay: Duration,
}

impl LanguageBridge {
    /// Create a new bridge.
    pub fn new(
        model: Arc<dyn TextTransform>,
        default_language: impl Into<String>,
        supported: Vec<String>,
        max_retries: u32,
        base_delay: Duration,
    ) -> Self {
        Self { model, default_language: default_language.into(), supported, max_retries, base_delay }
    }

    /// Detect the language of `text`.
    ///
    /// Unsupported or unrecognizable input falls back to the default
    /// language; the `unsupported_fallback` flag marks the cases a notice
    /// should accompany.
    pub fn detect(&self, text: &str) -> Detection {
        let (code, recognized) = classify(text);
        let code: &str = match code {
            Some(code) => code,
            None => &self.default_language,
        };
        if self.supported.iter().any(|l| l == code) {
            debug!(language = code, "detected language");
            Detection { language: code.to_string(), unsupported_fallback: false }
        } else {
            info!(detected = code, fallback = %self.default_language, "unsupported language, using default");
            Detection {
                language: self.default_language.clone(),
                // Script was recognized but not supported; flag it.
                unsupported_fallback: recognized,
            }
        }
    }

    /// Translate `text` from `from` to `to`.
    ///
    /// A byte-exact no-op when `from == to`. Otherwise retries the model with
    /// exponential backoff up to the configured attempt count; exhaustion is
    /// [`Error::TranslationUnavailable`].
    pub async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        if from == to {
            return Ok(text.to_string());
        }

        let prompt = format!(
            "You are a petroleum engineering translator. Translate this {} text to {}. \
             Give only the direct translation, no explanations.\n\nText: {text}\n\nTranslation:",
            language_name(from),
            language_name(to),
        );

        let mut delay = self.base_delay;
        for attempt in 1..=self.max_retries {
            match self.model.complete(&prompt).await {
                Ok(translation) => {
                    let cleaned = translation
                        .strip_prefix("Translation:")
                        .unwrap_or(&translation)
                        .trim()
                        .to_string();
                    debug!(from, to, attempt, "translated");
                    return Ok(cleaned);
                }
                Err(e) if attempt < self.max_retries => {
                    warn!(from, to, attempt, error = %e, "translation attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    warn!(from, to, attempt, error = %e, "translation failed, giving up");
                }
            }
        }

        Err(Error::TranslationUnavailable {
            from: from.to_string(),
            to: to.to_string(),
            attempts: self.max_retries,
        })
    }

    /// The configured working language.
    pub fn default_language(&self) -> &str {
        &self.default_language
    }
}

/// Classify text by script and stopword statistics.
///
/// Returns `(language, recognized)`: `language` is `None` when the input is
/// too short or no signal was found; `recognized` is true when a concrete
/// script or stopword signal existed (even if the language is unsupported
/// by a given bridge).
fn classify(text: &str) -> (Option<&'static str>, bool) {
    let alphabetic: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alphabetic.len() < MIN_DETECT_CHARS {
        return (None, false);
    }

    let arabic = alphabetic.iter().filter(|c| is_arabic_char(**c)).count();
    if arabic as f32 / alphabetic.len() as f32 >= ARABIC_SHARE {
        return (Some("ar"), true);
    }

    // CJK and other non-Latin, non-Arabic scripts: recognized but not one of
    // the languages this classifier can name.
    let latin = alphabetic.iter().filter(|c| c.is_ascii_alphabetic() || is_latin_extended(**c)).count();
    if (latin as f32) / (alphabetic.len() as f32) < 0.5 {
        return (Some("und"), true);
    }

    let words: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect();

    let mut best: Option<(&'static str, usize)> = None;
    let mut total_hits = 0usize;
    for (code, stopwords) in LATIN_STOPWORDS {
        let hits = words.iter().filter(|w| stopwords.contains(&w.as_str())).count();
        total_hits += hits;
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((code, hits));
        }
    }

    match best {
        // Require a clear margin: the winner must account for most hits.
        Some((code, hits)) if hits * 2 > total_hits => (Some(code), true),
        _ => (None, total_hits > 0),
    }
}

fn is_arabic_char(c: char) -> bool {
    matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{08A0}'..='\u{08FF}')
}

fn is_latin_extended(c: char) -> bool {
    matches!(c, '\u{00C0}'..='\u{024F}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoModel;

    #[async_trait]
    impl TextTransform for EchoModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(format!("translated: {}", prompt.len()))
        }
    }

    struct AlwaysFailing;

    #[async_trait]
    impl TextTransform for AlwaysFailing {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(Error::ServiceDegraded {
                service: "generation".to_string(),
                attempts: 1,
                message: "down".to_string(),
            })
        }
    }

    fn bridge(model: impl TextTransform + 'static) -> LanguageBridge {
        LanguageBridge::new(
            Arc::new(model),
            "en",
            vec!["en".into(), "ar".into(), "fr".into(), "de".into()],
            3,
            Duration::from_millis(1),
        )
    }

    #[test]
    fn detects_arabic_by_script() {
        let b = bridge(EchoModel);
        assert_eq!(b.detect("ما هو التكسير الهيدروليكي؟").language, "ar");
    }

    #[test]
    fn detects_english_by_stopwords() {
        let b = bridge(EchoModel);
        assert_eq!(b.detect("what is the purpose of hydraulic fracturing").language, "en");
    }

    #[test]
    fn detects_french_by_stopwords() {
        let b = bridge(EchoModel);
        assert_eq!(b.detect("qu'est-ce que la fracturation hydraulique").language, "fr");
    }

    #[test]
    fn detects_german_by_stopwords() {
        let b = bridge(EchoModel);
        assert_eq!(b.detect("was ist das hydraulische Fracking und wie funktioniert es").language, "de");
    }

    #[test]
    fn short_text_defaults_without_notice() {
        let b = bridge(EchoModel);
        let d = b.detect("ok");
        assert_eq!(d.language, "en");
        assert!(!d.unsupported_fallback);
    }

    #[test]
    fn unsupported_script_falls_back_with_notice() {
        let b = bridge(EchoModel);
        let d = b.detect("これは日本語の質問です");
        assert_eq!(d.language, "en");
        assert!(d.unsupported_fallback);
    }

    #[test]
    fn arabic_is_rtl_english_is_not() {
        assert!(is_rtl("ar"));
        assert!(!is_rtl("en"));
        assert!(!is_rtl("fr"));
    }

    #[tokio::test]
    async fn translate_is_byte_exact_noop_when_languages_match() {
        let b = bridge(AlwaysFailing);
        let text = "no call should be made";
        assert_eq!(b.translate(text, "en", "en").await.unwrap(), text);
    }

    #[tokio::test]
    async fn translate_fails_distinctly_after_retry_exhaustion() {
        let b = bridge(AlwaysFailing);
        let err = b.translate("text", "ar", "en").await.unwrap_err();
        match err {
            Error::TranslationUnavailable { from, to, attempts } => {
                assert_eq!(from, "ar");
                assert_eq!(to, "en");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
