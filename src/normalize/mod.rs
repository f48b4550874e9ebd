//! Summarize-then-translate normalization of update bodies.
//!
//! Normalization never drops an item. Each stage reports whether it
//! succeeded or degraded:
//!
//! | Stage | Success | Degraded |
//! |-------|---------|----------|
//! | Summarize | [`Summary::Extracted`] | [`Summary::Original`] (input text kept) |
//! | Translate | [`Translation::Translated`] | [`Translation::Untranslated`] (English kept) |
//!
//! [`Normalized::summary_text`] picks the most processed non-empty text,
//! falling back to the raw content last.

pub mod summarize;
pub mod translate;

use summarize::SummarizeError;
use tracing::{debug, warn};
use translate::{Translate, TranslateError};

use crate::utils::truncate_for_log;

/// How much text to keep when summarizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// Single pass over the whole text.
    Sentences { count: usize, max_length: usize },
    /// Chunk-by-chunk, for bodies mixing several services.
    Chunks { max_chunks: usize, max_length: usize },
}

impl SummaryMode {
    /// Azure listing entries.
    pub const LISTING: SummaryMode = SummaryMode::Sentences {
        count: 2,
        max_length: 300,
    };
    /// AWS feed entries.
    pub const FEED: SummaryMode = SummaryMode::Sentences {
        count: 1,
        max_length: 150,
    };
    /// GCP release-note blocks.
    pub const RELEASE_NOTES: SummaryMode = SummaryMode::Chunks {
        max_chunks: 3,
        max_length: 150,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Extracted(String),
    /// Summarization failed; the input is carried unchanged.
    Original { text: String, reason: SummarizeError },
}

impl Summary {
    pub fn text(&self) -> &str {
        match self {
            Summary::Extracted(text) | Summary::Original { text, .. } => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Summary::Original { .. })
    }
}

#[derive(Debug)]
pub enum Translation {
    Translated(String),
    /// Translation failed or was skipped; the source-language text is kept.
    Untranslated {
        text: String,
        reason: Option<TranslateError>,
    },
}

impl Translation {
    pub fn text(&self) -> &str {
        match self {
            Translation::Translated(text) | Translation::Untranslated { text, .. } => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Translation::Untranslated { .. })
    }
}

/// Result of normalizing one body of text.
#[derive(Debug)]
pub struct Normalized {
    pub summary: Summary,
    pub translation: Translation,
}

impl Normalized {
    /// Translated summary, else the source-language summary, else `content`.
    pub fn summary_text(&self, content: &str) -> String {
        [self.translation.text(), self.summary.text(), content]
            .into_iter()
            .map(str::trim)
            .find(|text| !text.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// Summarizes and translates text with a pluggable translation backend.
#[derive(Debug)]
pub struct Normalizer<T> {
    translator: T,
}

impl<T: Translate> Normalizer<T> {
    pub fn new(translator: T) -> Self {
        Self { translator }
    }

    pub fn summarize(&self, text: &str, mode: SummaryMode) -> Summary {
        let result = match mode {
            SummaryMode::Sentences { count, max_length } => {
                summarize::summarize(text, count, max_length)
            }
            SummaryMode::Chunks { max_chunks, max_length } => {
                summarize::summarize_long(text, max_chunks, max_length)
            }
        };
        match result {
            Ok(summary) => Summary::Extracted(summary),
            Err(reason) => {
                debug!(
                    %reason,
                    text = %truncate_for_log(text, 80),
                    "Summarization degraded to original text"
                );
                Summary::Original {
                    text: text.to_string(),
                    reason,
                }
            }
        }
    }

    pub async fn translate(&self, text: &str) -> Translation {
        if text.trim().is_empty() {
            return Translation::Untranslated {
                text: text.to_string(),
                reason: None,
            };
        }
        match self.translator.translate(text).await {
            Ok(translated) if !translated.trim().is_empty() => Translation::Translated(translated),
            Ok(_) => Translation::Untranslated {
                text: text.to_string(),
                reason: None,
            },
            Err(e) => {
                warn!(
                    error = %e,
                    text = %truncate_for_log(text, 80),
                    "Translation failed; keeping source text"
                );
                Translation::Untranslated {
                    text: text.to_string(),
                    reason: Some(e),
                }
            }
        }
    }

    /// Summarize `content`, then translate the summary.
    pub async fn normalize(&self, content: &str, mode: SummaryMode) -> Normalized {
        let summary = self.summarize(content, mode);
        let translation = self.translate(summary.text()).await;
        if summary.is_degraded() || translation.is_degraded() {
            debug!(
                summary_degraded = summary.is_degraded(),
                translation_degraded = translation.is_degraded(),
                "Normalized with fallback"
            );
        }
        Normalized {
            summary,
            translation,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Translators for tests.

    use super::translate::{Translate, TranslateError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Prefixes every input with `[ko] `.
    #[derive(Debug, Default)]
    pub struct TaggingTranslator {
        pub calls: AtomicUsize,
    }

    impl Translate for TaggingTranslator {
        async fn translate(&self, text: &str) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[ko] {text}"))
        }
    }

    /// Always fails.
    #[derive(Debug, Default)]
    pub struct FailingTranslator;

    impl Translate for FailingTranslator {
        async fn translate(&self, _text: &str) -> Result<String, TranslateError> {
            Err(TranslateError::Malformed("forced failure".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingTranslator, TaggingTranslator};
    use super::*;
    use std::sync::atomic::Ordering;

    const CONTENT: &str = "Azure Functions now supports Python 3.12. \
        Python 3.12 support in Azure Functions brings faster cold starts.";

    #[tokio::test]
    async fn test_normalize_success_path() {
        let normalizer = Normalizer::new(TaggingTranslator::default());
        let out = normalizer.normalize(CONTENT, SummaryMode::FEED).await;

        assert!(!out.summary.is_degraded());
        assert!(!out.translation.is_degraded());
        assert!(out.translation.text().starts_with("[ko] "));
        assert_eq!(out.summary_text(CONTENT), out.translation.text());
    }

    #[tokio::test]
    async fn test_translation_failure_keeps_english_summary() {
        let normalizer = Normalizer::new(FailingTranslator);
        let out = normalizer.normalize(CONTENT, SummaryMode::FEED).await;

        assert!(out.translation.is_degraded());
        assert!(matches!(
            out.translation,
            Translation::Untranslated { reason: Some(_), .. }
        ));
        let english = out.summary.text().to_string();
        assert!(!english.is_empty());
        assert_eq!(out.summary_text(CONTENT), english);
    }

    #[tokio::test]
    async fn test_summarization_failure_keeps_original() {
        let normalizer = Normalizer::new(FailingTranslator);
        let out = normalizer.normalize("--- ***", SummaryMode::LISTING).await;

        assert_eq!(
            out.summary,
            Summary::Original {
                text: "--- ***".to_string(),
                reason: SummarizeError::NoWords
            }
        );
        assert_eq!(out.summary_text("--- ***"), "--- ***");
    }

    #[tokio::test]
    async fn test_chunked_mode_falls_back_to_content() {
        let normalizer = Normalizer::new(FailingTranslator);
        let content = "Short. Notes. Only.";
        let out = normalizer.normalize(content, SummaryMode::RELEASE_NOTES).await;

        assert_eq!(
            out.summary,
            Summary::Original {
                text: content.to_string(),
                reason: SummarizeError::NoChunks
            }
        );
        assert_eq!(out.summary_text(content), content);
    }

    #[tokio::test]
    async fn test_empty_content_skips_translation() {
        let translator = TaggingTranslator::default();
        let normalizer = Normalizer::new(translator);
        let out = normalizer.normalize("", SummaryMode::FEED).await;

        assert!(matches!(out.translation, Translation::Untranslated { reason: None, .. }));
        assert_eq!(normalizer.translator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(out.summary_text(""), "");
    }
}
