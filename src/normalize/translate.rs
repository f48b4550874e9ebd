//! Translation of summaries into the digest's locale.
//!
//! - [`Translate`]: Core trait, so collectors can run against any backend
//! - [`GoogleTranslator`]: Calls the public Google Translate `translate_a/single` endpoint

use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("translation service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected translation response: {0}")]
    Malformed(String),
}

/// Trait for async text translation between one fixed locale pair.
pub trait Translate {
    /// Translate `text`, returning the translated string.
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Google Translate client for the keyless `client=gtx` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
    source: String,
    target: String,
}

impl GoogleTranslator {
    /// Create a translator from `source` to `target` (e.g. `"en"`, `"ko"`).
    pub fn new(
        endpoint: &str,
        source: &str,
        target: &str,
        timeout: Duration,
    ) -> Result<Self, TranslateError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        })
    }
}

impl Translate for GoogleTranslator {
    #[instrument(level = "debug", skip_all, fields(sl = %self.source, tl = %self.target))]
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let t0 = Instant::now();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", self.source.as_str()),
                ("tl", self.target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                %status,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Translation request rejected"
            );
            return Err(TranslateError::Status(status));
        }
        let body = response.text().await?;
        let translated = parse_gtx_response(&body)?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = translated.chars().count(),
            "Translated text"
        );
        Ok(translated)
    }
}

/// Join the translated segments of a `translate_a/single` response.
///
/// The response is a nested JSON array whose first element lists
/// `[translated, original, ...]` segments.
pub fn parse_gtx_response(body: &str) -> Result<String, TranslateError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| TranslateError::Malformed(e.to_string()))?;
    let segments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::Malformed("missing segment list".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();
    if translated.trim().is_empty() {
        return Err(TranslateError::Malformed("no translated segments".to_string()));
    }
    Ok(translated)
}
