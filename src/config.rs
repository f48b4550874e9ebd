//! Run configuration loaded from an optional YAML file.
//!
//! Every field has a default, so a missing file or a partial file both work.
//! Timeouts and delays are expressed in milliseconds.
//!
//! ```yaml
//! azure:
//!   stop_after_consecutive: 3
//! gcp:
//!   heading_pattern: '(?P<service>[A-Z][\w ]+)\s+(?P<category>Feature|Announcement|Change)\s+'
//! delivery:
//!   attempts: 5
//! ```

use crate::scrapers::azure::ListingOptions;
use crate::text::{
    BlockRules, CleanRules, RulesError, TextSegmenter, DEFAULT_HEADING_PATTERN,
    DEFAULT_SECURITY_MARKER, DEFAULT_VULNERABILITY_PATTERN,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid text rules: {0}")]
    Rules(#[from] RulesError),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DigestConfig {
    pub azure: AzureConfig,
    pub aws: AwsConfig,
    pub gcp: GcpConfig,
    pub translation: TranslationConfig,
    pub delivery: DeliveryConfig,
}

impl DigestConfig {
    /// Load from `path`, or use defaults when no path is given.
    ///
    /// Text rules are compiled once here so bad patterns fail at startup.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_string(),
                    source,
                })?;
                let config = Self::from_yaml(&raw)?;
                info!(%path, "Loaded configuration file");
                config
            }
            None => Self::default(),
        };
        config.aws.segmenter()?;
        config.gcp.segmenter()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// Azure updates listing (browser-driven).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AzureConfig {
    pub listing_url: String,
    pub navigation_timeout_ms: u64,
    /// Wait after the first navigation before reading pagination.
    pub initial_wait_ms: u64,
    /// Wait after scrolling to the bottom of each page.
    pub settle_delay_ms: u64,
    /// Maximum wait for the next page to become active.
    pub page_wait_ms: u64,
    /// Older-than-window items in a row before pagination stops.
    pub stop_after_consecutive: u32,
    pub headless: bool,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://azure.microsoft.com/en-us/updates?filters=%5B%22Launched%22%5D"
                .to_string(),
            navigation_timeout_ms: 10_000,
            initial_wait_ms: 3_000,
            settle_delay_ms: 2_000,
            page_wait_ms: 5_000,
            stop_after_consecutive: 1,
            headless: true,
        }
    }
}

impl AzureConfig {
    pub fn listing_options(&self) -> ListingOptions {
        ListingOptions {
            listing_url: self.listing_url.clone(),
            navigation_timeout: Duration::from_millis(self.navigation_timeout_ms),
            initial_wait: Duration::from_millis(self.initial_wait_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            page_wait: Duration::from_millis(self.page_wait_ms),
            stop_after_consecutive: self.stop_after_consecutive.max(1),
        }
    }
}

/// AWS "What's New" RSS feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AwsConfig {
    pub feed_url: String,
    pub fetch_timeout_ms: u64,
    /// Literal phrases removed case-insensitively.
    pub read_more: Vec<String>,
    /// Regexes for marketing filler sentences.
    pub filler: Vec<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://aws.amazon.com/new/feed/".to_string(),
            fetch_timeout_ms: 30_000,
            read_more: vec!["자세히 보기".to_string()],
            filler: [
                r"이 새로운 기능은.*?사용할 수 있습니다\.",
                r"자세한 내용은.*?참고하세요\.",
                r"고객은.*?사용할 수 있습니다\.",
                r"To learn more.*?\.",
                r"(?:This|The) (?:new )?(?:feature|capability) is (?:now )?available in.*?\.",
                r"For more information.*?\.",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl AwsConfig {
    pub fn segmenter(&self) -> Result<TextSegmenter, RulesError> {
        Ok(TextSegmenter::new(
            CleanRules::new(&self.read_more, &self.filler)?,
            BlockRules::default(),
        ))
    }
}

/// GCP release-notes Atom feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GcpConfig {
    pub feed_url: String,
    /// Link shared by every GCP item; the feed has no per-block URL.
    pub release_notes_url: String,
    pub fetch_timeout_ms: u64,
    pub read_more: Vec<String>,
    pub filler: Vec<String>,
    /// Must define the `service` and `category` named groups.
    pub heading_pattern: String,
    pub security_marker: String,
    pub vulnerability_pattern: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://cloud.google.com/feeds/gcp-release-notes.xml".to_string(),
            release_notes_url: "https://cloud.google.com/release-notes".to_string(),
            fetch_timeout_ms: 30_000,
            read_more: vec!["자세히 보기".to_string(), "Learn more".to_string()],
            filler: Vec::new(),
            heading_pattern: DEFAULT_HEADING_PATTERN.to_string(),
            security_marker: DEFAULT_SECURITY_MARKER.to_string(),
            vulnerability_pattern: DEFAULT_VULNERABILITY_PATTERN.to_string(),
        }
    }
}

impl GcpConfig {
    pub fn segmenter(&self) -> Result<TextSegmenter, RulesError> {
        Ok(TextSegmenter::new(
            CleanRules::new(&self.read_more, &self.filler)?,
            BlockRules::new(
                &self.heading_pattern,
                &self.security_marker,
                &self.vulnerability_pattern,
            )?,
        ))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub source: String,
    pub target: String,
    pub timeout_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::normalize::translate::DEFAULT_ENDPOINT.to_string(),
            source: "en".to_string(),
            target: "ko".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 3_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_compile() {
        let config = DigestConfig::load(None).unwrap();
        assert_eq!(config.delivery.attempts, 3);
        assert_eq!(config.delivery.backoff_ms, 3_000);
        assert_eq!(config.azure.navigation_timeout_ms, 10_000);
        assert_eq!(config.translation.target, "ko");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = DigestConfig::from_yaml(
            "azure:\n  stop_after_consecutive: 3\ndelivery:\n  attempts: 5\n",
        )
        .unwrap();
        assert_eq!(config.azure.stop_after_consecutive, 3);
        assert_eq!(config.azure.page_wait_ms, 5_000);
        assert_eq!(config.delivery.attempts, 5);
        assert_eq!(config.delivery.backoff_ms, 3_000);
        assert_eq!(config.gcp.security_marker, "Security");
    }

    #[test]
    fn test_listing_options_never_stop_after_zero() {
        let azure = AzureConfig {
            stop_after_consecutive: 0,
            ..AzureConfig::default()
        };
        assert_eq!(azure.listing_options().stop_after_consecutive, 1);
        assert_eq!(azure.listing_options().settle_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_bad_heading_pattern_fails_load() {
        let path = std::env::temp_dir().join(format!("cud_config_{}.yaml", std::process::id()));
        std::fs::write(&path, "gcp:\n  heading_pattern: '([A-Z]+) Feature '\n").unwrap();

        let err = DigestConfig::load(path.to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Rules(RulesError::MissingGroups(_))));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DigestConfig::load(Some("/nonexistent/cud.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_aws_segmenter_strips_filler() {
        let segmenter = DigestConfig::default().aws.segmenter().unwrap();
        let cleaned = segmenter.clean(
            "<p>Amazon EKS now supports Kubernetes 1.30. \
             This feature is available in all commercial Regions. \
             To learn more, visit the <a href=\"https://docs.aws.amazon.com/eks/\">docs</a>.</p>",
        );
        assert_eq!(cleaned, "Amazon EKS now supports Kubernetes 1.30.");
    }
}
