//! Text cleaning and multi-block segmentation of feed bodies.
//!
//! Two modes share one [`TextSegmenter`]:
//!
//! 1. **Single-clean**: HTML to plain text, whitespace collapsed, URLs and
//!    boilerplate removed. Every collector uses this.
//! 2. **Multi-block**: a cleaned release-notes body that concatenates several
//!    per-service announcements is split at each `<Service> <Category> `
//!    heading. Only the GCP collector uses this.
//!
//! The phrase lists and the heading pattern are data ([`CleanRules`],
//! [`BlockRules`]) so they can come from configuration and be tested
//! without any network fetching.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::ops::Range;
use thiserror::Error;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// Default release-notes heading: a capitalised service name followed by
/// one of the known categories.
pub const DEFAULT_HEADING_PATTERN: &str =
    r"(?P<service>[A-Z][a-zA-Z0-9\s\-\(\)]+)\s+(?P<category>Feature|Announcement)\s+";
pub const DEFAULT_SECURITY_MARKER: &str = "Security";
/// Any CVE mention, including placeholders such as `CVE-pending`.
pub const DEFAULT_VULNERABILITY_PATTERN: &str = "CVE-";

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("heading pattern {0:?} must define the `service` and `category` groups")]
    MissingGroups(String),
}

fn compile(pattern: &str) -> Result<Regex, RulesError> {
    Regex::new(pattern).map_err(|source| RulesError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Boilerplate removal rules for single-clean mode.
#[derive(Debug, Clone)]
pub struct CleanRules {
    /// Case-insensitive alternation of every "read more" phrase.
    read_more: Option<Regex>,
    /// Marketing-filler sentence patterns, applied in order.
    filler: Vec<Regex>,
}

impl CleanRules {
    /// Build rules from literal read-more phrases and filler regexes.
    pub fn new<S: AsRef<str>>(read_more: &[S], filler: &[S]) -> Result<Self, RulesError> {
        let read_more = if read_more.is_empty() {
            None
        } else {
            let alternation = read_more
                .iter()
                .map(|p| regex::escape(p.as_ref()))
                .collect::<Vec<_>>()
                .join("|");
            Some(compile(&format!("(?i)(?:{alternation})"))?)
        };
        let filler = filler
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { read_more, filler })
    }

    /// No phrase removal; HTML, whitespace and URLs only.
    pub fn plain() -> Self {
        Self {
            read_more: None,
            filler: Vec::new(),
        }
    }

    /// Reduce an HTML fragment to a single line of plain text.
    pub fn clean(&self, html: &str) -> String {
        let text = html_to_text(html);
        let text = WHITESPACE.replace_all(&text, " ");
        let mut text = URL.replace_all(&text, "").into_owned();
        if let Some(read_more) = &self.read_more {
            text = read_more.replace_all(&text, "").into_owned();
        }
        for pattern in &self.filler {
            text = pattern.replace_all(&text, "").into_owned();
        }
        WHITESPACE.replace_all(text.trim(), " ").into_owned()
    }
}

fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Location of one heading and its body inside a segmented text.
///
/// `heading.end == body.start`, and each body ends where the next heading
/// starts (or at the end of the text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub service: String,
    pub category: String,
    pub heading: Range<usize>,
    pub body: Range<usize>,
}

/// One announcement extracted from a compound entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub service: String,
    pub category: String,
    /// Trimmed body text.
    pub body: String,
}

/// Heading pattern and discard rules for multi-block mode.
#[derive(Debug, Clone)]
pub struct BlockRules {
    heading: Regex,
    security_marker: String,
    vulnerability: Regex,
}

impl BlockRules {
    /// `heading` must define the named groups `service` and `category`.
    pub fn new(
        heading: &str,
        security_marker: &str,
        vulnerability: &str,
    ) -> Result<Self, RulesError> {
        let heading_re = compile(heading)?;
        let names: Vec<_> = heading_re.capture_names().flatten().collect();
        if !names.contains(&"service") || !names.contains(&"category") {
            return Err(RulesError::MissingGroups(heading.to_string()));
        }
        Ok(Self {
            heading: heading_re,
            security_marker: security_marker.to_string(),
            vulnerability: compile(vulnerability)?,
        })
    }

    /// Every heading occurrence in match order, with the span of its body.
    pub fn locate(&self, text: &str) -> Vec<BlockSpan> {
        let headings: Vec<_> = self
            .heading
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((
                    whole.range(),
                    caps.name("service")?.as_str().trim().to_string(),
                    caps.name("category")?.as_str().trim().to_string(),
                ))
            })
            .collect();

        headings
            .iter()
            .enumerate()
            .map(|(i, (range, service, category))| {
                let body_end = headings
                    .get(i + 1)
                    .map(|(next, _, _)| next.start)
                    .unwrap_or(text.len());
                BlockSpan {
                    service: service.clone(),
                    category: category.clone(),
                    heading: range.clone(),
                    body: range.end..body_end,
                }
            })
            .collect()
    }

    /// Split `text` into blocks, dropping empty bodies and security advisories.
    pub fn segment(&self, text: &str) -> Vec<Block> {
        self.locate(text)
            .into_iter()
            .filter_map(|span| {
                let body = text[span.body.clone()].trim();
                if body.is_empty() || self.is_security(&span.service, body) {
                    return None;
                }
                Some(Block {
                    service: span.service,
                    category: span.category,
                    body: body.to_string(),
                })
            })
            .collect()
    }

    fn is_security(&self, service: &str, body: &str) -> bool {
        service.contains(&self.security_marker) || self.vulnerability.is_match(body)
    }
}

impl Default for BlockRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_HEADING_PATTERN,
            DEFAULT_SECURITY_MARKER,
            DEFAULT_VULNERABILITY_PATTERN,
        )
        .expect("default block rules are valid")
    }
}

/// Cleaning rules plus optional block segmentation for one provider.
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    clean: CleanRules,
    blocks: BlockRules,
}

impl TextSegmenter {
    pub fn new(clean: CleanRules, blocks: BlockRules) -> Self {
        Self { clean, blocks }
    }

    /// Single-clean mode.
    pub fn clean(&self, html: &str) -> String {
        self.clean.clean(html)
    }

    /// Multi-block mode over already-cleaned text.
    pub fn segment(&self, text: &str) -> Vec<Block> {
        self.blocks.segment(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE_NOTES: &str = "Cloud Run Feature You can now mount volumes. \
        BigQuery Announcement Editions pricing changes next month. \
        Vertex AI Feature Gemini 1.5 Pro is generally available.";

    #[test]
    fn test_clean_strips_html_and_collapses_whitespace() {
        let rules = CleanRules::plain();
        let html = "<p>Amazon   S3\n now <b>supports</b></p>\n\n<p>conditional writes.</p>";
        assert_eq!(rules.clean(html), "Amazon S3 now supports conditional writes.");
    }

    #[test]
    fn test_clean_strips_urls_and_read_more() {
        let rules = CleanRules::new(&["Learn more", "자세히 보기"], &[]).unwrap();
        let html = "<p>New console. See https://example.com/docs?x=1 for details. \
            LEARN MORE 자세히 보기</p>";
        assert_eq!(rules.clean(html), "New console. See for details.");
    }

    #[test]
    fn test_clean_strips_filler_sentences() {
        let rules = CleanRules::new::<&str>(
            &[],
            &[r"To learn more.*?\.", r"This feature is available.*?\."],
        )
        .unwrap();
        let text = "Lambda adds a new runtime. This feature is available in all Regions. \
            To learn more, read the docs.";
        assert_eq!(rules.clean(text), "Lambda adds a new runtime.");
    }

    #[test]
    fn test_clean_decodes_entities() {
        assert_eq!(CleanRules::plain().clean("A &amp; B &lt;tag&gt;"), "A & B <tag>");
    }

    #[test]
    fn test_invalid_filler_pattern_is_rejected() {
        assert!(CleanRules::new::<&str>(&[], &["(unclosed"]).is_err());
    }

    #[test]
    fn test_heading_pattern_requires_groups() {
        let err = BlockRules::new(r"([A-Z]\w+) Feature ", "Security", "CVE-").unwrap_err();
        assert!(matches!(err, RulesError::MissingGroups(_)));
    }

    #[test]
    fn test_segment_preserves_heading_order() {
        let blocks = BlockRules::default().segment(RELEASE_NOTES);
        let names: Vec<_> = blocks
            .iter()
            .map(|b| (b.service.as_str(), b.category.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Cloud Run", "Feature"),
                ("BigQuery", "Announcement"),
                ("Vertex AI", "Feature"),
            ]
        );
        assert_eq!(blocks[0].body, "You can now mount volumes.");
        assert_eq!(blocks[2].body, "Gemini 1.5 Pro is generally available.");
    }

    #[test]
    fn test_spans_reconstruct_text() {
        let rules = BlockRules::default();
        let text = format!("Preamble. {RELEASE_NOTES}");
        let spans = rules.locate(&text);
        assert_eq!(spans.len(), 3);

        let first = spans[0].heading.start;
        let rebuilt: String = spans
            .iter()
            .map(|s| {
                assert_eq!(s.heading.end, s.body.start);
                format!("{}{}", &text[s.heading.clone()], &text[s.body.clone()])
            })
            .collect();
        assert_eq!(rebuilt, text[first..]);
        assert_eq!(spans.last().unwrap().body.end, text.len());
    }

    #[test]
    fn test_segment_discards_empty_and_security_blocks() {
        let text = "Security Command Center Feature New detectors. \
            GKE Announcement Patched CVE-2024-1234 in node images. \
            Cloud Storage Feature Soft delete is on by default. \
            Cloud SQL Feature   ";
        assert_eq!(BlockRules::default().locate(text).len(), 4);
        let blocks = BlockRules::default().segment(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].service, "Cloud Storage");
        assert_eq!(blocks[0].body, "Soft delete is on by default.");
    }

    #[test]
    fn test_segment_discards_any_cve_mention() {
        let text = "Compute Engine Feature Fix for CVE-pending issue in guest agent. \
            Cloud Build Announcement Private pools are cheaper. \
            Dataflow Feature Streaming autoscaling is generally available.";
        let blocks = BlockRules::default().segment(text);
        let services: Vec<_> = blocks.iter().map(|b| b.service.as_str()).collect();
        assert_eq!(services, ["Cloud Build", "Dataflow"]);
    }

    #[test]
    fn test_segment_without_headings_is_empty() {
        assert!(BlockRules::default().segment("no headings here at all").is_empty());
    }

    #[test]
    fn test_segmenter_combines_modes() {
        let segmenter = TextSegmenter::new(
            CleanRules::new::<&str>(&["Learn more"], &[]).unwrap(),
            BlockRules::default(),
        );
        let cleaned = segmenter.clean(
            "<h3>Cloud Run Feature</h3><p>Volume mounts. Learn more</p>\
             <h3>Dataflow Announcement</h3><p>New pricing https://cloud.google.com/x</p>",
        );
        let blocks = segmenter.segment(&cleaned);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].body, "Volume mounts.");
        assert_eq!(blocks[1].body, "New pricing");
    }
}
