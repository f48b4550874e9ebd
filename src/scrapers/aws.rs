//! AWS "What's New" collector.
//!
//! Reads the [AWS What's New](https://aws.amazon.com/new/) RSS feed. Every
//! item is a single announcement, so bodies are cleaned in single-clean mode
//! and summarized to one sentence.

use crate::dates::{self, DateHint, Unparseable};
use crate::models::{Provider, UpdateItem};
use crate::normalize::translate::Translate;
use crate::normalize::{Normalizer, SummaryMode};
use crate::scrapers::feed::{self, FeedEntry, FeedSource};
use crate::text::TextSegmenter;
use crate::window::DateWindow;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Why a feed entry was left out of the digest.
#[derive(Debug, Error)]
enum EntryError {
    #[error("entry has no title")]
    MissingTitle,
    #[error("entry has no publication date")]
    MissingDate,
    #[error(transparent)]
    Date(#[from] Unparseable),
}

/// Collect this week's AWS announcements from `feed_url`.
#[instrument(level = "info", skip_all, fields(%feed_url, %window))]
pub async fn collect<F, T>(
    source: &F,
    feed_url: &str,
    window: &DateWindow,
    segmenter: &TextSegmenter,
    normalizer: &Normalizer<T>,
) -> Vec<UpdateItem>
where
    F: FeedSource,
    T: Translate,
{
    let entries = feed::load_entries(source, feed_url, Provider::Aws).await;
    let total = entries.len();

    let items: Vec<UpdateItem> = stream::iter(entries)
        .filter_map(|entry| async move {
            let (title, date) = match admit(&entry) {
                Ok(admitted) => admitted,
                Err(e) => {
                    warn!(error = %e, title = ?entry.title, "Skipping AWS entry");
                    return None;
                }
            };
            if !window.admits(date) {
                debug!(%title, %date, "AWS entry outside the window");
                return None;
            }
            let content = segmenter.clean(entry.summary.as_deref().unwrap_or_default());
            let normalized = normalizer.normalize(&content, SummaryMode::FEED).await;
            Some(UpdateItem {
                source: Provider::Aws,
                title,
                date,
                summary: normalized.summary_text(&content),
                content,
                link: entry.link.unwrap_or_default(),
            })
        })
        .collect()
        .await;

    info!(count = items.len(), entries = total, "Collected AWS updates");
    items
}

fn admit(entry: &FeedEntry) -> Result<(String, NaiveDate), EntryError> {
    let title = entry
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(EntryError::MissingTitle)?;
    let raw = entry.published.as_deref().ok_or(EntryError::MissingDate)?;
    let date = dates::parse(raw, DateHint::Feed)?;
    Ok((title.to_string(), date))
}
