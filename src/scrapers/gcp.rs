//! GCP release-notes collector.
//!
//! The [GCP release notes](https://cloud.google.com/release-notes) Atom feed
//! publishes one entry per day, each concatenating announcements for many
//! services. Entry bodies are cleaned, then split into per-service blocks at
//! every `<Service> <Category>` heading. Security advisories are dropped and
//! each remaining block becomes one [`UpdateItem`].
//!
//! Blocks carry no URL of their own, so every item links to the release
//! notes page.

use crate::dates::{self, DateHint};
use crate::models::{Provider, UpdateItem};
use crate::normalize::translate::Translate;
use crate::normalize::{Normalizer, SummaryMode};
use crate::scrapers::feed::{self, FeedEntry, FeedSource};
use crate::text::{Block, TextSegmenter};
use crate::window::DateWindow;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

/// Collect this week's GCP release-note blocks from `feed_url`.
#[instrument(level = "info", skip_all, fields(%feed_url, %window))]
pub async fn collect<F, T>(
    source: &F,
    feed_url: &str,
    release_notes_url: &str,
    window: &DateWindow,
    segmenter: &TextSegmenter,
    normalizer: &Normalizer<T>,
) -> Vec<UpdateItem>
where
    F: FeedSource,
    T: Translate,
{
    let entries = feed::load_entries(source, feed_url, Provider::Gcp).await;
    let total = entries.len();

    let items: Vec<UpdateItem> = stream::iter(entries)
        .filter_map(|entry| async move {
            let date = entry_date(&entry)?;
            window.admits(date).then_some((entry, date))
        })
        .then(|(entry, date)| async move {
            let content = segmenter.clean(entry.summary.as_deref().unwrap_or_default());
            let blocks = segmenter.segment(&content);
            debug!(%date, blocks = blocks.len(), "Segmented GCP entry");
            stream::iter(blocks)
                .then(|block| to_item(block, date, release_notes_url, normalizer))
                .collect::<Vec<_>>()
                .await
        })
        .concat()
        .await;

    info!(count = items.len(), entries = total, "Collected GCP updates");
    items
}

/// Entry date from `published`, else `updated`.
fn entry_date(entry: &FeedEntry) -> Option<NaiveDate> {
    let Some(raw) = entry.published.as_deref().or(entry.updated.as_deref()) else {
        warn!(title = ?entry.title, "Skipping GCP entry without a date");
        return None;
    };
    match dates::parse(raw, DateHint::Feed) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(title = ?entry.title, error = %e, "Skipping GCP entry with bad date");
            None
        }
    }
}

async fn to_item<T: Translate>(
    block: Block,
    date: NaiveDate,
    link: &str,
    normalizer: &Normalizer<T>,
) -> UpdateItem {
    let normalized = normalizer.normalize(&block.body, SummaryMode::RELEASE_NOTES).await;
    UpdateItem {
        source: Provider::Gcp,
        title: format!("{} ({})", block.service, block.category),
        date,
        summary: normalized.summary_text(&block.body),
        content: block.body,
        link: link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcpConfig;
    use crate::normalize::testing::TaggingTranslator;
    use crate::scrapers::feed::testing::{FixtureFeed, UnreachableFeed};

    const RELEASE_NOTES_URL: &str = "https://cloud.google.com/release-notes";

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Google Cloud release notes</title>
  <entry>
    <title>June 05, 2024</title>
    <updated>2024-06-05T00:00:00-07:00</updated>
    <link rel="alternate" href="https://cloud.google.com/release-notes#June_05_2024"/>
    <content type="html">&lt;h2&gt;Cloud Run&lt;/h2&gt;&lt;h3&gt;Feature&lt;/h3&gt;
      &lt;p&gt;Cloud Run services can now mount Cloud Storage buckets
      and NFS shares as volumes.&lt;/p&gt;
      &lt;h2&gt;Security Command Center&lt;/h2&gt;&lt;h3&gt;Feature&lt;/h3&gt;
      &lt;p&gt;New detectors are available.&lt;/p&gt;
      &lt;h2&gt;Compute Engine&lt;/h2&gt;&lt;h3&gt;Announcement&lt;/h3&gt;
      &lt;p&gt;A fix for CVE-2024-1234 is rolling out to all images.&lt;/p&gt;
      &lt;h2&gt;BigQuery&lt;/h2&gt;&lt;h3&gt;Announcement&lt;/h3&gt;
      &lt;p&gt;Editions pricing changes take effect next month.&lt;/p&gt;</content>
  </entry>
  <entry>
    <title>May 30, 2024</title>
    <updated>2024-05-30T00:00:00-07:00</updated>
    <content type="html">&lt;h2&gt;Cloud SQL&lt;/h2&gt;&lt;h3&gt;Feature&lt;/h3&gt;
      &lt;p&gt;Old news.&lt;/p&gt;</content>
  </entry>
  <entry>
    <title>Undated</title>
    <content type="html">&lt;h2&gt;GKE&lt;/h2&gt;&lt;h3&gt;Feature&lt;/h3&gt;
      &lt;p&gt;No date.&lt;/p&gt;</content>
  </entry>
</feed>"#;

    fn window() -> DateWindow {
        DateWindow::compute(NaiveDate::from_ymd_opt(2024, 6, 5).unwrap())
    }

    async fn run(source: &impl FeedSource) -> Vec<UpdateItem> {
        let segmenter = GcpConfig::default().segmenter().unwrap();
        let normalizer = Normalizer::new(TaggingTranslator::default());
        collect(
            source,
            "https://gcp.example/feed.xml",
            RELEASE_NOTES_URL,
            &window(),
            &segmenter,
            &normalizer,
        )
        .await
    }

    #[tokio::test]
    async fn test_splits_entry_into_service_blocks() {
        let items = run(&FixtureFeed(FEED.to_string())).await;

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Cloud Run (Feature)", "BigQuery (Announcement)"]);
        let date = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        for item in &items {
            assert_eq!(item.source, Provider::Gcp);
            assert_eq!(item.date, date);
            assert_eq!(item.link, RELEASE_NOTES_URL);
            assert!(item.summary.starts_with("[ko] "));
        }
        assert_eq!(
            items[0].content,
            "Cloud Run services can now mount Cloud Storage buckets and NFS shares as volumes."
        );
    }

    #[tokio::test]
    async fn test_short_block_summary_falls_back_to_body() {
        let items = run(&FixtureFeed(FEED.to_string())).await;
        let bigquery = &items[1];
        assert_eq!(
            bigquery.summary,
            "[ko] Editions pricing changes take effect next month."
        );
    }

    #[tokio::test]
    async fn test_unreachable_feed_yields_nothing() {
        assert!(run(&UnreachableFeed).await.is_empty());
    }

    #[test]
    fn test_entry_date_prefers_published() {
        let entry = FeedEntry {
            published: Some("2024-06-04T12:00:00Z".to_string()),
            updated: Some("2024-06-06T12:00:00Z".to_string()),
            ..FeedEntry::default()
        };
        assert_eq!(entry_date(&entry), NaiveDate::from_ymd_opt(2024, 6, 4));

        let entry = FeedEntry {
            published: Some("Tue, 04 Jun 2024 17:00:00 +0000".to_string()),
            updated: Some("2024-06-06T12:00:00Z".to_string()),
            ..FeedEntry::default()
        };
        assert_eq!(entry_date(&entry), NaiveDate::from_ymd_opt(2024, 6, 4));

        let entry = FeedEntry {
            updated: Some("2024-06-06T12:00:00Z".to_string()),
            ..FeedEntry::default()
        };
        assert_eq!(entry_date(&entry), NaiveDate::from_ymd_opt(2024, 6, 6));
        assert_eq!(entry_date(&FeedEntry::default()), None);
    }
}
