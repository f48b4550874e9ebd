//! Azure updates collector.
//!
//! The [Azure updates](https://azure.microsoft.com/en-us/updates) listing is
//! rendered client-side and paginated, so it is driven through a
//! [`ListingBrowser`]. Entries are listed newest first, which allows an early
//! stop: once entries older than the window start appear, every later entry
//! and page is older too, and pagination ends there.
//!
//! # Flow
//!
//! 1. Open the listing (failure aborts this collector with no items)
//! 2. Read the pagination control to find the last page (default 1)
//! 3. Per page: scroll, settle, parse entries, admit or stop
//! 4. Advance by clicking the next page number until stopped or done

use crate::dates::{self, DateHint, LISTING_DATE_FORMAT};
use crate::models::{Provider, UpdateItem};
use crate::normalize::translate::Translate;
use crate::normalize::{Normalizer, SummaryMode};
use crate::scrapers::browser::ListingBrowser;
use crate::text::CleanRules;
use crate::window::{DateWindow, Placement};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Base of the per-update permalinks.
pub const PERMALINK_BASE: &str = "https://azure.microsoft.com/updates";

static ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li.ocr-faq-item.accordion_bg").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h2.lead").unwrap());
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.accordion-item.col-xl-8").unwrap());
static MODIFIED_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.updated_dates div.modified_date span").unwrap());
static CREATED_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.updated_dates div.created_date span").unwrap());
static SHARE_RSS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[data-bi-cn="Accordion detail - Share RSS"]"#).unwrap());

/// Navigation and timing settings for the listing.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    pub listing_url: String,
    pub navigation_timeout: Duration,
    pub initial_wait: Duration,
    pub settle_delay: Duration,
    pub page_wait: Duration,
    /// Older-than-window entries in a row that end pagination (at least 1).
    pub stop_after_consecutive: u32,
}

/// One entry as parsed from a rendered listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub content: String,
    /// Modified date label, else created date label.
    pub date_label: Option<String>,
    /// Permalink derived from the share-RSS control, or empty.
    pub link: String,
}

/// Whether pagination should go on after a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageFlow {
    Continue,
    Stop,
}

/// Counts consecutive older-than-window entries.
#[derive(Debug)]
struct StopRule {
    threshold: u32,
    consecutive: u32,
}

impl StopRule {
    fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
        }
    }

    /// Record an older entry; true once the threshold is reached.
    fn older(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= self.threshold
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Collect this week's Azure updates.
///
/// Consumes the browser session; it is released before this returns on
/// every path.
#[instrument(level = "info", skip_all, fields(url = %options.listing_url, %window))]
pub async fn collect<B, T>(
    mut browser: B,
    options: &ListingOptions,
    window: &DateWindow,
    normalizer: &Normalizer<T>,
) -> Vec<UpdateItem>
where
    B: ListingBrowser,
    T: Translate,
{
    info!("Collecting Azure updates");
    if let Err(e) = browser.open(&options.listing_url, options.navigation_timeout).await {
        error!(error = %e, "Azure listing failed to load; skipping source");
        return Vec::new();
    }
    sleep(options.initial_wait).await;

    let last_page = match browser.pagination_labels().await {
        Ok(labels) => last_page(&labels),
        Err(e) => {
            warn!(error = %e, "Could not read pagination; assuming a single page");
            1
        }
    };
    debug!(last_page, "Discovered page count");

    let mut items = Vec::new();
    let mut stop_rule = StopRule::new(options.stop_after_consecutive);
    let mut page = 1;
    loop {
        let flow = collect_page(
            &mut browser,
            page,
            options,
            window,
            normalizer,
            &mut stop_rule,
            &mut items,
        )
        .await;
        if flow == PageFlow::Stop {
            info!(page, "Reached entries older than the window; stopping pagination");
            break;
        }
        if page >= last_page {
            break;
        }
        if let Err(e) = browser.goto_page(page + 1, options.page_wait).await {
            warn!(
                page = page + 1,
                error = %e,
                "Could not advance pagination; keeping collected items"
            );
            break;
        }
        page += 1;
    }
    drop(browser);

    info!(count = items.len(), pages = page, "Collected Azure updates");
    items
}

async fn collect_page<B, T>(
    browser: &mut B,
    page: u32,
    options: &ListingOptions,
    window: &DateWindow,
    normalizer: &Normalizer<T>,
    stop_rule: &mut StopRule,
    items: &mut Vec<UpdateItem>,
) -> PageFlow
where
    B: ListingBrowser,
    T: Translate,
{
    if let Err(e) = browser.scroll_to_bottom().await {
        warn!(page, error = %e, "Scroll failed; reading page as rendered");
    }
    sleep(options.settle_delay).await;

    let html = match browser.content().await {
        Ok(html) => html,
        Err(e) => {
            warn!(page, error = %e, "Could not read page content");
            return PageFlow::Stop;
        }
    };
    let entries = parse_listing(&html);
    debug!(page, count = entries.len(), "Parsed listing entries");

    for entry in entries {
        let Some(label) = entry.date_label.as_deref() else {
            debug!(page, title = %entry.title, "Entry has no date label; skipping");
            continue;
        };
        let date = match dates::parse(label, DateHint::Explicit(LISTING_DATE_FORMAT)) {
            Ok(date) => date,
            Err(e) => {
                warn!(page, title = %entry.title, error = %e, "Skipping entry with bad date");
                continue;
            }
        };

        match window.placement(date) {
            Placement::Before => {
                if stop_rule.older() {
                    return PageFlow::Stop;
                }
            }
            Placement::After => {
                stop_rule.reset();
                debug!(page, %date, "Entry is newer than the window; skipping");
            }
            Placement::Within => {
                stop_rule.reset();
                if entry.title.is_empty() {
                    warn!(page, %date, "Skipping entry without a title");
                    continue;
                }
                let normalized = normalizer.normalize(&entry.content, SummaryMode::LISTING).await;
                let summary = normalized.summary_text(&entry.content);
                items.push(UpdateItem {
                    source: Provider::Azure,
                    title: entry.title,
                    date,
                    content: entry.content,
                    link: entry.link,
                    summary,
                });
            }
        }
    }
    PageFlow::Continue
}

/// Highest numeric pagination label, or 1 when there is none.
pub fn last_page(labels: &[String]) -> u32 {
    labels
        .iter()
        .filter_map(|label| label.trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Extract every update entry from a rendered listing page.
pub fn parse_listing(html: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let plain = CleanRules::plain();
    document
        .select(&ITEM)
        .map(|item| ListingEntry {
            title: first_text(item, &TITLE).unwrap_or_default(),
            content: item
                .select(&CONTENT)
                .next()
                .map(|el| plain.clean(&el.inner_html()))
                .unwrap_or_default(),
            date_label: first_text(item, &MODIFIED_DATE)
                .or_else(|| first_text(item, &CREATED_DATE)),
            link: item
                .select(&SHARE_RSS)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(permalink)
                .unwrap_or_default(),
        })
        .collect()
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let el = scope.select(selector).next()?;
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Turn a share-RSS href into an update permalink via its trailing identifier.
fn permalink(rss_href: &str) -> String {
    let id = rss_href.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if id.is_empty() {
        return String::new();
    }
    Url::parse_with_params(PERMALINK_BASE, &[("id", id)])
        .map(String::from)
        .unwrap_or_default()
}
