//! Headless browser session used by the paginated listing collector.
//!
//! The listing renders lazily with client-side pagination, so it needs a real
//! browser. [`ListingBrowser`] is the seam the collector drives;
//! [`HeadlessBrowser`] implements it over Chrome via `headless_chrome`.
//!
//! The session is released when the value is dropped, so every exit path of
//! the collector (completion, early stop, navigation failure) frees the
//! browser process.

use headless_chrome::{Browser, LaunchOptions, Tab};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument};

/// Every entry of the listing's pagination control.
pub const PAGINATION_ITEMS: &str = "ul#pagination li";
/// The pagination entry of the page currently shown.
pub const ACTIVE_PAGE: &str = "ul#pagination li.active";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("browser command failed: {0}")]
    Driver(String),
    #[error("pagination has no entry for page {0}")]
    NoSuchPage(u32),
    #[error("page {page} did not become active within {waited:?}")]
    PageTimeout { page: u32, waited: Duration },
}

fn driver(e: impl Display) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

/// Operations the paginated collector needs from a browser session.
pub trait ListingBrowser {
    /// Navigate to `url`, giving up after `timeout`.
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Text of every pagination entry, in document order. Empty when the
    /// listing has no pagination control.
    async fn pagination_labels(&mut self) -> Result<Vec<String>, BrowserError>;

    /// Scroll to the bottom so lazily loaded entries render.
    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError>;

    /// Current rendered HTML.
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Click pagination entry `page` and wait up to `wait` for it to be active.
    async fn goto_page(&mut self, page: u32, wait: Duration) -> Result<(), BrowserError>;
}

/// A Chrome session with a single tab.
pub struct HeadlessBrowser {
    // Held for its Drop, which terminates the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl HeadlessBrowser {
    #[instrument(level = "info")]
    pub fn launch(headless: bool) -> Result<Self, BrowserError> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        debug!("Browser session started");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn label_of(element: &headless_chrome::Element<'_>) -> Result<String, BrowserError> {
        element.get_inner_text().map(|t| t.trim().to_string()).map_err(driver)
    }

    fn active_page_is(&self, label: &str) -> bool {
        self.tab
            .find_elements(ACTIVE_PAGE)
            .map(|active| {
                active
                    .iter()
                    .any(|e| Self::label_of(e).is_ok_and(|t| t == label))
            })
            .unwrap_or(false)
    }
}

impl ListingBrowser for HeadlessBrowser {
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let tab = Arc::clone(&self.tab);
        tokio::task::block_in_place(|| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(url)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
        })
    }

    async fn pagination_labels(&mut self) -> Result<Vec<String>, BrowserError> {
        tokio::task::block_in_place(|| match self.tab.find_elements(PAGINATION_ITEMS) {
            Ok(items) => items.iter().map(Self::label_of).collect(),
            // headless_chrome reports "no match" as an error.
            Err(e) => {
                debug!(error = %e, "No pagination control found");
                Ok(Vec::new())
            }
        })
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError> {
        tokio::task::block_in_place(|| {
            self.tab
                .evaluate("window.scrollTo(0, document.body.scrollHeight)", false)
                .map(|_| ())
                .map_err(driver)
        })
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        tokio::task::block_in_place(|| self.tab.get_content().map_err(driver))
    }

    async fn goto_page(&mut self, page: u32, wait: Duration) -> Result<(), BrowserError> {
        let label = page.to_string();
        tokio::task::block_in_place(|| {
            let items = self.tab.find_elements(PAGINATION_ITEMS).map_err(driver)?;
            let target = items
                .iter()
                .find(|e| Self::label_of(e).is_ok_and(|t| t == label))
                .ok_or(BrowserError::NoSuchPage(page))?;
            target.click().map_err(driver)?;

            let deadline = Instant::now() + wait;
            while !self.active_page_is(&label) {
                if Instant::now() >= deadline {
                    return Err(BrowserError::PageTimeout { page, waited: wait });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Ok(())
        })
    }
}

impl Drop for HeadlessBrowser {
    fn drop(&mut self) {
        debug!("Browser session released");
    }
}
