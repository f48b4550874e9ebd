//! Per-provider collectors for cloud product updates.
//!
//! Each collector fetches one provider's source, keeps the entries dated
//! inside the reporting window, normalizes their bodies and returns them as
//! [`UpdateItem`](crate::models::UpdateItem)s.
//!
//! # Supported Sources
//!
//! | Provider | Module | Method | Notes |
//! |----------|--------|--------|-------|
//! | Azure | [`azure`] | Headless browser | Paginated listing, stops early at older entries |
//! | AWS | [`aws`] | RSS feed | One announcement per entry |
//! | GCP | [`gcp`] | Atom feed | One entry per day, split into service blocks |
//!
//! # Common Patterns
//!
//! Collectors never fail the run. A source that cannot be reached yields no
//! items, and an entry with a missing title or unparseable date is logged
//! and skipped. Network access sits behind the [`browser::ListingBrowser`]
//! and [`feed::FeedSource`] traits so collectors can be driven from fixtures.

pub mod aws;
pub mod azure;
pub mod browser;
pub mod feed;
pub mod gcp;
