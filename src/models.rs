//! Data models for collected cloud updates and the run-wide aggregate.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Provider`]: The cloud provider an update was collected from
//! - [`UpdateItem`]: One normalized announcement, ready for reporting
//! - [`Aggregator`]: The ordered, append-only collection of every item in a run

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The cloud provider an update belongs to.
///
/// Declaration order is the order providers appear in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Provider {
    #[serde(rename = "Azure")]
    Azure,
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "GCP")]
    Gcp,
}

impl Provider {
    /// Every provider in report order.
    pub const ALL: [Provider; 3] = [Provider::Azure, Provider::Aws, Provider::Gcp];

    /// Display label used in logs, JSON and the digest.
    pub fn label(self) -> &'static str {
        match self {
            Provider::Azure => "Azure",
            Provider::Aws => "AWS",
            Provider::Gcp => "GCP",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single normalized product-update announcement.
///
/// Built by a collector once filtering and normalization are done (or
/// degraded), then handed to the [`Aggregator`] and never touched again.
///
/// # Fields
///
/// * `date` - Serialized as `YYYY-MM-DD`
/// * `link` - Absolute URL, or an empty string when none could be resolved
/// * `summary` - Translated summary, or the best degraded fallback
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpdateItem {
    /// The provider the item was collected from.
    pub source: Provider,
    /// The announcement title.
    pub title: String,
    /// The announcement date, inside the run's window at admission time.
    pub date: NaiveDate,
    /// Cleaned plain-text body.
    pub content: String,
    /// Permalink to the announcement.
    pub link: String,
    /// Short, translated summary.
    pub summary: String,
}

/// The run-wide collection of every admitted [`UpdateItem`].
///
/// Items from one collector stay contiguous and keep their collection order;
/// a collector's items precede another's iff it ran first.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Aggregator {
    items: Vec<UpdateItem>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every item a collector returned, preserving its order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = UpdateItem>) {
        self.items.extend(items);
    }

    pub fn items(&self) -> &[UpdateItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items belonging to a single provider, in collection order.
    pub fn by_source(&self, source: Provider) -> impl Iterator<Item = &UpdateItem> {
        self.items().iter().filter(move |item| item.source == source)
    }

    /// Number of items per provider. Providers with no items are absent.
    pub fn count_by_source(&self) -> HashMap<Provider, usize> {
        self.items().iter().counts_by(|item| item.source)
    }

    /// Number of items for one provider (zero when absent).
    pub fn count_for(&self, source: Provider) -> usize {
        self.by_source(source).count()
    }
}
