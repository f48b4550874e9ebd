//! Parsing of the date representations found on listing pages and feeds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Format of the date labels on the Azure updates listing.
pub const LISTING_DATE_FORMAT: &str = "%m/%d/%Y";

/// RFC-2822 layout without the zone, used when the zone name is not one
/// chrono recognises.
const RFC2822_NO_ZONE: &str = "%a, %d %b %Y %H:%M:%S";

/// Minute-precision ISO-8601 layout applied to the first 16 characters.
const ISO_MINUTES: &str = "%Y-%m-%dT%H:%M";

/// How a raw date string should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateHint<'a> {
    /// A fixed `strftime` layout, e.g. [`LISTING_DATE_FORMAT`].
    Explicit(&'a str),
    /// A feed timestamp: RFC-2822 first, then ISO-8601 truncated to minutes.
    Feed,
}

/// The input matched none of the accepted layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable date {raw:?}")]
pub struct Unparseable {
    pub raw: String,
}

/// Parse `raw` into a calendar date.
///
/// RFC-2822 timestamps carrying an offset are converted to UTC before the
/// date is taken. The ISO fallback keeps the date as written.
pub fn parse(raw: &str, hint: DateHint<'_>) -> Result<NaiveDate, Unparseable> {
    let raw = raw.trim();
    let parsed = match hint {
        DateHint::Explicit(format) => NaiveDate::parse_from_str(raw, format).ok(),
        DateHint::Feed => parse_rfc2822(raw).or_else(|| parse_iso_minutes(raw)),
    };
    parsed.ok_or_else(|| Unparseable {
        raw: raw.to_string(),
    })
}

fn parse_rfc2822(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    // Zone names like "PST" or "UTC" that chrono rejects: read the wall time.
    let (without_zone, _zone) = raw.rsplit_once(' ')?;
    NaiveDateTime::parse_from_str(without_zone, RFC2822_NO_ZONE)
        .ok()
        .map(|dt| dt.date())
}

fn parse_iso_minutes(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..16)?;
    NaiveDateTime::parse_from_str(head, ISO_MINUTES)
        .ok()
        .map(|dt| dt.date())
}
