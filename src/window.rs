//! The weekly collection window.
//!
//! A run only admits updates dated inside the Monday–Sunday week that
//! contains the run's reference date. Both ends are inclusive.

use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;

/// Where a date falls relative to a [`DateWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Older than the window start.
    Before,
    Within,
    /// Newer than the window end.
    After,
}

/// Inclusive `(start, end)` range covering one Monday–Sunday week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Compute the week containing `reference`.
    ///
    /// `start` is the most recent Monday on or before `reference`,
    /// `end` is six days later.
    pub fn compute(reference: NaiveDate) -> Self {
        let offset = i64::from(reference.weekday().num_days_from_monday());
        let start = reference - Duration::days(offset);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Admission predicate: `start <= date <= end`.
    pub fn admits(&self, date: NaiveDate) -> bool {
        self.placement(date) == Placement::Within
    }

    pub fn placement(&self, date: NaiveDate) -> Placement {
        if date < self.start {
            Placement::Before
        } else if date > self.end {
            Placement::After
        } else {
            Placement::Within
        }
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
