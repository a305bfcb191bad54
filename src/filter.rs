//! View filtering over merged entries.
//!
//! Filtering never mutates or reorders entries; it only selects which ones
//! are shown. A time range end is widened to the last millisecond of its
//! minute, matching minute-precision range inputs.

use std::collections::HashSet;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::entry::LogEntry;
use crate::error::KubyError;
use crate::timestamp::{date_in, parse_native};

/// Inclusive time bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
}

impl TimeRange {
    pub fn new(start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        Self {
            start,
            end: end.map(end_of_minute),
        }
    }

    /// Parse textual bounds: RFC 3339 instants, or civil date-times read in `tz`.
    pub fn parse(start: Option<&str>, end: Option<&str>, tz: &TimeZone) -> Result<Self, KubyError> {
        let bound = |text: Option<&str>| {
            text.map(|t| {
                parse_native(t, tz)
                    .ok_or_else(|| KubyError::Config(format!("invalid time '{t}'")))
            })
            .transpose()
        };
        Ok(Self::new(bound(start)?, bound(end)?))
    }

    pub fn start(&self) -> Option<Timestamp> {
        self.start
    }

    /// The widened end bound.
    pub fn end(&self) -> Option<Timestamp> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start.is_none_or(|start| ts >= start) && self.end.is_none_or(|end| ts <= end)
    }

    /// Both bounds set and on the same civil day in `tz`.
    pub fn is_same_day(&self, tz: &TimeZone) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => is_same_day(start, end, tz),
            _ => false,
        }
    }
}

/// `ts` moved to `:59.999` of its minute.
fn end_of_minute(ts: Timestamp) -> Timestamp {
    let minute = ts.as_second().div_euclid(60) * 60;
    Timestamp::new(minute + 59, 999_000_000).unwrap_or(ts)
}

/// Whether two instants fall on the same civil day in `tz`.
pub fn is_same_day(a: Timestamp, b: Timestamp, tz: &TimeZone) -> bool {
    date_in(a, tz) == date_in(b, tz)
}

/// Search, time and source selection applied to a merged view.
#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    search: Option<String>,
    range: TimeRange,
    sources: Option<HashSet<String>>,
}

impl ViewFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-sensitive substring match on the (possibly multi-line) entry text.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.is_empty()).then_some(search);
        self
    }

    #[must_use]
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    /// Only show entries from these sources.
    #[must_use]
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    pub fn range(&self) -> &TimeRange {
        &self.range
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.sources
            .as_ref()
            .is_none_or(|s| s.contains(&*entry.source_id))
            && self
                .search
                .as_deref()
                .is_none_or(|needle| entry.line.contains(needle))
            && self.range.contains(entry.timestamp)
    }

    pub fn apply<'a>(&'a self, entries: &'a [LogEntry]) -> impl Iterator<Item = &'a LogEntry> + 'a {
        entries.iter().filter(move |e| self.matches(e))
    }
}

/// Whether a set of entries should be shown with time-only stamps.
///
/// True when an explicit same-day range is active, or when every entry
/// falls on one civil day.
pub fn use_short_display<'a, I>(entries: I, range: &TimeRange, tz: &TimeZone) -> bool
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    if range.is_same_day(tz) {
        return true;
    }
    let span = entries.into_iter().fold(None, |span, e| match span {
        None => Some((e.timestamp, e.timestamp)),
        Some((first, last)) => Some((e.timestamp.min(first), e.timestamp.max(last))),
    });
    span.is_some_and(|(first, last)| is_same_day(first, last, tz))
}
