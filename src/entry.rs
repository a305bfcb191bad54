//! The merged log entry and its ordering key.

use std::cmp::Ordering;
use std::sync::Arc;

use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::timestamp::{FULL_DISPLAY_FORMAT, SHORT_DISPLAY_FORMAT, format_in};

/// Opaque identifier of a log source (for example a pod name).
pub type SourceId = Arc<str>;

/// One log record after timestamp extraction and continuation merging.
///
/// `line` may contain embedded newlines when continuation lines were folded
/// into it. The display strings are computed once at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub line: String,
    pub timestamp: Timestamp,
    pub source_id: SourceId,
    pub has_parsing_error: bool,
    /// `YYYY-MM-DD HH:MM:SS.mmm` in the engine's time zone.
    pub full_display: String,
    /// `HH:MM:SS.mmm` in the engine's time zone.
    pub short_display: String,
    /// Position of the source in the selected-source list.
    pub source_rank: usize,
    /// Emission order within the source.
    pub sequence: u64,
}

impl LogEntry {
    pub fn new(
        line: impl Into<String>,
        timestamp: Timestamp,
        source_id: SourceId,
        has_parsing_error: bool,
        tz: &TimeZone,
    ) -> Self {
        Self {
            line: line.into(),
            timestamp,
            source_id,
            has_parsing_error,
            full_display: format_in(timestamp, tz, FULL_DISPLAY_FORMAT),
            short_display: format_in(timestamp, tz, SHORT_DISPLAY_FORMAT),
            source_rank: 0,
            sequence: 0,
        }
    }

    /// Attach a continuation line (`"\n" + line`).
    pub fn append_continuation(&mut self, line: &str) {
        self.line.push('\n');
        self.line.push_str(line);
    }

    /// Chronological comparison: timestamp, then source rank, then sequence.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.source_rank.cmp(&other.source_rank))
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Sort entries ascending by timestamp; ties keep source rank and line order.
pub fn sort_chronologically(entries: &mut [LogEntry]) {
    entries.sort_by(LogEntry::chronological_cmp);
}
