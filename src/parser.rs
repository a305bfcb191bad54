//! Per-line timestamp extraction.
//!
//! Applies a [`CompiledFormat`] to one raw line. Malformed input never
//! panics or errors: a missing match and an unparseable match both yield
//! `timestamp: None`, and [`LineParse::matched`] tells them apart.

use jiff::Timestamp;

use crate::format::CompiledFormat;

/// Outcome of parsing one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParse {
    pub timestamp: Option<Timestamp>,
    /// The pattern captured a timestamp substring (parsed or not).
    pub matched: bool,
}

impl LineParse {
    const UNMATCHED: Self = Self {
        timestamp: None,
        matched: false,
    };

    /// Matched a timestamp-looking substring that failed to parse.
    pub fn is_unparseable(&self) -> bool {
        self.matched && self.timestamp.is_none()
    }
}

/// Parse the timestamp of `line` with `format`. `now` anchors time-only formats.
pub fn parse_line(line: &str, format: &CompiledFormat, now: Timestamp) -> LineParse {
    let Some(pattern) = format.pattern() else {
        return LineParse::UNMATCHED;
    };
    let Some(text) = pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
    else {
        return LineParse::UNMATCHED;
    };

    LineParse {
        timestamp: format.parse_timestamp(text, now),
        matched: true,
    }
}

/// The message part of a line matched by the default bracket pattern,
/// i.e. the line with its leading `[timestamp] ` removed.
pub fn strip_bracket_prefix(line: &str) -> &str {
    line.strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map_or(line, |(_, msg)| msg.strip_prefix(' ').unwrap_or(msg))
}
