//! Continuation merging: folding timestamp-less lines into the preceding entry.
//!
//! One [`ContinuationMerger`] exists per source per parse session. It owns
//! the source's [`ParseState`] and appends finished entries to a caller
//! supplied `Vec<LogEntry>` (the batch result or the live stream view),
//! remembering the index of its last dated entry so later continuation
//! lines, even ones arriving in a later chunk, are attached in place.
//!
//! Error status is source-wide: once any line of a source fails to parse,
//! every entry of that source gets `has_parsing_error = true`, including
//! entries whose own timestamp parsed cleanly. Downstream status display
//! relies on this, so it is intentional.

use std::sync::Arc;

use jiff::Timestamp;

use crate::entry::{LogEntry, SourceId};
use crate::format::CompiledFormat;
use crate::parser::{parse_line, strip_bracket_prefix};

/// Mutable per-source state carried across lines and chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseState {
    /// Index (into the entry list) of the last entry that owns a timestamp.
    pub last_entry_with_timestamp: Option<usize>,
    pub saw_any_parsing_error: bool,
}

/// What happened to one pushed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// A new dated entry was appended at this index.
    Emitted(usize),
    /// The line was appended to the existing entry at this index.
    Continued(usize),
    /// No dated entry existed yet: a now-stamped error entry was appended.
    Orphaned(usize),
    /// Blank line, ignored.
    Skipped,
}

/// Per-source line folding state machine.
#[derive(Debug, Clone)]
pub struct ContinuationMerger {
    source_id: SourceId,
    source_rank: usize,
    format: Arc<CompiledFormat>,
    state: ParseState,
    lines_seen: u64,
    next_sequence: u64,
    /// Indices of every entry this source emitted, in order.
    emitted: Vec<usize>,
    /// Prefix of `emitted` already carrying the source-wide error flag.
    flagged: usize,
}

impl ContinuationMerger {
    pub fn new(source_id: SourceId, source_rank: usize, format: Arc<CompiledFormat>) -> Self {
        Self {
            source_id,
            source_rank,
            format,
            state: ParseState::default(),
            lines_seen: 0,
            next_sequence: 0,
            emitted: Vec::new(),
            flagged: 0,
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    pub fn saw_any_parsing_error(&self) -> bool {
        self.state.saw_any_parsing_error
    }

    /// Indices of the entries emitted by this source.
    pub fn emitted(&self) -> &[usize] {
        &self.emitted
    }

    /// Feed one raw line. `now` stamps orphan lines and anchors time-only formats.
    pub fn push_line(&mut self, line: &str, now: Timestamp, entries: &mut Vec<LogEntry>) -> LineOutcome {
        if line.is_empty() {
            return LineOutcome::Skipped;
        }
        let first_line = self.lines_seen == 0;
        self.lines_seen += 1;

        let parsed = parse_line(line, &self.format, now);
        if parsed.is_unparseable() || (first_line && !parsed.matched) {
            self.state.saw_any_parsing_error = true;
        }

        match (parsed.timestamp, self.state.last_entry_with_timestamp) {
            (Some(ts), Some(idx))
                if self.format.merge_identical_timestamps() && entries[idx].timestamp == ts =>
            {
                let text = self.stored_text(line);
                entries[idx].append_continuation(text);
                LineOutcome::Continued(idx)
            }
            (Some(ts), _) => {
                let text = self.stored_text(line).to_string();
                let idx = self.emit(text, ts, false, entries);
                self.state.last_entry_with_timestamp = Some(idx);
                LineOutcome::Emitted(idx)
            }
            (None, Some(idx)) => {
                entries[idx].append_continuation(line);
                LineOutcome::Continued(idx)
            }
            (None, None) => {
                self.state.saw_any_parsing_error = true;
                let idx = self.emit(line.to_string(), now, true, entries);
                self.state.last_entry_with_timestamp = Some(idx);
                LineOutcome::Orphaned(idx)
            }
        }
    }

    /// Feed every line of a text block.
    pub fn push_text(&mut self, text: &str, now: Timestamp, entries: &mut Vec<LogEntry>) {
        for line in text.split('\n') {
            self.push_line(line, now, entries);
        }
    }

    /// Propagate the source-wide error flag to all entries emitted so far.
    ///
    /// Returns the indices newly flagged. Cheap to call repeatedly.
    pub fn apply_error_flag(&mut self, entries: &mut [LogEntry]) -> Vec<usize> {
        if !self.state.saw_any_parsing_error {
            return Vec::new();
        }
        let mut changed = Vec::new();
        for &idx in &self.emitted[self.flagged..] {
            if !entries[idx].has_parsing_error {
                entries[idx].has_parsing_error = true;
                changed.push(idx);
            }
        }
        self.flagged = self.emitted.len();
        changed
    }

    fn stored_text<'a>(&self, line: &'a str) -> &'a str {
        if self.format.strips_timestamp_prefix() {
            strip_bracket_prefix(line)
        } else {
            line
        }
    }

    fn emit(
        &mut self,
        line: String,
        timestamp: Timestamp,
        has_parsing_error: bool,
        entries: &mut Vec<LogEntry>,
    ) -> usize {
        let mut entry = LogEntry::new(
            line,
            timestamp,
            Arc::clone(&self.source_id),
            has_parsing_error,
            self.format.time_zone(),
        );
        entry.source_rank = self.source_rank;
        entry.sequence = self.next_sequence;
        self.next_sequence += 1;

        let idx = entries.len();
        entries.push(entry);
        self.emitted.push(idx);
        idx
    }
}

/// Parse a complete text blob for one source into its entries.
pub fn merge_source(
    source_id: SourceId,
    source_rank: usize,
    format: Arc<CompiledFormat>,
    text: &str,
    now: Timestamp,
) -> (Vec<LogEntry>, bool) {
    let mut merger = ContinuationMerger::new(source_id, source_rank, format);
    let mut entries = Vec::new();
    merger.push_text(text, now, &mut entries);
    merger.apply_error_flag(&mut entries);
    (entries, merger.saw_any_parsing_error())
}
