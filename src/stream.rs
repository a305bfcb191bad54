//! Incremental reconciliation of live per-source chunks.
//!
//! While a stream is active, entries are appended in arrival order and never
//! re-sorted, so already-rendered output stays put. Each source keeps its
//! own [`ContinuationMerger`] for the whole session, so a multi-line record
//! split across two chunks is still folded into one entry. A chunk that
//! ends mid-line is buffered until the rest arrives (or the feed ends).
//!
//! Every session has a generation number. Input tagged with any other
//! generation, or arriving after [`StreamReconciler::stop`], is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use crate::batch::{MergedView, SourceFailure};
use crate::entry::{LogEntry, SourceId, sort_chronologically};
use crate::format::FormatCompiler;
use crate::merge::{ContinuationMerger, LineOutcome};
use crate::options::ParsingOptions;
use crate::resolver::PatternResolver;
use crate::timestamp::Clock;

/// Entry indices touched by one ingestion step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkUpdate {
    /// Newly appended entries, in order.
    pub appended: Vec<usize>,
    /// Previously appended entries that changed (continuation or error flag).
    pub updated: Vec<usize>,
}

impl ChunkUpdate {
    pub fn is_empty(&self) -> bool {
        self.appended.is_empty() && self.updated.is_empty()
    }

    fn touch(&mut self, idx: usize) {
        if !self.appended.contains(&idx) && !self.updated.contains(&idx) {
            self.updated.push(idx);
        }
    }
}

#[derive(Debug)]
struct SourceFeed {
    merger: ContinuationMerger,
    /// Trailing text not yet terminated by a newline.
    pending: String,
    finished: bool,
    error: Option<String>,
}

/// Live merge state for one streaming session.
pub struct StreamReconciler {
    resolver: PatternResolver,
    compiler: FormatCompiler,
    clock: Arc<dyn Clock>,
    generation: u64,
    active: bool,
    feeds: Vec<SourceFeed>,
    by_id: HashMap<SourceId, usize>,
    entries: Vec<LogEntry>,
}

impl StreamReconciler {
    pub fn new(options: &ParsingOptions, compiler: FormatCompiler, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: PatternResolver::new(options),
            compiler,
            clock,
            generation: 0,
            active: false,
            feeds: Vec::new(),
            by_id: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Begin a new session, discarding all state of the previous one.
    ///
    /// Returns the generation that feeds of this session must tag input with.
    pub fn start(&mut self, source_ids: &[SourceId]) -> u64 {
        self.generation += 1;
        self.active = true;
        self.entries.clear();
        self.feeds.clear();
        self.by_id.clear();

        for source_id in source_ids {
            if self.by_id.contains_key(source_id) {
                continue;
            }
            let rank = self.feeds.len();
            let format = self.compiler.for_source(&self.resolver, source_id);
            self.feeds.push(SourceFeed {
                merger: ContinuationMerger::new(Arc::clone(source_id), rank, format),
                pending: String::new(),
                finished: false,
                error: None,
            });
            self.by_id.insert(Arc::clone(source_id), rank);
        }

        tracing::info!(
            generation = self.generation,
            sources = self.feeds.len(),
            "stream started"
        );
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Entries of the current session, in arrival order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Whether every feed of the session has finished.
    pub fn all_finished(&self) -> bool {
        self.feeds.iter().all(|f| f.finished)
    }

    /// Feed one raw chunk for a source.
    pub fn ingest(&mut self, generation: u64, source_id: &str, chunk: &str) -> ChunkUpdate {
        let Some(rank) = self.live_feed(generation, source_id) else {
            tracing::trace!(generation, source = source_id, "dropped stale chunk");
            return ChunkUpdate::default();
        };
        tracing::trace!(source = source_id, bytes = chunk.len(), "ingesting chunk");

        let now = self.clock.now();
        let feed = &mut self.feeds[rank];
        feed.pending.push_str(chunk);
        let Some(end) = feed.pending.rfind('\n') else {
            return ChunkUpdate::default();
        };
        let rest = feed.pending.split_off(end + 1);
        let complete = std::mem::replace(&mut feed.pending, rest);

        let mut update = ChunkUpdate::default();
        for line in complete.split('\n') {
            record(
                &mut update,
                feed.merger.push_line(line, now, &mut self.entries),
            );
        }
        for idx in feed.merger.apply_error_flag(&mut self.entries) {
            update.touch(idx);
        }
        update
    }

    /// Mark a source's feed as ended, flushing any partial trailing line.
    pub fn finish_source(
        &mut self,
        generation: u64,
        source_id: &str,
        error: Option<String>,
    ) -> ChunkUpdate {
        let Some(rank) = self.live_feed(generation, source_id) else {
            return ChunkUpdate::default();
        };
        let update = self.flush(rank);
        let feed = &mut self.feeds[rank];
        feed.finished = true;
        if let Some(ref message) = error {
            tracing::warn!(source = source_id, error = %message, "log stream failed");
        } else {
            tracing::debug!(source = source_id, "log stream ended");
        }
        feed.error = error;
        update
    }

    /// End the session and produce the terminal view.
    ///
    /// Clean entries are sorted like a batch merge; entries flagged with a
    /// parsing error follow them in arrival order.
    pub fn stop(&mut self) -> MergedView {
        if !self.active {
            return MergedView::default();
        }
        for rank in 0..self.feeds.len() {
            self.flush(rank);
        }
        self.active = false;

        let (mut clean, errored): (Vec<LogEntry>, Vec<LogEntry>) =
            std::mem::take(&mut self.entries)
                .into_iter()
                .partition(|e| !e.has_parsing_error);
        sort_chronologically(&mut clean);
        clean.extend(errored);

        let mut view = MergedView {
            entries: clean,
            ..MergedView::default()
        };
        for feed in self.feeds.drain(..) {
            let source_id = Arc::clone(feed.merger.source_id());
            if feed.merger.saw_any_parsing_error() {
                view.parse_error_sources.push(Arc::clone(&source_id));
            }
            match feed.error {
                Some(message) => view.failed_sources.push(SourceFailure { source_id, message }),
                None => view.loaded_sources.push(source_id),
            }
        }
        self.by_id.clear();

        tracing::info!(
            generation = self.generation,
            entries = view.entries.len(),
            "stream stopped"
        );
        view
    }

    fn live_feed(&self, generation: u64, source_id: &str) -> Option<usize> {
        if !self.active || generation != self.generation {
            return None;
        }
        let rank = *self.by_id.get(source_id)?;
        (!self.feeds[rank].finished).then_some(rank)
    }

    fn flush(&mut self, rank: usize) -> ChunkUpdate {
        let now = self.clock.now();
        let feed = &mut self.feeds[rank];
        let mut update = ChunkUpdate::default();
        if !feed.pending.is_empty() {
            let line = std::mem::take(&mut feed.pending);
            record(&mut update, feed.merger.push_line(&line, now, &mut self.entries));
        }
        for idx in feed.merger.apply_error_flag(&mut self.entries) {
            update.touch(idx);
        }
        update
    }
}

fn record(update: &mut ChunkUpdate, outcome: LineOutcome) {
    match outcome {
        LineOutcome::Emitted(idx) | LineOutcome::Orphaned(idx) => update.appended.push(idx),
        LineOutcome::Continued(idx) => update.touch(idx),
        LineOutcome::Skipped => {}
    }
}
