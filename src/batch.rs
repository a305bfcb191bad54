//! One-shot multi-source merge.
//!
//! Each source is parsed independently (no shared mutable state), then all
//! entries are sorted into one chronological view. Sources whose retrieval
//! failed are reported separately and never abort the others.

use std::sync::Arc;

use jiff::Timestamp;

use crate::entry::{LogEntry, SourceId, sort_chronologically};
use crate::format::FormatCompiler;
use crate::merge::merge_source;
use crate::options::ParsingOptions;
use crate::resolver::PatternResolver;
use crate::source::{LogSource, SourceError};
use crate::timestamp::Clock;

/// A source whose logs could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_id: SourceId,
    pub message: String,
}

/// Engine output: ordered entries plus per-source status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedView {
    pub entries: Vec<LogEntry>,
    /// Sources whose logs were retrieved and parsed.
    pub loaded_sources: Vec<SourceId>,
    /// Loaded sources with at least one parsing error.
    pub parse_error_sources: Vec<SourceId>,
    /// Sources whose retrieval failed.
    pub failed_sources: Vec<SourceFailure>,
}

impl MergedView {
    /// Earliest and latest entry timestamps.
    pub fn time_span(&self) -> Option<(Timestamp, Timestamp)> {
        let first = self.entries.iter().map(|e| e.timestamp).min()?;
        let last = self.entries.iter().map(|e| e.timestamp).max()?;
        Some((first, last))
    }

    /// Whether a source is in an error state (parse or retrieval).
    pub fn is_errored(&self, source_id: &str) -> bool {
        self.parse_error_sources.iter().any(|s| &**s == source_id)
            || self.failed_sources.iter().any(|f| &*f.source_id == source_id)
    }
}

/// Parses complete per-source text blobs and merges them.
pub struct BatchAggregator {
    resolver: PatternResolver,
    compiler: FormatCompiler,
    clock: Arc<dyn Clock>,
}

impl BatchAggregator {
    pub fn new(options: &ParsingOptions, compiler: FormatCompiler, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: PatternResolver::new(options),
            compiler,
            clock,
        }
    }

    /// Parse one source's text. Returns its entries and whether any line failed.
    pub fn parse_source(
        &self,
        source_id: &SourceId,
        source_rank: usize,
        text: &str,
        now: Timestamp,
    ) -> (Vec<LogEntry>, bool) {
        let format = self.compiler.for_source(&self.resolver, source_id);
        merge_source(Arc::clone(source_id), source_rank, format, text, now)
    }

    /// Merge already-retrieved inputs, in source order.
    pub fn aggregate<I>(&self, inputs: I) -> MergedView
    where
        I: IntoIterator<Item = (SourceId, Result<String, SourceError>)>,
    {
        let now = self.clock.now();
        let mut view = MergedView::default();

        for (rank, (source_id, result)) in inputs.into_iter().enumerate() {
            match result {
                Ok(text) => {
                    let (entries, errored) = self.parse_source(&source_id, rank, &text, now);
                    tracing::debug!(
                        source = &*source_id,
                        entries = entries.len(),
                        errored,
                        "parsed source logs"
                    );
                    view.entries.extend(entries);
                    if errored {
                        view.parse_error_sources.push(Arc::clone(&source_id));
                    }
                    view.loaded_sources.push(source_id);
                }
                Err(e) => view.failed_sources.push(SourceFailure {
                    source_id,
                    message: e.message,
                }),
            }
        }

        sort_chronologically(&mut view.entries);
        view
    }

    /// Fetch every source one after another, then merge.
    ///
    /// A failing source is recorded and the loop moves on to the next one.
    pub async fn fetch(
        &self,
        source: &dyn LogSource,
        source_ids: &[SourceId],
        tail: Option<usize>,
    ) -> MergedView {
        let mut inputs = Vec::with_capacity(source_ids.len());
        for source_id in source_ids {
            let result = source.fetch(source_id, tail).await;
            match &result {
                Ok(text) => tracing::info!(source = &**source_id, bytes = text.len(), "fetched logs"),
                Err(e) => tracing::warn!(source = &**source_id, error = %e, "error fetching logs"),
            }
            inputs.push((Arc::clone(source_id), result));
        }
        self.aggregate(inputs)
    }
}
