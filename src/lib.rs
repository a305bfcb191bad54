//! `kuby` merges logs from many running workloads into one timeline.
//!
//! The library is a timestamp parsing and multi-source merge engine:
//!
//! - [`resolver`] picks a source's parsing rule by longest prefix match.
//! - [`format`] compiles token formats (`YYYY-MM-DD HH:mm:SS.sss`) into a
//!   capture pattern plus a parse format.
//! - [`parser`] extracts one line's timestamp.
//! - [`merge`] folds timestamp-less lines into the preceding entry.
//! - [`batch`] merges complete per-source texts chronologically.
//! - [`stream`] and [`session`] do the same incrementally for live feeds.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use jiff::tz::TimeZone;
//! use kuby::{BatchAggregator, FormatCompiler, ParsingOptions, SystemClock};
//!
//! let aggregator = BatchAggregator::new(
//!     &ParsingOptions::new(),
//!     FormatCompiler::new(TimeZone::UTC),
//!     Arc::new(SystemClock),
//! );
//! let view = aggregator.aggregate([
//!     (Arc::from("web-1"), Ok("[2024-01-01T00:00:03Z] late\n".to_string())),
//!     (Arc::from("web-2"), Ok("[2024-01-01T00:00:01Z] early\n  detail\n".to_string())),
//! ]);
//! assert_eq!(view.entries[0].line, "early\n  detail");
//! assert_eq!(view.entries[1].line, "late");
//! ```

pub mod batch;
pub mod cli;
pub mod config;
pub mod display;
pub mod entry;
pub mod error;
pub mod filter;
pub mod format;
pub mod merge;
pub mod options;
pub mod parser;
pub mod resolver;
pub mod session;
pub mod source;
pub mod stream;
pub mod timestamp;

// Re-export primary API types for convenience.
pub use batch::{BatchAggregator, MergedView, SourceFailure};
pub use config::Config;
pub use entry::{LogEntry, SourceId};
pub use error::KubyError;
pub use format::{CompiledFormat, FormatCompiler};
pub use merge::{ContinuationMerger, ParseState};
pub use options::{OptionsStore, ParsingOptions, ParsingRule};
pub use parser::{LineParse, parse_line};
pub use resolver::PatternResolver;
pub use session::{LiveSession, SessionUpdate};
pub use source::{FileSource, KubeContext, KubectlSource, LogSource, SourceError};
pub use stream::{ChunkUpdate, StreamReconciler};
pub use timestamp::{Clock, FixedClock, SystemClock};
