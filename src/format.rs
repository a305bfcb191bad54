//! Compilation of timestamp token formats into match patterns and parsers.
//!
//! A format such as `YYYY-MM-DD HH:mm:SS.sss` is turned into:
//! - a regex with a single capture group that finds the timestamp anywhere
//!   in a line, and
//! - a strptime format for [`jiff`] (`%Y-%m-%d %H:%M:%S.%f`).
//!
//! Supported tokens: `YYYY`, `YY`, `MM`, `DD`, `HH`, `mm`, `SS` (seconds)
//! and `sss` (milliseconds). Everything else is literal text.
//!
//! Without a format the default pattern applies: an ISO-8601 timestamp in
//! square brackets at the start of the line, parsed natively.

use std::sync::{Arc, LazyLock};

use jiff::Timestamp;
use jiff::civil::{Date, Time};
use jiff::fmt::strtime::BrokenDownTime;
use jiff::tz::TimeZone;
use regex::Regex;

use crate::options::ParsingRule;
use crate::resolver::{PatternResolver, Resolution};
use crate::timestamp::{date_in, parse_native};

/// Default pattern: `[2024-01-02T03:04:05Z] message` (fraction and offset optional).
pub const DEFAULT_PATTERN: &str =
    r"^\[(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2}))\]";

/// Matches every format token in one pass. Longer tokens come first.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("YYYY|YY|MM|DD|HH|mm|SS|sss")
        .expect("format token regex is a compile-time constant and must be valid")
});

static DATE_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("YYYY|YY|MM|DD")
        .expect("date token regex is a compile-time constant and must be valid")
});

static DEFAULT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_PATTERN).expect("default timestamp regex must be valid")
});

fn token_regex(token: &str) -> &'static str {
    match token {
        "YYYY" => r"\d{4}",
        "sss" => r"\d{3}",
        _ => r"\d{2}",
    }
}

fn token_directive(token: &str) -> &'static str {
    match token {
        "YYYY" => "%Y",
        "YY" => "%y",
        "MM" => "%m",
        "DD" => "%d",
        "HH" => "%H",
        "mm" => "%M",
        "SS" => "%S",
        "sss" => "%f",
        _ => "",
    }
}

/// Build the single-capture-group regex source for a token format.
///
/// Literal text is escaped first; tokens are then replaced in one pass so
/// replacement text is never re-scanned.
pub fn format_to_pattern(format: &str) -> String {
    let escaped = regex::escape(format);
    let body = TOKEN_PATTERN.replace_all(&escaped, |caps: &regex::Captures<'_>| {
        token_regex(&caps[0]).to_string()
    });
    format!("({body})")
}

/// Map a token format to a strptime format understood by [`jiff`].
pub fn format_to_strptime(format: &str) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut last = 0;
    for m in TOKEN_PATTERN.find_iter(format) {
        push_literal(&mut out, &format[last..m.start()]);
        out.push_str(token_directive(m.as_str()));
        last = m.end();
    }
    push_literal(&mut out, &format[last..]);
    out
}

fn push_literal(out: &mut String, literal: &str) {
    for c in literal.chars() {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
}

/// How a captured timestamp string is turned into an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatKind {
    /// Native ISO-style parsing (default and legacy patterns).
    Native,
    /// strptime parsing of a configured token format.
    Structured { parse_format: String, has_date: bool },
}

/// Immutable per-source parsing artifact produced by [`FormatCompiler`].
#[derive(Debug, Clone)]
pub struct CompiledFormat {
    /// `None` when a legacy pattern failed to compile: nothing matches.
    pattern: Option<Regex>,
    kind: FormatKind,
    merge_identical_timestamps: bool,
    /// Drop the leading `[timestamp] ` from stored lines (default pattern only).
    strip_prefix: bool,
    tz: TimeZone,
}

impl CompiledFormat {
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    pub fn kind(&self) -> &FormatKind {
        &self.kind
    }

    pub fn merge_identical_timestamps(&self) -> bool {
        self.merge_identical_timestamps
    }

    pub fn strips_timestamp_prefix(&self) -> bool {
        self.strip_prefix
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.tz
    }

    /// Parse a captured timestamp string. `now` anchors time-only formats
    /// to the current date.
    pub fn parse_timestamp(&self, text: &str, now: Timestamp) -> Option<Timestamp> {
        match &self.kind {
            FormatKind::Native => parse_native(text, &self.tz),
            FormatKind::Structured {
                parse_format,
                has_date,
            } => {
                let tm = BrokenDownTime::parse(parse_format, text).ok()?;
                let today = date_in(now, &self.tz);
                let date = if *has_date {
                    Date::new(
                        tm.year().unwrap_or(today.year()),
                        tm.month().unwrap_or(1),
                        tm.day().unwrap_or(1),
                    )
                    .ok()?
                } else {
                    today
                };
                let time = Time::new(
                    tm.hour().unwrap_or(0),
                    tm.minute().unwrap_or(0),
                    tm.second().unwrap_or(0),
                    tm.subsec_nanosecond().unwrap_or(0),
                )
                .ok()?;
                let zoned = date.to_datetime(time).to_zoned(self.tz.clone()).ok()?;
                Some(zoned.timestamp())
            }
        }
    }
}

/// Turns parsing rules into [`CompiledFormat`]s for one time zone.
#[derive(Debug, Clone)]
pub struct FormatCompiler {
    tz: TimeZone,
}

impl FormatCompiler {
    pub fn new(tz: TimeZone) -> Self {
        Self { tz }
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.tz
    }

    /// Compile the rule resolved for a source; `None` means no prefix matched.
    pub fn compile(&self, rule: Option<&ParsingRule>) -> CompiledFormat {
        match rule {
            Some(ParsingRule::LegacyPattern(pattern)) => self.compile_legacy(pattern),
            Some(rule @ ParsingRule::StructuredFormat { .. }) => match rule.format_str() {
                Some(format) => {
                    let mut compiled = self.compile_format(format);
                    compiled.merge_identical_timestamps = rule.merge_identical_timestamps();
                    compiled
                }
                None => self.default_format(),
            },
            None => self.default_format(),
        }
    }

    /// Resolve `source_id` against `resolver` and compile its rule.
    pub fn for_source(&self, resolver: &PatternResolver, source_id: &str) -> Arc<CompiledFormat> {
        let resolution = resolver.resolve(source_id);
        let compiled = self.compile(resolution.rule());
        match resolution {
            Resolution::Rule { prefix, .. } => tracing::debug!(
                source = source_id,
                prefix,
                pattern = compiled.pattern().map(Regex::as_str),
                "resolved parsing rule"
            ),
            Resolution::Default => tracing::debug!(source = source_id, "using default timestamp pattern"),
        }
        Arc::new(compiled)
    }

    /// The built-in `[ISO-8601]` pattern with native parsing.
    pub fn default_format(&self) -> CompiledFormat {
        CompiledFormat {
            pattern: Some(DEFAULT_REGEX.clone()),
            kind: FormatKind::Native,
            merge_identical_timestamps: false,
            strip_prefix: true,
            tz: self.tz.clone(),
        }
    }

    /// Compile a token format string.
    pub fn compile_format(&self, format: &str) -> CompiledFormat {
        let source = format_to_pattern(format);
        let pattern = match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(format, error = %e, "timestamp format produced an invalid pattern");
                None
            }
        };
        CompiledFormat {
            pattern,
            kind: FormatKind::Structured {
                parse_format: format_to_strptime(format),
                has_date: DATE_TOKEN_PATTERN.is_match(format),
            },
            merge_identical_timestamps: false,
            strip_prefix: false,
            tz: self.tz.clone(),
        }
    }

    /// Compile a legacy regex rule; an invalid regex matches nothing.
    pub fn compile_legacy(&self, pattern: &str) -> CompiledFormat {
        let pattern = match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "legacy parsing pattern is not a valid regex");
                None
            }
        };
        CompiledFormat {
            pattern,
            kind: FormatKind::Native,
            merge_identical_timestamps: false,
            strip_prefix: false,
            tz: self.tz.clone(),
        }
    }
}
