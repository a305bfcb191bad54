//! Timestamp helpers shared by the merge engine.
//!
//! Entry timestamps are stored as [`jiff::Timestamp`] instants. Display
//! strings are derived once in the configured time zone, and the current
//! time comes from an injected [`Clock`] so orphan lines and time-only
//! formats can be tested deterministically.

use jiff::Timestamp;
use jiff::civil::Date;
use jiff::tz::TimeZone;

/// Full display format: `YYYY-MM-DD HH:MM:SS.mmm`.
pub const FULL_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Time-only display format: `HH:MM:SS.mmm`.
pub const SHORT_DISPLAY_FORMAT: &str = "%H:%M:%S%.3f";

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Format `ts` in `tz` using a strftime-compatible format string.
pub fn format_in(ts: Timestamp, tz: &TimeZone, format: &str) -> String {
    ts.to_zoned(tz.clone()).strftime(format).to_string()
}

/// The civil date of `ts` in `tz`.
pub fn date_in(ts: Timestamp, tz: &TimeZone) -> Date {
    ts.to_zoned(tz.clone()).date()
}

/// Parse a free-form timestamp the way a native date parser would.
///
/// Tries RFC 3339 / ISO 8601 instants first, then civil date-times
/// (`YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM[:SS]`) interpreted in `tz`.
pub fn parse_native(s: &str, tz: &TimeZone) -> Option<Timestamp> {
    let s = s.trim();
    if let Ok(ts) = s.parse::<Timestamp>() {
        return Some(ts);
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = jiff::civil::DateTime::strptime(format, s)
            && let Ok(zdt) = dt.to_zoned(tz.clone())
        {
            return Some(zdt.timestamp());
        }
    }

    None
}

/// Resolve a time zone name: `local`, `utc`, or any IANA identifier.
pub fn resolve_time_zone(name: &str) -> Option<TimeZone> {
    match name.to_ascii_lowercase().as_str() {
        "local" | "system" => Some(TimeZone::system()),
        "utc" | "z" => Some(TimeZone::UTC),
        _ => TimeZone::get(name).ok(),
    }
}
