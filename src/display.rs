//! Terminal rendering of merged entries.
//!
//! Each entry renders as `[timestamp] [source] line`. The source tag uses a
//! short display name (replica suffixes stripped) and, when colors are on, a
//! background color derived from that name so every replica of a workload
//! shares it. Multi-line entries keep their embedded newlines.

use std::fmt::Write;

use owo_colors::{OwoColorize, Style};

use crate::batch::MergedView;
use crate::entry::LogEntry;

/// How entries are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub use_color: bool,
    /// Time-only stamps (all shown entries fall on one day).
    pub short_timestamps: bool,
    /// Include the `[source]` tag; off when a single source is shown.
    pub show_source: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            use_color: false,
            short_timestamps: false,
            show_source: true,
        }
    }
}

/// Strip a trailing `-<id>` segment made of lowercase letters and digits.
fn strip_id_suffix(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((head, id))
            if !id.is_empty()
                && id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()) =>
        {
            head
        }
        _ => name,
    }
}

/// Short name for a source: up to two trailing id segments removed.
///
/// `frontend-567f86d547-klmno` becomes `frontend`.
pub fn display_name(source_id: &str) -> &str {
    strip_id_suffix(strip_id_suffix(source_id))
}

/// Stable RGB color for a source, shared by all replicas of a workload.
pub fn source_color(source_id: &str) -> (u8, u8, u8) {
    let hash = display_name(source_id)
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
        });

    let hue = (hash % 360).unsigned_abs();
    let saturation = (65 + hash % 20).clamp(0, 100);
    let lightness = (45 + hash % 15).clamp(0, 100);
    hsl_to_rgb(
        f64::from(hue),
        f64::from(saturation) / 100.0,
        f64::from(lightness) / 100.0,
    )
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h = h / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}

/// Badge style for a source tag.
pub fn source_style(source_id: &str) -> Style {
    let (r, g, b) = source_color(source_id);
    Style::new().white().on_truecolor(r, g, b)
}

/// Render one entry into `out`.
pub fn format_entry(entry: &LogEntry, options: &RenderOptions, out: &mut String) {
    let stamp = if options.short_timestamps {
        &entry.short_display
    } else {
        &entry.full_display
    };

    if options.use_color {
        let stamp_style = if entry.has_parsing_error {
            Style::new().red().bold()
        } else {
            Style::new().bold()
        };
        let _ = write!(out, "{}", format!("[{stamp}]").style(stamp_style));
    } else {
        let _ = write!(out, "[{stamp}]");
    }

    if options.show_source {
        let name = display_name(&entry.source_id);
        if options.use_color {
            let _ = write!(out, " {}", format!("[{name}]").style(source_style(&entry.source_id)));
        } else {
            let _ = write!(out, " [{name}]");
        }
    }

    out.push(' ');
    out.push_str(&entry.line);
}

/// Plain-text export of entries, one rendered entry per line.
pub fn export_text<'a, I>(entries: I, short_timestamps: bool) -> String
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let options = RenderOptions {
        use_color: false,
        short_timestamps,
        show_source: true,
    };
    let mut out = String::new();
    for (i, entry) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        format_entry(entry, &options, &mut out);
    }
    out
}

/// One-paragraph status summary for stderr.
pub fn format_status(view: &MergedView, shown: usize, use_color: bool) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{shown} of {} entries from {} source(s)",
        view.entries.len(),
        view.loaded_sources.len()
    );

    if !view.parse_error_sources.is_empty() {
        let names: Vec<&str> = view.parse_error_sources.iter().map(|s| &**s).collect();
        let line = format!("parsing errors: {}", names.join(", "));
        if use_color {
            let _ = write!(out, "\n{}", line.yellow());
        } else {
            let _ = write!(out, "\n{line}");
        }
    }

    for failure in &view.failed_sources {
        let line = format!("failed: {}: {}", failure.source_id, failure.message);
        if use_color {
            let _ = write!(out, "\n{}", line.red());
        } else {
            let _ = write!(out, "\n{line}");
        }
    }
    out
}
