//! Command-line argument definitions for `kuby`.
//!
//! Uses [`clap`] derive macros for argument parsing. Global flags apply to
//! every subcommand and override the config file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Merge logs from many running workloads into one chronological timeline.
///
/// Timestamps are extracted per source using configurable formats, lines
/// without a timestamp are folded into the preceding entry, and all sources
/// are merged by time.
#[derive(Debug, Parser)]
#[command(name = "kuby", version, about, long_about = None, args_override_self = true)]
pub struct Cli {
    /// Control color output.
    ///
    /// `auto` enables colors only when stdout is a TTY and `NO_COLOR` is unset.
    #[arg(short = 'c', long, value_enum, global = true)]
    pub color: Option<ColorMode>,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Time zone for display and zone-less timestamps (`local`, `utc` or an IANA name).
    #[arg(long, global = true)]
    pub timezone: Option<String>,

    /// Kubernetes namespace.
    #[arg(short = 'n', long, global = true)]
    pub namespace: Option<String>,

    /// kubeconfig context to use instead of the current one.
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Where to read logs from.
    #[arg(long, value_enum, global = true)]
    pub source: Option<SourceKind>,

    /// Directory holding `<source>.log` files. Implies `--source files`.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Path to the parsing options store.
    #[arg(long, global = true)]
    pub options_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch logs once and print them merged chronologically.
    Fetch(FetchArgs),

    /// Follow live logs until interrupted (Ctrl-C), then print a summary.
    Follow(FollowArgs),

    /// List the sources (pods) that can be fetched or followed.
    Pods {
        /// Only list sources starting with this prefix.
        prefix: Option<String>,
    },

    /// List kubeconfig contexts and their default namespaces.
    Contexts,

    /// Manage per-source timestamp formats.
    #[command(subcommand)]
    Options(OptionsCommand),

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Sources (pod names) to merge.
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Only fetch the last N lines of each source.
    #[arg(short = 't', long)]
    pub tail: Option<usize>,

    /// Only show entries containing this text (case-sensitive).
    #[arg(short = 's', long)]
    pub search: Option<String>,

    /// Only show entries at or after this time.
    #[arg(long)]
    pub since: Option<String>,

    /// Only show entries up to the end of this minute.
    #[arg(long)]
    pub until: Option<String>,

    /// Also write the shown entries as plain text to this file.
    #[arg(short = 'o', long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct FollowArgs {
    /// Sources (pod names) to follow.
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Lines of history each stream starts from.
    #[arg(short = 't', long)]
    pub tail: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum OptionsCommand {
    /// List configured prefixes.
    List,

    /// Add or replace the timestamp format for a source prefix.
    ///
    /// Tokens: YYYY, YY, MM, DD, HH, mm, SS (seconds), sss (milliseconds).
    Add {
        prefix: String,
        format: String,
        /// Fold consecutive lines with the same timestamp into one entry.
        #[arg(short = 'm', long)]
        merge_identical_timestamps: bool,
    },

    /// Remove the rule for a source prefix.
    Remove { prefix: String },

    /// Export rules as a JSON array.
    Export {
        /// Output file (stdout if omitted).
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Replace all rules with those from a JSON array file.
    Import { file: PathBuf },
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Enable colors only when stdout is a TTY.
    Auto,
    /// Always enable colors.
    Always,
    /// Never enable colors.
    Never,
}

/// Log backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// `kubectl logs`.
    Kubectl,
    /// `<log-dir>/<source>.log` files.
    Files,
}
