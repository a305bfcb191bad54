use std::io::{self, BufWriter, IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};

use kuby::batch::BatchAggregator;
use kuby::cli::{Cli, ColorMode, Command, FetchArgs, FollowArgs, OptionsCommand};
use kuby::config::Config;
use kuby::display::{RenderOptions, export_text, format_entry, format_status};
use kuby::entry::SourceId;
use kuby::error::KubyError;
use kuby::filter::{TimeRange, ViewFilter, use_short_display};
use kuby::format::FormatCompiler;
use kuby::options::{ParsingOptions, ParsingRule};
use kuby::session::{LiveSession, SessionUpdate};
use kuby::source::LogSource;
use kuby::stream::StreamReconciler;
use kuby::timestamp::SystemClock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Reset SIGPIPE to default behavior so `kuby fetch ... | head` exits
    // quietly instead of reporting a broken pipe.
    reset_sigpipe();

    let cli = Cli::parse();
    init_logging();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "kuby", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kuby: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let result = match cli.command {
        Command::Fetch(args) => run_fetch(&config, args).await,
        Command::Follow(args) => run_follow(&config, args).await,
        Command::Pods { prefix } => run_pods(&config, prefix.as_deref()).await,
        Command::Contexts => run_contexts(&config).await,
        Command::Options(command) => run_options(&config, command),
        Command::Completions { .. } => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(KubyError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kuby: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Diagnostics go to stderr; stdout carries only log output.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kuby=warn".into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn source_ids(names: &[String]) -> Vec<SourceId> {
    names.iter().map(|n| Arc::from(n.as_str())).collect()
}

async fn run_fetch(config: &Config, args: FetchArgs) -> Result<(), KubyError> {
    let options = config.options_store().load()?;
    let aggregator = BatchAggregator::new(
        &options,
        FormatCompiler::new(config.timezone.clone()),
        Arc::new(SystemClock),
    );
    let range = TimeRange::parse(
        args.since.as_deref(),
        args.until.as_deref(),
        &config.timezone,
    )?;

    let source = config.log_source();
    let ids = source_ids(&args.sources);
    let view = aggregator
        .fetch(source.as_ref(), &ids, args.tail.or(config.tail_lines))
        .await;

    let mut filter = ViewFilter::new().with_range(range);
    if let Some(search) = args.search {
        filter = filter.with_search(search);
    }
    let shown: Vec<_> = filter.apply(&view.entries).collect();
    let render = RenderOptions {
        use_color: resolve_color_mode(config.color_mode, io::stdout().is_terminal()),
        short_timestamps: use_short_display(shown.iter().copied(), filter.range(), &config.timezone),
        show_source: ids.len() > 1,
    };

    let mut writer = BufWriter::new(io::stdout().lock());
    let mut line_buf = String::new();
    for entry in &shown {
        line_buf.clear();
        format_entry(entry, &render, &mut line_buf);
        writeln!(writer, "{line_buf}")?;
    }
    writer.flush()?;

    if let Some(path) = args.export {
        std::fs::write(&path, export_text(shown.iter().copied(), render.short_timestamps))?;
    }

    let stderr_color = resolve_color_mode(config.color_mode, io::stderr().is_terminal());
    eprintln!("{}", format_status(&view, shown.len(), stderr_color));

    match view.failed_sources.first() {
        Some(failure) if view.loaded_sources.is_empty() => Err(KubyError::Source {
            source_id: failure.source_id.to_string(),
            message: failure.message.clone(),
        }),
        _ => Ok(()),
    }
}

async fn run_follow(config: &Config, args: FollowArgs) -> Result<(), KubyError> {
    let options = config.options_store().load()?;
    let reconciler = StreamReconciler::new(
        &options,
        FormatCompiler::new(config.timezone.clone()),
        Arc::new(SystemClock),
    );
    let mut session = LiveSession::new(config.log_source(), reconciler)
        .with_tail(Some(args.tail.unwrap_or(config.follow_tail_lines)));

    let ids = source_ids(&args.sources);
    let render = RenderOptions {
        use_color: resolve_color_mode(config.color_mode, io::stdout().is_terminal()),
        short_timestamps: false,
        show_source: ids.len() > 1,
    };
    session.start(&ids);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let stdout = io::stdout();
    // Bytes of each entry's text already written.
    let mut printed: Vec<Option<usize>> = Vec::new();
    let mut line_buf = String::new();

    loop {
        let next = tokio::select! {
            _ = &mut ctrl_c => None,
            update = session.next_update() => update,
        };
        let Some(message) = next else {
            break;
        };

        let update = match &message {
            SessionUpdate::Entries { update, .. } => update,
            SessionUpdate::SourceFinished {
                source_id,
                error,
                update,
            } => {
                if let Some(error) = error {
                    eprintln!("kuby: {source_id}: {error}");
                }
                update
            }
        };

        let entries = session.entries();
        printed.resize(entries.len(), None);
        let mut out = stdout.lock();
        for &idx in &update.updated {
            // Continuation lines of an entry already on screen.
            let line = &entries[idx].line;
            if let Some(done) = printed[idx]
                && done < line.len()
            {
                writeln!(out, "{}", line[done..].trim_start_matches('\n'))?;
                printed[idx] = Some(line.len());
            }
        }
        for &idx in &update.appended {
            line_buf.clear();
            format_entry(&entries[idx], &render, &mut line_buf);
            writeln!(out, "{line_buf}")?;
            printed[idx] = Some(entries[idx].line.len());
        }
        out.flush()?;
    }

    let view = session.stop();
    let stderr_color = resolve_color_mode(config.color_mode, io::stderr().is_terminal());
    eprintln!("{}", format_status(&view, view.entries.len(), stderr_color));
    Ok(())
}

async fn run_pods(config: &Config, prefix: Option<&str>) -> Result<(), KubyError> {
    let names = config
        .log_source()
        .list_sources()
        .await
        .map_err(|e| KubyError::Backend(e.message))?;
    let mut out = io::stdout().lock();
    for name in names
        .iter()
        .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
    {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

async fn run_contexts(config: &Config) -> Result<(), KubyError> {
    let contexts = config
        .kubectl_source()
        .list_contexts()
        .await
        .map_err(|e| KubyError::Backend(e.message))?;
    let mut out = io::stdout().lock();
    for context in &contexts {
        let marker = if context.current { '*' } else { ' ' };
        match &context.namespace {
            Some(namespace) => writeln!(out, "{marker} {}\t{namespace}", context.name)?,
            None => writeln!(out, "{marker} {}", context.name)?,
        }
    }
    Ok(())
}

fn run_options(config: &Config, command: OptionsCommand) -> Result<(), KubyError> {
    let store = config.options_store();
    match command {
        OptionsCommand::List => {
            let options = store.load()?;
            let mut out = io::stdout().lock();
            for (prefix, rule) in options.iter() {
                match rule {
                    ParsingRule::LegacyPattern(pattern) => {
                        writeln!(out, "{prefix}\tpattern {pattern}")?;
                    }
                    ParsingRule::StructuredFormat {
                        format,
                        merge_identical_timestamps,
                    } => {
                        let merge = if *merge_identical_timestamps {
                            "\tmerge-identical-timestamps"
                        } else {
                            ""
                        };
                        writeln!(out, "{prefix}\t{format}{merge}")?;
                    }
                }
            }
        }
        OptionsCommand::Add {
            prefix,
            format,
            merge_identical_timestamps,
        } => {
            let mut options = store.load()?;
            options.add_rule(&prefix, &format, merge_identical_timestamps)?;
            store.save(&options)?;
            eprintln!("kuby: saved format for '{prefix}'");
        }
        OptionsCommand::Remove { prefix } => {
            let mut options = store.load()?;
            if !options.remove_rule(&prefix) {
                return Err(KubyError::Validation(format!("no rule for prefix '{prefix}'")));
            }
            store.save(&options)?;
        }
        OptionsCommand::Export { output } => {
            let json = store.load()?.export_json()?;
            match output {
                Some(path) => std::fs::write(path, json)?,
                None => writeln!(io::stdout().lock(), "{json}")?,
            }
        }
        OptionsCommand::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let options = ParsingOptions::import_json(&json)?;
            store.save(&options)?;
            eprintln!("kuby: imported {} rule(s)", options.len());
        }
    }
    Ok(())
}

fn resolve_color_mode(mode: ColorMode, is_terminal: bool) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            if !is_terminal {
                return false;
            }
            if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
                return false;
            }
            if std::env::var("TERM").is_ok_and(|v| v == "dumb") {
                return false;
            }
            true
        }
    }
}

/// Reset SIGPIPE to the default (terminate) behavior.
///
/// By default, Rust ignores SIGPIPE to surface `BrokenPipe` I/O errors.
/// Restoring `SIG_DFL` lets a closed downstream reader end `kuby` quietly.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

#[cfg(not(unix))]
fn reset_sigpipe() {}
