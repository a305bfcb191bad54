//! Configuration management with TOML file support.
//!
//! Merges settings from three sources (highest precedence first):
//! 1. CLI flags
//! 2. Config file (`~/.config/kuby/config.toml` or `$XDG_CONFIG_HOME/kuby/config.toml`)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jiff::tz::TimeZone;
use serde::Deserialize;

use crate::cli::{Cli, ColorMode, SourceKind};
use crate::error::KubyError;
use crate::options::OptionsStore;
use crate::session::DEFAULT_FOLLOW_TAIL;
use crate::source::{FileSource, KubectlSource, LogSource};
use crate::timestamp::resolve_time_zone;

/// Runtime configuration merged from defaults, config file, and CLI arguments.
///
/// Use [`Config::from_cli`] to build from parsed CLI arguments, or
/// [`Config::default`] for built-in defaults (useful in tests).
#[derive(Debug, Clone)]
pub struct Config {
    /// Color output mode (auto/always/never).
    pub color_mode: ColorMode,
    /// Zone used for display strings and zone-less timestamps.
    pub timezone: TimeZone,
    /// Lines fetched per source in batch mode. `None` fetches everything.
    pub tail_lines: Option<usize>,
    /// Lines of history a live stream starts from.
    pub follow_tail_lines: usize,
    /// JSON store holding the parsing options.
    pub options_file: PathBuf,
    /// Where logs are read from.
    pub source: SourceKind,
    /// Kubernetes namespace passed to `kubectl`.
    pub namespace: Option<String>,
    /// kubeconfig context passed to `kubectl`. `None` uses the current one.
    pub context: Option<String>,
    /// Directory of `<source>.log` files for the `files` source.
    pub log_dir: Option<PathBuf>,
    /// `kubectl` executable.
    pub kubectl: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Auto,
            timezone: TimeZone::system(),
            tail_lines: None,
            follow_tail_lines: DEFAULT_FOLLOW_TAIL,
            options_file: OptionsStore::default_path(),
            source: SourceKind::Kubectl,
            namespace: None,
            context: None,
            log_dir: None,
            kubectl: "kubectl".to_string(),
        }
    }
}

impl Config {
    /// Build a [`Config`] from CLI arguments, loading the config file if present.
    ///
    /// Merge precedence: CLI flags > config file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, KubyError> {
        let mut config = Self::default();

        let config_path = cli.config.clone().unwrap_or_else(Self::default_config_path);
        if config_path.exists() {
            let file_config = FileConfig::load(&config_path)?;
            config.apply_file_config(file_config)?;
        } else if cli.config.is_some() {
            return Err(KubyError::Config(format!(
                "config file not found: {}",
                config_path.display()
            )));
        }

        if let Some(color) = cli.color {
            config.color_mode = color;
        }
        if let Some(ref name) = cli.timezone {
            config.timezone = parse_time_zone(name)?;
        }
        if cli.namespace.is_some() {
            config.namespace.clone_from(&cli.namespace);
        }
        if cli.context.is_some() {
            config.context.clone_from(&cli.context);
        }
        if let Some(ref path) = cli.options_file {
            config.options_file.clone_from(path);
        }
        if let Some(ref dir) = cli.log_dir {
            config.log_dir = Some(dir.clone());
            // A log directory on the command line implies reading files.
            if cli.source.is_none() {
                config.source = SourceKind::Files;
            }
        }
        if let Some(source) = cli.source {
            config.source = source;
        }

        if config.source == SourceKind::Files && config.log_dir.is_none() {
            return Err(KubyError::Config(
                "the files source needs a log directory (--log-dir or log_dir)".to_string(),
            ));
        }

        Ok(config)
    }

    /// Default config file path: `$XDG_CONFIG_HOME/kuby/config.toml` or `~/.config/kuby/config.toml`.
    fn default_config_path() -> PathBuf {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(xdg).join("kuby").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("kuby")
                .join("config.toml")
        } else {
            PathBuf::from(".config/kuby/config.toml")
        }
    }

    /// Apply settings from a parsed config file.
    fn apply_file_config(&mut self, file: FileConfig) -> Result<(), KubyError> {
        if let Some(color) = file.color {
            self.color_mode = match color.as_str() {
                "always" => ColorMode::Always,
                "never" => ColorMode::Never,
                _ => ColorMode::Auto,
            };
        }

        if let Some(name) = file.timezone {
            self.timezone = parse_time_zone(&name)?;
        }

        if file.tail_lines.is_some() {
            self.tail_lines = file.tail_lines;
        }
        if let Some(lines) = file.follow_tail_lines {
            self.follow_tail_lines = lines;
        }

        if let Some(path) = file.options_file {
            self.options_file = path;
        }

        if let Some(source) = file.source {
            self.source = match source.as_str() {
                "kubectl" => SourceKind::Kubectl,
                "files" => SourceKind::Files,
                other => {
                    return Err(KubyError::Config(format!(
                        "unknown source '{other}': expected kubectl or files"
                    )));
                }
            };
        }

        if file.namespace.is_some() {
            self.namespace = file.namespace;
        }
        if file.context.is_some() {
            self.context = file.context;
        }
        if file.log_dir.is_some() {
            self.log_dir = file.log_dir;
        }
        if let Some(kubectl) = file.kubectl {
            self.kubectl = kubectl;
        }
        Ok(())
    }

    /// The options store this configuration points at.
    pub fn options_store(&self) -> OptionsStore {
        OptionsStore::new(&self.options_file)
    }

    /// Build the configured log source.
    pub fn log_source(&self) -> Arc<dyn LogSource> {
        match (self.source, &self.log_dir) {
            (SourceKind::Files, Some(dir)) => Arc::new(FileSource::new(dir)),
            _ => Arc::new(self.kubectl_source()),
        }
    }

    /// The `kubectl` backend, whatever the configured log source.
    pub fn kubectl_source(&self) -> KubectlSource {
        KubectlSource::new(self.namespace.clone())
            .with_program(&self.kubectl)
            .with_context(self.context.clone())
    }
}

fn parse_time_zone(name: &str) -> Result<TimeZone, KubyError> {
    resolve_time_zone(name).ok_or_else(|| KubyError::Config(format!("unknown time zone '{name}'")))
}

/// Config file structure (TOML deserialization).
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    color: Option<String>,
    timezone: Option<String>,
    tail_lines: Option<usize>,
    follow_tail_lines: Option<usize>,
    options_file: Option<PathBuf>,
    source: Option<String>,
    namespace: Option<String>,
    context: Option<String>,
    log_dir: Option<PathBuf>,
    kubectl: Option<String>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self, KubyError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KubyError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.color_mode, ColorMode::Auto);
        assert_eq!(config.source, SourceKind::Kubectl);
        assert_eq!(config.follow_tail_lines, 10);
        assert!(config.tail_lines.is_none());
        assert!(config.options_file.ends_with(".kuby/user-options.json"));
    }

    #[test]
    fn test_file_config_parse() {
        let toml_str = r#"
            color = "always"
            timezone = "utc"
            tail_lines = 500
            follow_tail_lines = 20
            source = "files"
            namespace = "staging"
            log_dir = "/var/log/pods"
        "#;

        let file_config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(file_config.color.as_deref(), Some("always"));
        assert_eq!(file_config.tail_lines, Some(500));
        assert_eq!(file_config.namespace.as_deref(), Some("staging"));
        assert!(file_config.options_file.is_none());
    }

    #[test]
    fn test_apply_file_config() {
        let mut config = Config::default();
        let file_config = FileConfig {
            color: Some("never".to_string()),
            timezone: Some("UTC".to_string()),
            tail_lines: Some(100),
            source: Some("files".to_string()),
            log_dir: Some(PathBuf::from("/tmp/logs")),
            kubectl: Some("/opt/bin/kubectl".to_string()),
            ..FileConfig::default()
        };

        config.apply_file_config(file_config).unwrap();
        assert_eq!(config.color_mode, ColorMode::Never);
        assert_eq!(config.tail_lines, Some(100));
        assert_eq!(config.source, SourceKind::Files);
        assert_eq!(config.log_dir.as_deref(), Some(Path::new("/tmp/logs")));
        assert_eq!(config.kubectl, "/opt/bin/kubectl");
    }

    #[test]
    fn test_apply_file_config_rejects_bad_values() {
        let mut config = Config::default();
        let err = config
            .apply_file_config(FileConfig {
                source: Some("docker".to_string()),
                ..FileConfig::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("unknown source"));

        let err = config
            .apply_file_config(FileConfig {
                timezone: Some("Mars/Olympus".to_string()),
                ..FileConfig::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("unknown time zone"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "color = \"always\"\nnamespace = \"staging\"\n").unwrap();

        let config = Config::from_cli(&cli(&[
            "kuby",
            "--config",
            path.to_str().unwrap(),
            "--color",
            "never",
            "options",
            "list",
        ]))
        .unwrap();
        assert_eq!(config.color_mode, ColorMode::Never);
        assert_eq!(config.namespace.as_deref(), Some("staging"));
    }

    #[test]
    fn test_context_from_file_and_cli() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "context = \"staging-ctx\"\n").unwrap();
        let path = path.to_str().unwrap();

        let config = Config::from_cli(&cli(&["kuby", "--config", path, "contexts"])).unwrap();
        assert_eq!(config.context.as_deref(), Some("staging-ctx"));

        let config =
            Config::from_cli(&cli(&["kuby", "--config", path, "--context", "prod", "pods"])).unwrap();
        assert_eq!(config.context.as_deref(), Some("prod"));
    }

    #[test]
    fn test_log_dir_implies_files_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_cli(&cli(&[
            "kuby",
            "--config",
            "/nonexistent/kuby.toml",
            "options",
            "list",
        ]));
        assert!(config.is_err(), "explicit missing config file is an error");

        let config = Config::from_cli(&cli(&[
            "kuby",
            "--log-dir",
            dir.path().to_str().unwrap(),
            "fetch",
            "web-1",
        ]))
        .unwrap();
        assert_eq!(config.source, SourceKind::Files);
    }

    #[test]
    fn test_files_source_requires_log_dir() {
        let err = Config::from_cli(&cli(&["kuby", "--source", "files", "fetch", "web-1"])).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
