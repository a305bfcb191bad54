//! Per-source parsing options: model, persistence, import and export.
//!
//! Options are keyed by source *prefix*. The persisted form is a JSON object
//! mapping each prefix to either `{ "format": ..., "mergeIdenticalTimestamps": ... }`
//! or, for older stores, a bare string holding a regex pattern. Both shapes
//! are resolved once at load time into a [`ParsingRule`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KubyError;

/// Key under which the parsing options live in the options store.
pub const PARSING_OPTIONS_KEY: &str = "parsingOptions";

/// How lines of a matching source are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsingRule {
    /// Old-style rule: a regex whose first capture group holds the timestamp,
    /// parsed natively (no structured format).
    LegacyPattern(String),
    /// Token format such as `YYYY-MM-DD HH:mm:SS.sss`. An empty format means
    /// "not configured" and falls back to the default pattern.
    StructuredFormat {
        format: String,
        merge_identical_timestamps: bool,
    },
}

impl ParsingRule {
    /// Structured rule from a format string.
    pub fn format(format: impl Into<String>) -> Self {
        Self::StructuredFormat {
            format: format.into(),
            merge_identical_timestamps: false,
        }
    }

    /// The configured token format, if any.
    pub fn format_str(&self) -> Option<&str> {
        match self {
            Self::StructuredFormat { format, .. } if !format.is_empty() => Some(format),
            _ => None,
        }
    }

    pub fn merge_identical_timestamps(&self) -> bool {
        matches!(
            self,
            Self::StructuredFormat {
                merge_identical_timestamps: true,
                ..
            }
        )
    }
}

/// On-disk shape of one rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredRule {
    Legacy(String),
    Structured(StoredFormat),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFormat {
    #[serde(default)]
    format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    merge_identical_timestamps: Option<bool>,
}

impl From<StoredRule> for ParsingRule {
    fn from(stored: StoredRule) -> Self {
        match stored {
            StoredRule::Legacy(pattern) => Self::LegacyPattern(pattern),
            StoredRule::Structured(f) => Self::StructuredFormat {
                format: f.format,
                merge_identical_timestamps: f.merge_identical_timestamps.unwrap_or(false),
            },
        }
    }
}

impl From<ParsingRule> for StoredRule {
    fn from(rule: ParsingRule) -> Self {
        match rule {
            ParsingRule::LegacyPattern(pattern) => Self::Legacy(pattern),
            ParsingRule::StructuredFormat {
                format,
                merge_identical_timestamps,
            } => Self::Structured(StoredFormat {
                format,
                merge_identical_timestamps: Some(merge_identical_timestamps),
            }),
        }
    }
}

/// The prefix → rule mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, StoredRule>",
    into = "BTreeMap<String, StoredRule>"
)]
pub struct ParsingOptions {
    rules: BTreeMap<String, ParsingRule>,
}

impl From<BTreeMap<String, StoredRule>> for ParsingOptions {
    fn from(stored: BTreeMap<String, StoredRule>) -> Self {
        Self {
            rules: stored.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

impl From<ParsingOptions> for BTreeMap<String, StoredRule> {
    fn from(options: ParsingOptions) -> Self {
        options
            .rules
            .into_iter()
            .map(|(k, v)| (k, v.into()))
            .collect()
    }
}

/// One row of the export/import format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRecord {
    pub prefix: String,
    pub format: String,
    #[serde(default)]
    pub merge_identical_timestamps: bool,
}

impl ParsingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn get(&self, prefix: &str) -> Option<&ParsingRule> {
        self.rules.get(prefix)
    }

    /// Iterate rules in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParsingRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert a rule without validation (used by loaders and tests).
    pub fn insert(&mut self, prefix: impl Into<String>, rule: ParsingRule) {
        self.rules.insert(prefix.into(), rule);
    }

    /// Add or replace a structured rule, rejecting empty prefix or format.
    pub fn add_rule(
        &mut self,
        prefix: &str,
        format: &str,
        merge_identical_timestamps: bool,
    ) -> Result<(), KubyError> {
        if prefix.trim().is_empty() {
            return Err(KubyError::Validation("source prefix is required".into()));
        }
        if format.trim().is_empty() {
            return Err(KubyError::Validation(
                "please provide a format string".into(),
            ));
        }
        self.rules.insert(
            prefix.to_string(),
            ParsingRule::StructuredFormat {
                format: format.to_string(),
                merge_identical_timestamps,
            },
        );
        Ok(())
    }

    /// Remove a rule. Returns `true` if one existed.
    pub fn remove_rule(&mut self, prefix: &str) -> bool {
        self.rules.remove(prefix).is_some()
    }

    /// Change the format of an existing rule, keeping its merge flag.
    ///
    /// A legacy rule is converted into a structured one.
    pub fn set_format(&mut self, prefix: &str, new_format: &str) -> bool {
        let Some(rule) = self.rules.get_mut(prefix) else {
            return false;
        };
        let merge = rule.merge_identical_timestamps();
        *rule = ParsingRule::StructuredFormat {
            format: new_format.to_string(),
            merge_identical_timestamps: merge,
        };
        true
    }

    /// Toggle `mergeIdenticalTimestamps`; a legacy rule becomes a structured
    /// rule with an empty format.
    pub fn set_merge_identical_timestamps(&mut self, prefix: &str, enabled: bool) -> bool {
        let Some(rule) = self.rules.get_mut(prefix) else {
            return false;
        };
        let format = rule.format_str().unwrap_or_default().to_string();
        *rule = ParsingRule::StructuredFormat {
            format,
            merge_identical_timestamps: enabled,
        };
        true
    }

    /// Export as records, dropping rules that have no format.
    pub fn to_records(&self) -> Vec<OptionRecord> {
        self.iter()
            .filter_map(|(prefix, rule)| {
                rule.format_str().map(|format| OptionRecord {
                    prefix: prefix.to_string(),
                    format: format.to_string(),
                    merge_identical_timestamps: rule.merge_identical_timestamps(),
                })
            })
            .collect()
    }

    /// Export as a pretty-printed JSON array (4-space indent).
    pub fn export_json(&self) -> Result<String, KubyError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.to_records().serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| KubyError::Import(e.to_string()))
    }

    /// Import a JSON array of records, replacing every existing rule.
    pub fn import_json(json: &str) -> Result<Self, KubyError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| KubyError::Import(e.to_string()))?;
        if !value.is_array() {
            return Err(KubyError::Import(
                "imported file must contain an array".into(),
            ));
        }
        let records: Vec<OptionRecord> = serde_json::from_value(value).map_err(|e| {
            KubyError::Import(format!("each entry must have prefix and format properties ({e})"))
        })?;

        let mut options = Self::new();
        for record in records {
            if record.prefix.is_empty() || record.format.is_empty() {
                return Err(KubyError::Import(
                    "each entry must have prefix and format properties".into(),
                ));
            }
            options.insert(
                record.prefix,
                ParsingRule::StructuredFormat {
                    format: record.format,
                    merge_identical_timestamps: record.merge_identical_timestamps,
                },
            );
        }
        Ok(options)
    }
}

/// JSON key-value store holding user options (including [`ParsingOptions`]).
///
/// Unknown keys are preserved on save.
#[derive(Debug, Clone)]
pub struct OptionsStore {
    path: PathBuf,
}

impl OptionsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store location: `~/.kuby/user-options.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map_or_else(|| PathBuf::from(".kuby"), |home| PathBuf::from(home).join(".kuby"))
            .join("user-options.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<serde_json::Map<String, serde_json::Value>, KubyError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(serde_json::Map::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the parsing options; a missing store yields empty options.
    pub fn load(&self) -> Result<ParsingOptions, KubyError> {
        let mut all = self.read_all()?;
        match all.remove(PARSING_OPTIONS_KEY) {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(ParsingOptions::new()),
        }
    }

    /// Persist the parsing options, creating the store directory if needed.
    pub fn save(&self, options: &ParsingOptions) -> Result<(), KubyError> {
        let mut all = self.read_all()?;
        all.insert(
            PARSING_OPTIONS_KEY.to_string(),
            serde_json::to_value(options)?,
        );
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(&all)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!(path = %self.path.display(), rules = options.len(), "saved parsing options");
        Ok(())
    }
}
