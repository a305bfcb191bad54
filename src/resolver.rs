//! Longest-prefix resolution of a source to its parsing rule.

use crate::options::{ParsingOptions, ParsingRule};

/// Result of resolving a source against the configured prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// A configured prefix matched.
    Rule {
        prefix: &'a str,
        rule: &'a ParsingRule,
    },
    /// No prefix matched; the built-in default applies.
    Default,
}

impl<'a> Resolution<'a> {
    pub fn rule(&self) -> Option<&'a ParsingRule> {
        match self {
            Self::Rule { rule, .. } => Some(rule),
            Self::Default => None,
        }
    }
}

/// Maps a source identifier to the rule of its longest matching prefix.
///
/// Holds a read-only snapshot of the options taken at construction, so the
/// prefix set cannot change during a parse.
#[derive(Debug, Clone, Default)]
pub struct PatternResolver {
    /// Sorted by descending prefix length; equal lengths keep prefix order.
    prefixes: Vec<(String, ParsingRule)>,
}

impl PatternResolver {
    pub fn new(options: &ParsingOptions) -> Self {
        let mut prefixes: Vec<(String, ParsingRule)> = options
            .iter()
            .map(|(prefix, rule)| (prefix.to_string(), rule.clone()))
            .collect();
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { prefixes }
    }

    pub fn resolve(&self, source_id: &str) -> Resolution<'_> {
        self.prefixes
            .iter()
            .find(|(prefix, _)| source_id.starts_with(prefix.as_str()))
            .map_or(Resolution::Default, |(prefix, rule)| Resolution::Rule {
                prefix: prefix.as_str(),
                rule,
            })
    }
}
