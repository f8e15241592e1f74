//! Humanized names for image tokens
//!
//! Language and base-image tokens taken from image names and tags are turned
//! into display names in two passes: an ordered list of regex replacements
//! (first match wins) and then a literal alias table. The tables belong to
//! whoever supplies them (the configuration layer); humanizing never mutates
//! them.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Serialized form of one replacement rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementRule {
    /// Regular expression matched against the whole token
    pub pattern: String,

    /// Replacement text; `$1` / `${name}` refer to capture groups
    pub replacement: String,
}

/// Serialized alias tables, as found in configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasTableSpec {
    /// Evaluated in order; the first matching pattern wins
    #[serde(default)]
    pub replacements: Vec<ReplacementRule>,

    /// Literal token -> display name
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

/// Compiled alias tables
#[derive(Debug, Clone, Default)]
pub struct AliasTables {
    replacements: Vec<(Regex, String)>,
    aliases: HashMap<String, String>,
}

impl AliasTables {
    /// Tables that leave every token unchanged
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile the serialized tables, keeping rule order
    pub fn compile(spec: &AliasTableSpec) -> Result<Self> {
        let replacements = spec
            .replacements
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule.replacement.clone()))
                    .with_context(|| format!("Invalid alias pattern: {}", rule.pattern))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            replacements,
            aliases: spec.aliases.clone(),
        })
    }

    /// Build tables directly from `(pattern, replacement)` pairs and aliases
    pub fn from_pairs<'a>(
        replacements: impl IntoIterator<Item = (&'a str, &'a str)>,
        aliases: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let spec = AliasTableSpec {
            replacements: replacements
                .into_iter()
                .map(|(pattern, replacement)| ReplacementRule {
                    pattern: pattern.to_string(),
                    replacement: replacement.to_string(),
                })
                .collect(),
            aliases: aliases
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        Self::compile(&spec)
    }

    /// Number of replacement rules
    pub fn replacement_count(&self) -> usize {
        self.replacements.len()
    }

    /// Number of literal aliases
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Display name for a raw token
    ///
    /// 1. The first replacement whose pattern matches rewrites the token.
    /// 2. Otherwise a literal alias, if any.
    /// 3. Otherwise the token itself.
    pub fn humanize(&self, token: &str) -> String {
        for (pattern, replacement) in &self.replacements {
            if pattern.is_match(token) {
                let humanized = pattern.replace(token, replacement.as_str()).into_owned();
                trace!("Humanized '{}' → '{}' via /{}/", token, humanized, pattern);
                return humanized;
            }
        }

        match self.aliases.get(token) {
            Some(alias) => alias.clone(),
            None => token.to_string(),
        }
    }
}
