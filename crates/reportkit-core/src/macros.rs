//! Macro expansion over serialized report definitions.
//!
//! A reference is the table's prefix followed by a macro name and the
//! table's suffix (`$site` with the default syntax), or the braced form
//! `${site}` which is accepted whatever the suffix. Names are matched
//! greedily, so `$siteName` refers to `siteName` and never to `site`.
//!
//! Expansion is a single left-to-right pass: replacement text is copied to the
//! output and never rescanned.

use std::collections::BTreeMap;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const NAME_PATTERN: &str = "[A-Za-z_][A-Za-z0-9_]*";

/// Delimiters around a macro name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroSyntax {
    pub prefix: String,
    pub suffix: String,
}

impl Default for MacroSyntax {
    fn default() -> Self {
        Self {
            prefix: "$".to_string(),
            suffix: String::new(),
        }
    }
}

impl MacroSyntax {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    fn pattern(&self) -> Result<Regex, regex::Error> {
        let prefix = regex::escape(&self.prefix);
        let suffix = regex::escape(&self.suffix);
        Regex::new(&format!(
            r"{prefix}\{{(?P<braced>{NAME_PATTERN})\}}|{prefix}(?P<bare>{NAME_PATTERN}){suffix}"
        ))
    }
}

/// Named replacement texts plus the syntax used to reference them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroTable {
    pub syntax: MacroSyntax,
    pub macros: BTreeMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_syntax(syntax: MacroSyntax) -> Self {
        Self {
            syntax,
            macros: BTreeMap::new(),
        }
    }

    /// Builder form of [`MacroTable::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a macro, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.macros.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.macros.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.macros.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether `name` can be referenced at all.
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MacroTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = MacroTable::new();
        for (name, value) in iter {
            table.insert(name, value);
        }
        table
    }
}

/// Replace every known macro reference in `input`.
///
/// ```
/// use reportkit_core::{MacroTable, expand};
///
/// let macros = MacroTable::new().with("site", "north");
/// assert_eq!(expand("at $site and ${site}", &macros), "at north and north");
/// assert_eq!(expand("$other stays", &macros), "$other stays");
/// ```
pub fn expand(input: &str, macros: &MacroTable) -> String {
    if macros.is_empty() || macros.syntax.prefix.is_empty() {
        return input.to_string();
    }

    let pattern = match macros.syntax.pattern() {
        Ok(pattern) => pattern,
        Err(err) => {
            tracing::warn!(error = %err, "Macro syntax does not form a valid pattern; text left unexpanded");
            return input.to_string();
        }
    };

    let mut expanded = 0usize;
    let output = pattern.replace_all(input, |caps: &Captures<'_>| {
        let name = caps
            .name("braced")
            .or_else(|| caps.name("bare"))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match macros.get(name) {
            Some(value) => {
                expanded += 1;
                value.to_string()
            }
            None => caps[0].to_string(),
        }
    });

    tracing::debug!(replacements = expanded, "Expanded macros");
    output.into_owned()
}
