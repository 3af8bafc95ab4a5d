//! Word-filter screening engine for ReportKeeper.
//!
//! This module is responsible for compiling word lists into efficient regular
//! expressions and testing free-text field values against them. A word list is
//! a set of prohibited words, a match mode, and a shared character-substitution
//! table (so `g00se` still matches `goose`). Compilation happens once per
//! distinct definition; the resulting filter is immutable and reusable.
//!
//! This module works closely with `config` (for list definitions) and
//! `moderation` (for the classification policy applied to matched records).

pub mod compiler;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use compiler::{compile_filter, get_or_compile_filter, CompiledFilter};

/// Canonical-character substitution table shared by every word list.
///
/// Maps an uppercase character (as a one-character string in the config file)
/// to the string of characters treated as equivalent to it, e.g. `O` -> `0`.
pub type SubstitutionMap = BTreeMap<String, String>;

/// How a word list's patterns bind to the scanned text.
///
/// Each variant carries its own anchoring rule; there is no boolean flag
/// threaded through the pattern construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The word must match a whole token, boundary to boundary.
    #[serde(alias = "EXACT")]
    Exact,
    /// The word's letter pattern may match anywhere, including inside a
    /// longer token.
    #[serde(alias = "SUBSTRING")]
    Substring,
}

impl MatchMode {
    /// Applies this mode's anchoring rule to a single word's pattern.
    pub(crate) fn anchor(self, word_pattern: &str) -> String {
        match self {
            MatchMode::Exact => format!(r"\b{}\b", word_pattern),
            MatchMode::Substring => word_pattern.to_string(),
        }
    }
}

/// A named word-list definition as it appears in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct WordList {
    pub name: String,
    /// Comma-separated words. Not case sensitive.
    pub words: String,
    pub match_mode: MatchMode,
}

impl WordList {
    /// The words of this list, trimmed, uppercased, deduplicated, and sorted.
    ///
    /// Sorting makes the compiled pattern deterministic for a given
    /// definition.
    pub fn normalized_words(&self) -> Vec<String> {
        let mut words: Vec<String> = self
            .words
            .split(',')
            .map(|w| w.trim().to_uppercase())
            .filter(|w| !w.is_empty())
            .collect();
        words.sort();
        words.dedup();
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_words_are_sorted_and_deduplicated() {
        let list = WordList {
            name: "test".to_string(),
            words: " gull, goose ,GULL,,heron".to_string(),
            match_mode: MatchMode::Substring,
        };
        assert_eq!(list.normalized_words(), vec!["GOOSE", "GULL", "HERON"]);
    }

    #[test]
    fn match_mode_accepts_both_config_spellings() {
        let exact: MatchMode = serde_yml::from_str("EXACT").unwrap();
        let substring: MatchMode = serde_yml::from_str("substring").unwrap();
        assert_eq!(exact, MatchMode::Exact);
        assert_eq!(substring, MatchMode::Substring);
    }
}
