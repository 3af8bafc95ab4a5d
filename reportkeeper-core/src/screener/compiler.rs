//! compiler.rs - Manages the compilation and caching of word filters.
//!
//! This module converts a `WordList` definition plus the shared substitution
//! table into a `CompiledFilter`, an immutable matching predicate optimized
//! for repeated evaluation. It uses a global, shared cache keyed by a hash of
//! the definition to avoid redundant compilation: a filter is built once per
//! distinct (words, match mode, substitutions) triple and reused across every
//! record evaluation in the run.
//!
//! License: MIT OR APACHE 2.0

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};

use crate::errors::CoreError;
use crate::screener::{SubstitutionMap, WordList};

/// Maximum size of a compiled filter automaton.
const FILTER_SIZE_LIMIT: usize = 10 * (1 << 20);

/// An immutable, compiled word-matching predicate.
///
/// Matching is case-folded: the scanned text is uppercased before testing,
/// the same canonical case the words were compiled with. A filter compiled
/// from an empty word list never matches anything.
#[derive(Debug)]
pub struct CompiledFilter {
    regex: Option<Regex>,
}

impl CompiledFilter {
    /// Tests whether any word in the list matches anywhere in `text`.
    ///
    /// Never fails on well-formed string input.
    pub fn is_match(&self, text: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(&text.to_uppercase()),
            None => false,
        }
    }

    /// True if this filter was compiled from an empty word list.
    pub fn never_matches(&self) -> bool {
        self.regex.is_none()
    }

    /// The combined pattern, for diagnostics.
    pub fn pattern(&self) -> Option<&str> {
        self.regex.as_ref().map(|r| r.as_str())
    }
}

lazy_static! {
    /// A thread-safe, global cache for compiled filters.
    /// The key is a hash of the normalized filter definition.
    static ref COMPILED_FILTER_CACHE: RwLock<HashMap<u64, Arc<CompiledFilter>>> =
        RwLock::new(HashMap::new());
}

/// Hashes the normalized definition to create a stable, unique cache key.
///
/// The list name is deliberately excluded: two lists with the same words,
/// mode, and substitutions share one compiled filter.
fn hash_definition(list: &WordList, subs: &SubstitutionMap) -> u64 {
    let mut hasher = DefaultHasher::new();
    list.normalized_words().hash(&mut hasher);
    list.match_mode.hash(&mut hasher);
    for (canonical, equivalents) in subs {
        canonical.hash(&mut hasher);
        equivalents.hash(&mut hasher);
    }
    hasher.finish()
}

/// Builds the character class for one canonical character: the character
/// itself plus any configured substitution equivalents.
fn character_class(c: char, subs: &SubstitutionMap) -> String {
    let mut class = regex::escape(&c.to_string());
    if let Some(equivalents) = subs.get(&c.to_string()) {
        for equivalent in equivalents.chars() {
            class.push_str(&regex::escape(&equivalent.to_string()));
        }
    }
    format!("[{}]", class)
}

/// Compiles a word list into a `CompiledFilter`.
/// This is the low-level function that performs the actual regex compilation.
///
/// Every word is normalized to uppercase, each of its characters becomes a
/// substitution-aware character class, the per-word patterns are anchored
/// according to the list's match mode, and the results are joined with
/// alternation into one combined pattern. Compilation is pure and
/// deterministic: the same definition always yields the same pattern.
pub fn compile_filter(
    list: &WordList,
    subs: &SubstitutionMap,
) -> Result<CompiledFilter, CoreError> {
    let words = list.normalized_words();
    if words.is_empty() {
        debug!("Word list '{}' is empty; compiling a filter that never matches.", list.name);
        return Ok(CompiledFilter { regex: None });
    }

    let pattern = words
        .iter()
        .map(|word| {
            let word_pattern: String = word.chars().map(|c| character_class(c, subs)).collect();
            list.match_mode.anchor(&word_pattern)
        })
        .collect::<Vec<String>>()
        .join("|");

    let regex = RegexBuilder::new(&pattern)
        .size_limit(FILTER_SIZE_LIMIT)
        .build()
        .map_err(|e| CoreError::FilterCompilation(list.name.clone(), e))?;

    debug!(
        "Compiled word list '{}' ({} word(s)) into filter pattern of {} bytes.",
        list.name,
        words.len(),
        pattern.len()
    );
    Ok(CompiledFilter { regex: Some(regex) })
}

/// Gets a `CompiledFilter` from the cache or compiles it if not found.
///
/// This is the public entry point for retrieving compiled filters. It returns
/// an `Arc` to a `CompiledFilter` instance, allowing for cheap sharing.
pub fn get_or_compile_filter(
    list: &WordList,
    subs: &SubstitutionMap,
) -> Result<Arc<CompiledFilter>> {
    let cache_key = hash_definition(list, subs);

    // Attempt to acquire a read lock first.
    {
        let cache = COMPILED_FILTER_CACHE.read().unwrap();
        if let Some(filter) = cache.get(&cache_key) {
            debug!("Serving compiled filter from cache for key: {}", &cache_key);
            return Ok(Arc::clone(filter));
        }
    } // Read lock is released here.

    let compiled = compile_filter(list, subs)?;
    let compiled_arc = Arc::new(compiled);

    COMPILED_FILTER_CACHE
        .write()
        .unwrap()
        .insert(cache_key, Arc::clone(&compiled_arc));

    debug!("Compiled and cached filter for key: {}", &cache_key);
    Ok(compiled_arc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screener::MatchMode;

    fn list(words: &str, match_mode: MatchMode) -> WordList {
        WordList {
            name: "test".to_string(),
            words: words.to_string(),
            match_mode,
        }
    }

    fn no_subs() -> SubstitutionMap {
        SubstitutionMap::new()
    }

    #[test]
    fn empty_word_list_never_matches() {
        let filter = compile_filter(&list("", MatchMode::Substring), &no_subs()).unwrap();
        assert!(filter.never_matches());
        assert!(!filter.is_match(""));
        assert!(!filter.is_match("anything at all"));
    }

    #[test]
    fn exact_mode_matches_whole_tokens_only() {
        let filter = compile_filter(&list("duck", MatchMode::Exact), &no_subs()).unwrap();
        assert!(!filter.is_match("ducks"));
        assert!(filter.is_match("a duck here"));
        assert!(filter.is_match("DUCK"));
    }

    #[test]
    fn substring_mode_matches_inside_longer_tokens() {
        let filter = compile_filter(&list("duck", MatchMode::Substring), &no_subs()).unwrap();
        assert!(filter.is_match("ducks"));
        assert!(filter.is_match("viaduckt"));
    }

    #[test]
    fn substitution_characters_are_honored() {
        let mut subs = SubstitutionMap::new();
        subs.insert("O".to_string(), "0".to_string());
        let filter = compile_filter(&list("goose", MatchMode::Substring), &subs).unwrap();
        assert!(filter.is_match("g00se"));
        assert!(filter.is_match("GOOSE"));
        assert!(!filter.is_match("geese"));
    }

    #[test]
    fn substitutions_with_regex_metacharacters_are_escaped() {
        let mut subs = SubstitutionMap::new();
        subs.insert("S".to_string(), "$5Z".to_string());
        subs.insert("T".to_string(), "+7".to_string());
        let filter = compile_filter(&list("pest", MatchMode::Substring), &subs).unwrap();
        assert!(filter.is_match("pe$+"));
        assert!(filter.is_match("PE57"));
        assert!(!filter.is_match("pea"));
    }

    #[test]
    fn matching_is_case_folded() {
        let filter = compile_filter(&list("Gull", MatchMode::Exact), &no_subs()).unwrap();
        assert!(filter.is_match("gull"));
        assert!(filter.is_match("One GULL landed"));
    }

    #[test]
    fn compilation_is_deterministic() {
        // Word order and duplicates in the definition must not change the
        // compiled pattern.
        let a = compile_filter(&list("gull, goose", MatchMode::Substring), &no_subs()).unwrap();
        let b = compile_filter(&list("goose,gull,gull", MatchMode::Substring), &no_subs()).unwrap();
        assert_eq!(a.pattern(), b.pattern());
    }

    #[test]
    fn cache_returns_the_same_filter_for_equal_definitions() {
        let subs = no_subs();
        let first = get_or_compile_filter(&list("heron", MatchMode::Exact), &subs).unwrap();
        let mut renamed = list("heron", MatchMode::Exact);
        renamed.name = "other-name".to_string();
        let second = get_or_compile_filter(&renamed, &subs).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn alternation_covers_every_word_in_the_list() {
        let filter =
            compile_filter(&list("perch, carp, lobster", MatchMode::Substring), &no_subs())
                .unwrap();
        assert!(filter.is_match("a carp was caught"));
        assert!(filter.is_match("lobsters"));
        assert!(filter.is_match("perched"));
        assert!(!filter.is_match("trout"));
    }
}
