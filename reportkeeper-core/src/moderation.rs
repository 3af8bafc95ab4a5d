//! moderation.rs - Classification policy applied to scanned record fields.
//!
//! A `Moderator` holds the compiled explicit and sensitive filters for one
//! moderation job and classifies a record from its free-text fields. Fields
//! are evaluated in their declared order; within each field the explicit
//! filters are tested before the sensitive ones, and scanning stops at the
//! first match. The two categories are therefore mutually exclusive per
//! record, with explicit taking priority.
//!
//! Debug logging never includes the scanned text itself, only a digest of it.
//!
//! License: MIT OR Apache-2.0

use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::screener::CompiledFilter;

/// Initialized once to determine if scanned text is allowed in debug logs.
static CONTENT_DEBUG_ALLOWED: Lazy<bool> = Lazy::new(|| {
    std::env::var("REPORTKEEPER_ALLOW_DEBUG_CONTENT")
        .map(|s| s.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
});

/// Why a record was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Explicit,
    Sensitive,
}

impl Category {
    /// The reason text written into the record's reason field.
    pub fn reason(&self) -> &'static str {
        match self {
            Category::Explicit => "Explicit content found.",
            Category::Sensitive => "Sensitive content found.",
        }
    }
}

/// Per-record moderation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModerationResult {
    pub flagged: bool,
    /// Reason text to write back, with any prior reason preserved in front.
    /// Empty when the record is clean.
    pub reason: String,
}

/// Classifies records against one moderation job's compiled filters.
#[derive(Debug, Clone)]
pub struct Moderator {
    explicit: Vec<Arc<CompiledFilter>>,
    sensitive: Vec<Arc<CompiledFilter>>,
}

impl Moderator {
    pub fn new(explicit: Vec<Arc<CompiledFilter>>, sensitive: Vec<Arc<CompiledFilter>>) -> Self {
        Self { explicit, sensitive }
    }

    /// Scans field values in declared order and returns the first matching
    /// category, explicit before sensitive within each field.
    pub fn classify<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> Option<Category> {
        for field in fields {
            if self.explicit.iter().any(|f| f.is_match(field)) {
                debug!("Field flagged as explicit: {}", loggable_content(field));
                return Some(Category::Explicit);
            }
            if self.sensitive.iter().any(|f| f.is_match(field)) {
                debug!("Field flagged as sensitive: {}", loggable_content(field));
                return Some(Category::Sensitive);
            }
        }
        None
    }

    /// Classifies a record and builds the write-back verdict, appending to
    /// any reason already carried by the record.
    pub fn moderate<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a str>,
        prior_reason: Option<&str>,
    ) -> ModerationResult {
        match self.classify(fields) {
            Some(category) => ModerationResult {
                flagged: true,
                reason: append_reason(prior_reason, category.reason()),
            },
            None => ModerationResult::default(),
        }
    }
}

/// Appends a new reason to an existing one, separated by a single space.
/// The existing reason is never replaced.
pub fn append_reason(existing: Option<&str>, new_reason: &str) -> String {
    match existing.map(str::trim) {
        Some(prior) if !prior.is_empty() => format!("{} {}", prior, new_reason),
        _ => new_reason.to_string(),
    }
}

/// SHA-256 digest of field content, hex encoded, for logging in place of the
/// content itself.
fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn loggable_content(text: &str) -> String {
    if *CONTENT_DEBUG_ALLOWED {
        text.to_string()
    } else {
        format!("digest {}", content_digest(text))
    }
}
