//! sequences.rs - Identifier sequences and the allocator that issues from them.
//!
//! A sequence is a named counter with a step interval and a format pattern.
//! The `IdAllocator` owns the state of every configured sequence and hands out
//! formatted identifiers one at a time: the k-th identifier issued from a
//! sequence with next value `v` and interval `i` is `pattern.format(v + k*i)`,
//! and after `n` issuances the next value is `v + n*i`. Values are never
//! skipped and never issued twice within a run.
//!
//! Persistence is the caller's concern: `snapshot` exposes the final sequence
//! states so they can be written back to the configuration source at the end
//! of a run.
//!
//! License: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A named sequence definition as it appears in the configuration file.
///
/// `pattern` is a format template with exactly one insertion point for the
/// numeric value, e.g. `CID-{:04d}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SequenceConfig {
    pub name: String,
    /// Step between successive issued values. Must be positive.
    pub interval: i64,
    /// The value that will be used for the next issued identifier.
    pub next_value: i64,
    pub pattern: String,
}

/// A parsed identifier pattern: literal prefix and suffix around a single
/// numeric insertion point, with optional fixed-width zero padding.
///
/// Supported placeholder forms are `{}`, `{:d}` and `{:0Nd}` where `N` is the
/// pad width. Literal braces are written `{{` and `}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPattern {
    prefix: String,
    suffix: String,
    pad_width: Option<usize>,
    template: String,
}

impl IdPattern {
    /// Parses a pattern template, failing with [`CoreError::InvalidPattern`]
    /// if the template cannot accept exactly one integer substitution.
    pub fn parse(template: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| {
            CoreError::InvalidPattern(template.to_string(), reason.to_string())
        };

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut pad_width = None;
        let mut placeholder_seen = false;

        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            let out = if placeholder_seen { &mut suffix } else { &mut prefix };
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    if placeholder_seen {
                        return Err(invalid("more than one insertion point"));
                    }
                    let mut spec = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(s) => spec.push(s),
                            None => return Err(invalid("unterminated insertion point")),
                        }
                    }
                    pad_width = Self::parse_spec(&spec).map_err(|reason| invalid(&reason))?;
                    placeholder_seen = true;
                }
                '}' => return Err(invalid("unmatched '}'")),
                other => out.push(other),
            }
        }

        if !placeholder_seen {
            return Err(invalid("no insertion point for the sequence value"));
        }

        Ok(Self {
            prefix,
            suffix,
            pad_width,
            template: template.to_string(),
        })
    }

    /// Parses the format spec inside the placeholder. Returns the zero-pad
    /// width, or `None` for plain decimal formatting.
    fn parse_spec(spec: &str) -> Result<Option<usize>, String> {
        let spec = spec.strip_prefix(':').unwrap_or(spec);
        if spec.is_empty() || spec == "d" {
            return Ok(None);
        }
        let body = spec
            .strip_suffix('d')
            .ok_or_else(|| "only decimal ('d') formatting is supported".to_string())?;
        let digits = body
            .strip_prefix('0')
            .ok_or_else(|| "width must be zero-padded (use {:0Nd})".to_string())?;
        let width: usize = digits
            .parse()
            .map_err(|_| "invalid pad width".to_string())?;
        if width == 0 {
            return Err("pad width must be greater than zero".to_string());
        }
        Ok(Some(width))
    }

    /// Formats a sequence value through the pattern.
    pub fn format(&self, value: i64) -> String {
        match self.pad_width {
            Some(width) => format!("{}{:0width$}{}", self.prefix, value, self.suffix, width = width),
            None => format!("{}{}{}", self.prefix, value, self.suffix),
        }
    }

    /// The original template string this pattern was parsed from.
    pub fn template(&self) -> &str {
        &self.template
    }
}

/// In-memory state of a single sequence.
#[derive(Debug, Clone)]
struct Sequence {
    name: String,
    interval: i64,
    next_value: i64,
    pattern: String,
}

/// Hands out unique, formatted, monotonically increasing identifiers per
/// named sequence.
///
/// Each sequence's state is owned by exactly one allocator instance and is
/// only reachable through `&mut self`, so exclusive issuance per sequence is
/// enforced by the borrow checker. Callers that process records concurrently
/// wrap the allocator in a mutex; the issued-value invariant is on the set of
/// values per sequence, not on arrival order.
#[derive(Debug)]
pub struct IdAllocator {
    sequences: Vec<Sequence>,
}

impl IdAllocator {
    /// Builds an allocator from configured sequences, validating intervals,
    /// patterns, and name uniqueness up front.
    pub fn from_config(configs: &[SequenceConfig]) -> Result<Self, CoreError> {
        let mut sequences: Vec<Sequence> = Vec::with_capacity(configs.len());
        for cfg in configs {
            if cfg.interval <= 0 {
                return Err(CoreError::Fatal(format!(
                    "Sequence '{}' has a non-positive interval ({})",
                    cfg.name, cfg.interval
                )));
            }
            if sequences.iter().any(|s| s.name == cfg.name) {
                return Err(CoreError::Fatal(format!(
                    "Duplicate sequence name '{}'",
                    cfg.name
                )));
            }
            IdPattern::parse(&cfg.pattern)?;
            sequences.push(Sequence {
                name: cfg.name.clone(),
                interval: cfg.interval,
                next_value: cfg.next_value,
                pattern: cfg.pattern.clone(),
            });
        }
        Ok(Self { sequences })
    }

    /// Issues `count` identifiers from the named sequence, in order.
    ///
    /// Either fully succeeds (the sequence advances by `count` steps) or
    /// fully fails (the sequence state is unchanged and nothing is issued).
    pub fn issue(&mut self, name: &str, count: usize) -> Result<Vec<String>, CoreError> {
        let seq = self
            .sequences
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| CoreError::UnknownSequence(name.to_string()))?;

        let pattern = IdPattern::parse(&seq.pattern)?;

        let mut issued = Vec::with_capacity(count);
        let mut value = seq.next_value;
        for _ in 0..count {
            issued.push(pattern.format(value));
            value = value.checked_add(seq.interval).ok_or_else(|| {
                CoreError::Fatal(format!("Sequence '{}' overflowed", seq.name))
            })?;
        }

        seq.next_value = value;
        log::debug!(
            "Issued {} identifier(s) from sequence '{}'; next value is {}",
            count,
            name,
            seq.next_value
        );
        Ok(issued)
    }

    /// Issues a single identifier from the named sequence.
    pub fn issue_one(&mut self, name: &str) -> Result<String, CoreError> {
        let mut issued = self.issue(name, 1)?;
        Ok(issued.remove(0))
    }

    /// True if the allocator owns a sequence with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.sequences.iter().any(|s| s.name == name)
    }

    /// The value the named sequence would issue next.
    pub fn next_value(&self, name: &str) -> Option<i64> {
        self.sequences
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.next_value)
    }

    /// Current state of every sequence, in configuration order, for
    /// persistence at the end of a run.
    pub fn snapshot(&self) -> Vec<SequenceConfig> {
        self.sequences
            .iter()
            .map(|s| SequenceConfig {
                name: s.name.clone(),
                interval: s.interval,
                next_value: s.next_value,
                pattern: s.pattern.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(sequences: Vec<SequenceConfig>) -> IdAllocator {
        IdAllocator::from_config(&sequences).unwrap()
    }

    fn concern_sequence() -> SequenceConfig {
        SequenceConfig {
            name: "CONCERN".to_string(),
            interval: 5,
            next_value: 100,
            pattern: "CID-{:04d}".to_string(),
        }
    }

    #[test]
    fn issues_interval_stepped_values_in_order() {
        let mut alloc = allocator(vec![SequenceConfig {
            name: "req".to_string(),
            interval: 3,
            next_value: 7,
            pattern: "{}".to_string(),
        }]);

        let issued = alloc.issue("req", 4).unwrap();
        assert_eq!(issued, vec!["7", "10", "13", "16"]);
        assert_eq!(alloc.next_value("req"), Some(19));
    }

    #[test]
    fn end_to_end_zero_padded_pattern() {
        let mut alloc = allocator(vec![concern_sequence()]);

        let issued = alloc.issue("CONCERN", 3).unwrap();
        assert_eq!(issued, vec!["CID-0100", "CID-0105", "CID-0110"]);
        assert_eq!(alloc.next_value("CONCERN"), Some(115));
    }

    #[test]
    fn repeated_single_issues_match_batch_issue() {
        let mut batch = allocator(vec![concern_sequence()]);
        let mut single = allocator(vec![concern_sequence()]);

        let expected = batch.issue("CONCERN", 3).unwrap();
        let issued: Vec<String> = (0..3)
            .map(|_| single.issue_one("CONCERN").unwrap())
            .collect();

        assert_eq!(issued, expected);
        assert_eq!(single.next_value("CONCERN"), batch.next_value("CONCERN"));
    }

    #[test]
    fn unknown_sequence_is_an_error() {
        let mut alloc = allocator(vec![concern_sequence()]);
        let err = alloc.issue_one("POTHOLE").unwrap_err();
        assert!(matches!(err, CoreError::UnknownSequence(name) if name == "POTHOLE"));
    }

    #[test]
    fn issue_zero_advances_nothing() {
        let mut alloc = allocator(vec![concern_sequence()]);
        assert!(alloc.issue("CONCERN", 0).unwrap().is_empty());
        assert_eq!(alloc.next_value("CONCERN"), Some(100));
    }

    #[test]
    fn invalid_pattern_fails_and_leaves_state_unchanged() {
        // Bypass from_config validation to exercise the issue-time check.
        let mut alloc = IdAllocator {
            sequences: vec![Sequence {
                name: "bad".to_string(),
                interval: 1,
                next_value: 42,
                pattern: "no placeholder".to_string(),
            }],
        };

        let err = alloc.issue("bad", 2).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPattern(..)));
        assert_eq!(alloc.next_value("bad"), Some(42));
    }

    #[test]
    fn pattern_rejects_multiple_insertion_points() {
        let err = IdPattern::parse("A{}-{}").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPattern(..)));
    }

    #[test]
    fn pattern_rejects_missing_insertion_point() {
        assert!(IdPattern::parse("REPORT").is_err());
        assert!(IdPattern::parse("").is_err());
    }

    #[test]
    fn pattern_rejects_unsupported_format_specs() {
        assert!(IdPattern::parse("{:4d}").is_err());
        assert!(IdPattern::parse("{:x}").is_err());
        assert!(IdPattern::parse("{:0d}").is_err());
        assert!(IdPattern::parse("{:04").is_err());
    }

    #[test]
    fn pattern_supports_escaped_braces() {
        let pattern = IdPattern::parse("{{lot}}-{:03d}").unwrap();
        assert_eq!(pattern.format(7), "{lot}-007");
    }

    #[test]
    fn plain_and_explicit_decimal_specs_are_equivalent() {
        let plain = IdPattern::parse("R{}").unwrap();
        let explicit = IdPattern::parse("R{:d}").unwrap();
        assert_eq!(plain.format(12), "R12");
        assert_eq!(explicit.format(12), "R12");
    }

    #[test]
    fn from_config_rejects_bad_definitions() {
        assert!(IdAllocator::from_config(&[SequenceConfig {
            name: "a".to_string(),
            interval: 0,
            next_value: 1,
            pattern: "{}".to_string(),
        }])
        .is_err());

        assert!(IdAllocator::from_config(&[
            concern_sequence(),
            concern_sequence(),
        ])
        .is_err());

        assert!(IdAllocator::from_config(&[SequenceConfig {
            name: "a".to_string(),
            interval: 1,
            next_value: 1,
            pattern: "{".to_string(),
        }])
        .is_err());
    }

    #[test]
    fn snapshot_reflects_issued_values() {
        let mut alloc = allocator(vec![concern_sequence()]);
        alloc.issue("CONCERN", 2).unwrap();

        let snapshot = alloc.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].next_value, 110);
        assert_eq!(snapshot[0].pattern, "CID-{:04d}");
    }
}
